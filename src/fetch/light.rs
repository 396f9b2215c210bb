//! Lightweight HTTP acquisition strategy.
//!
//! [`LightClient`] issues plain GET requests through a long-lived reqwest
//! client with a cookie store, so cookies picked up by
//! [`bootstrap`](Fetcher::bootstrap) ride along on every later request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
use super::{FetchError, FetchRequest, Fetcher, RateLimiter};
use crate::user_agent;

/// Errors building a [`LightClient`].
#[derive(Debug, Error)]
pub enum LightClientError {
    /// A configured header name or value is not valid HTTP.
    #[error("invalid header {name}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// The chosen proxy URL was rejected.
    #[error("invalid proxy {proxy}: {source}")]
    InvalidProxy {
        /// The proxy URL.
        proxy: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// reqwest could not build the client.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Settings for [`LightClient`].
#[derive(Debug, Clone)]
pub struct LightClientOptions {
    /// Default headers sent with every request, in configuration order.
    pub headers: Vec<(String, String)>,
    /// Proxy candidates. One is picked at random when the client is built.
    pub proxies: Vec<String>,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Time allowed for the whole request.
    pub request_timeout: Duration,
}

impl Default for LightClientOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            proxies: Vec::new(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// HTTP fetch strategy with cookie persistence and optional proxy.
#[derive(Debug)]
pub struct LightClient {
    client: Client,
    cookies: Arc<Jar>,
    limiter: RateLimiter,
    proxy: Option<String>,
    closed: AtomicBool,
}

impl LightClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`LightClientError`] if a header or the chosen proxy is invalid,
    /// or if reqwest fails to build the client.
    #[instrument(level = "debug", skip_all, fields(proxies = options.proxies.len()))]
    pub fn new(options: LightClientOptions, limiter: RateLimiter) -> Result<Self, LightClientError> {
        let cookies = Arc::new(Jar::default());

        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .default_headers(build_headers(&options.headers)?)
            .cookie_provider(Arc::clone(&cookies));

        let proxy = options.proxies.choose(&mut rand::thread_rng()).cloned();
        if let Some(proxy_url) = &proxy {
            let resolved = Proxy::all(proxy_url).map_err(|source| LightClientError::InvalidProxy {
                proxy: proxy_url.clone(),
                source,
            })?;
            info!(proxy = %proxy_url, "routing requests through proxy");
            builder = builder.proxy(resolved);
        }

        let client = builder.build().map_err(LightClientError::Build)?;

        Ok(Self {
            client,
            cookies,
            limiter,
            proxy,
            closed: AtomicBool::new(false),
        })
    }

    /// The proxy chosen for this client, if any.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Number of cookies the store would send to `url`.
    #[must_use]
    pub fn cookie_count(&self, url: &str) -> usize {
        let Ok(parsed) = Url::parse(url) else {
            return 0;
        };
        self.cookies
            .cookies(&parsed)
            .and_then(|value| value.to_str().map(|s| s.split("; ").count()).ok())
            .unwrap_or(0)
    }

    async fn get(&self, url: &str) -> Result<String, FetchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FetchError::closed(url));
        }

        // The slot is consumed even if the request fails.
        self.limiter.acquire_slot().await;

        debug!(url, "sending GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}

#[async_trait]
impl Fetcher for LightClient {
    fn name(&self) -> &'static str {
        "light"
    }

    #[instrument(skip(self))]
    async fn bootstrap(&self, url: &str) {
        info!(url, "bootstrapping session");
        match self.get(url).await {
            Ok(_) => info!(
                url,
                cookies = self.cookie_count(url),
                "bootstrap succeeded"
            ),
            Err(error) => warn!(url, error = %error, "bootstrap failed, continuing without it"),
        }
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        self.get(&request.url).await
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("light client closed");
        }
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, LightClientError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = || LightClientError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
