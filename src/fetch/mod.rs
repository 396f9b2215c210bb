//! Page acquisition: pacing, retries, and the two fetch strategies.
//!
//! # Strategies
//!
//! - [`LightClient`] - plain HTTP through reqwest, with optional proxy and a
//!   cookie warm-up request
//! - [`BrowserClient`] - a single headless Chromium session that renders
//!   script-driven pages, dismisses consent popups and nudges lazy content
//!
//! Both implement [`Fetcher`] and are chosen once at startup. Either one is
//! driven through a [`RetryCoordinator`], which owns the retry policy.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use harvester_core::fetch::{
//!     FetchRequest, Fetcher, LightClient, LightClientOptions, RateLimiter, RetryCoordinator,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::new(Duration::from_secs(3));
//! let client = LightClient::new(LightClientOptions::default(), limiter)?;
//! let retry = RetryCoordinator::default();
//!
//! let request = FetchRequest::new("https://shop.example/catalog/");
//! if let Some(html) = retry.fetch(&client, &request).await.into_document() {
//!     println!("{} bytes", html.len());
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod browser;
mod constants;
mod error;
mod light;
pub mod rate_limiter;
mod retry;

use std::time::Duration;

use async_trait::async_trait;

pub use browser::{BrowserClient, BrowserDriver, BrowserSettings, ChromiumDriver, DriverError};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_WAIT_TIMEOUT, PAGE_LOAD_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS,
};
pub use error::{FailureClass, FetchError, classify_error};
pub use light::{LightClient, LightClientError, LightClientOptions};
pub use rate_limiter::RateLimiter;
pub use retry::{
    DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ATTEMPTS, FetchOutcome, RetryCoordinator, RetryDecision,
    RetryPolicy,
};

/// One page request. Built per call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL of the page.
    pub url: String,
    /// CSS selector the browser waits for before taking the page source.
    pub wait_selector: Option<String>,
    /// Bound for each of the browser's waits.
    pub timeout: Duration,
}

impl FetchRequest {
    /// Creates a request with no wait selector and the default wait timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_selector: None,
            timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Sets the selector to wait for. Blank selectors are ignored.
    #[must_use]
    pub fn with_wait_selector(mut self, selector: Option<&str>) -> Self {
        self.wait_selector = selector
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        self
    }

    /// Sets the wait timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A page acquisition strategy.
///
/// Implementations pace their own requests through a [`RateLimiter`] and
/// report failures as [`FetchError`]. Retrying is the caller's business.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Optional warm-up request before real traffic. Never fails.
    async fn bootstrap(&self, _url: &str) {}

    /// Fetches one page and returns its HTML.
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError>;

    /// Releases the strategy's resources. Safe to call more than once.
    async fn close(&self);
}
