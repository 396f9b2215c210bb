//! Site configuration.
//!
//! One JSON file describes a target site: where the catalog lives, how to find
//! item links, which fields to pull from item pages, and how politely to
//! fetch. Everything except the domain and the selectors has a default.
//!
//! ```json
//! {
//!   "domain": "shop.example",
//!   "fetch": { "rate_limit": "1/3s" },
//!   "selectors": {
//!     "list_page": { "url": "https://shop.example/catalog/page/{page}/", "item_link": "a.product" },
//!     "item_page": { "fields": { "title": "h1", "price": ".price bdi" } }
//!   }
//! }
//! ```

mod rate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

pub use rate::{DEFAULT_RATE_LIMIT, parse_rate_limit};

use crate::crawl::{CatalogTemplate, CrawlPlan, DEFAULT_MAX_PAGES};
use crate::extract::{ExtractError, ItemExtractor, LinkSelector};
use crate::fetch::{
    BrowserSettings, DEFAULT_MAX_ATTEMPTS, LightClientOptions, PAGE_LOAD_TIMEOUT_SECS, RetryPolicy,
};
use crate::user_agent::{BROWSER_USER_AGENT, DEFAULT_ACCEPT_LANGUAGE};

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "configs/site.json";

/// Upper bound for every setting given in seconds.
pub const MAX_DURATION_SECS: u64 = 3600;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BACKOFF_SECS: u64 = 3;

/// Errors loading or validating a site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or does not have the expected shape
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range or malformed
    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    InvalidValue {
        /// Dotted path of the setting
        field: String,
        /// The rejected value
        value: String,
        /// What would have been accepted
        expected: String,
    },

    /// A selector expression does not compile
    #[error("Invalid config value for `{field}`: {source}")]
    Selector {
        /// Dotted path of the setting
        field: String,
        /// Selector error
        #[source]
        source: ExtractError,
    },
}

impl ConfigError {
    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid(field: &str, value: impl std::fmt::Display, expected: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    fn selector(field: &str, source: ExtractError) -> Self {
        Self::Selector {
            field: field.to_string(),
            source,
        }
    }
}

/// A whole site configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site domain, used for the default base URL.
    pub domain: String,
    /// Base for resolving relative item links. Defaults to `https://{domain}`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request pacing and HTTP details.
    #[serde(default)]
    pub fetch: FetchSection,
    /// Strategy switches.
    #[serde(default)]
    pub technologies: Technologies,
    /// Browser session settings.
    #[serde(default)]
    pub browser: BrowserSection,
    /// Retry budget.
    #[serde(default)]
    pub retry: RetrySection,
    /// Page selectors.
    pub selectors: Selectors,
}

/// `fetch` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    /// Rate directive such as `"1/3s"` or `"3s"`.
    pub rate_limit: String,
    /// Default request headers.
    pub headers: BTreeMap<String, String>,
    /// Bound for each browser wait, in seconds.
    pub timeout_secs: u64,
    /// Last catalog page to visit (inclusive).
    pub max_pages: u32,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT.to_string(),
            headers: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// `technologies` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Technologies {
    /// Route light-client traffic through a proxy from the proxy list.
    pub proxy: bool,
    /// Use the browser strategy instead of the light client.
    pub browser: bool,
    /// Request the base URL once before crawling to pick up session cookies.
    pub bootstrap: bool,
}

/// `browser` section. List settings left out fall back to built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    /// Run without a window.
    pub headless: bool,
    /// Overrides the User-Agent header / built-in default.
    pub user_agent: Option<String>,
    /// Overrides the Accept-Language header / built-in default.
    pub accept_language: Option<String>,
    /// Bound on a single navigation, in seconds.
    pub page_load_timeout_secs: u64,
    /// Explicit Chromium binary.
    pub executable: Option<PathBuf>,
    /// Cookie-consent button selectors.
    pub consent_selectors: Option<Vec<String>>,
    /// Region confirmation button selectors.
    pub region_selectors: Option<Vec<String>>,
    /// Affirmative button captions.
    pub accept_texts: Option<Vec<String>>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: None,
            accept_language: None,
            page_load_timeout_secs: PAGE_LOAD_TIMEOUT_SECS,
            executable: None,
            consent_selectors: None,
            region_selectors: None,
            accept_texts: None,
        }
    }
}

/// `retry` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Attempts per URL, including the first.
    pub max_attempts: u32,
    /// Backoff unit in seconds.
    pub backoff_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_secs: DEFAULT_BACKOFF_SECS,
        }
    }
}

/// `selectors` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Selectors {
    /// Catalog pages.
    pub list_page: ListPage,
    /// Item pages.
    pub item_page: ItemPage,
}

/// `selectors.list_page` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage {
    /// Catalog URL template with a `{page}` placeholder.
    pub url: String,
    /// Item link selector, optionally with `::attr(name)`.
    pub item_link: String,
    /// Selector the browser waits for.
    #[serde(default)]
    pub wait_selector: Option<String>,
}

/// `selectors.item_page` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPage {
    /// Field name to selector expression, in output column order.
    pub fields: Map<String, Value>,
    /// Selector the browser waits for.
    #[serde(default)]
    pub wait_selector: Option<String>,
}

impl SiteConfig {
    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid JSON
    /// of the expected shape, or fails [`validate`](Self::validate).
    #[instrument(fields(path = %path.as_ref().display()), skip_all)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(domain = %config.domain, "loaded site config");
        Ok(config)
    }

    /// Checks every setting that can be checked without network access.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() && self.base_url.is_none() {
            return Err(ConfigError::invalid(
                "domain",
                "\"\"",
                "a domain or an explicit base_url",
            ));
        }
        self.rate_interval()?;
        if self.fetch.max_pages == 0 {
            return Err(ConfigError::invalid("fetch.max_pages", 0, "at least 1"));
        }
        check_seconds("fetch.timeout_secs", self.fetch.timeout_secs, 1)?;
        check_seconds(
            "browser.page_load_timeout_secs",
            self.browser.page_load_timeout_secs,
            1,
        )?;
        check_seconds("retry.backoff_secs", self.retry.backoff_secs, 0)?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", 0, "at least 1"));
        }
        if self.selectors.list_page.url.trim().is_empty() {
            return Err(ConfigError::invalid(
                "selectors.list_page.url",
                "\"\"",
                "a catalog URL template",
            ));
        }
        self.link_selector()?;
        ItemExtractor::new(&self.field_table()?)
            .map_err(|e| ConfigError::selector("selectors.item_page.fields", e))?;
        Ok(())
    }

    /// Base URL for resolving relative links.
    #[must_use]
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => format!("https://{}", self.domain.trim()),
        }
    }

    /// URL of the warm-up request, if `technologies.bootstrap` is on.
    #[must_use]
    pub fn bootstrap_url(&self) -> Option<String> {
        self.technologies.bootstrap.then(|| self.base_url())
    }

    /// Minimum interval between requests.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a malformed directive.
    pub fn rate_interval(&self) -> Result<Duration, ConfigError> {
        parse_rate_limit(&self.fetch.rate_limit)
    }

    /// Field table in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the table is empty or an entry
    /// is not a string.
    pub fn field_table(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let fields = &self.selectors.item_page.fields;
        if fields.is_empty() {
            return Err(ConfigError::invalid(
                "selectors.item_page.fields",
                "{}",
                "at least one field",
            ));
        }
        fields
            .iter()
            .map(|(name, value)| match value {
                Value::String(expression) => Ok((name.clone(), expression.clone())),
                other => Err(ConfigError::invalid(
                    &format!("selectors.item_page.fields.{name}"),
                    other,
                    "a selector string",
                )),
            })
            .collect()
    }

    fn link_selector(&self) -> Result<LinkSelector, ConfigError> {
        LinkSelector::new(&self.selectors.list_page.item_link, &self.base_url())
            .map_err(|e| ConfigError::selector("selectors.list_page.item_link", e))
    }

    /// Builds the crawl plan.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a selector does not compile.
    pub fn crawl_plan(&self) -> Result<CrawlPlan, ConfigError> {
        let extractor = ItemExtractor::new(&self.field_table()?)
            .map_err(|e| ConfigError::selector("selectors.item_page.fields", e))?;
        let mut plan = CrawlPlan::new(
            CatalogTemplate::new(self.selectors.list_page.url.trim()),
            self.link_selector()?,
            extractor,
        );
        plan.catalog_wait_selector = self.selectors.list_page.wait_selector.clone();
        plan.item_wait_selector = self.selectors.item_page.wait_selector.clone();
        plan.wait_timeout = Duration::from_secs(self.fetch.timeout_secs);
        plan.max_pages = self.fetch.max_pages;
        Ok(plan)
    }

    /// Retry policy from the `retry` section.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.backoff_secs),
        )
    }

    /// Light-client options; `proxies` is used only when proxying is enabled.
    #[must_use]
    pub fn light_options(&self, proxies: Vec<String>) -> LightClientOptions {
        LightClientOptions {
            headers: self
                .fetch
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            proxies: if self.technologies.proxy {
                proxies
            } else {
                Vec::new()
            },
            ..LightClientOptions::default()
        }
    }

    /// Browser session settings. User-Agent and language fall back to the
    /// request headers, then to built-in defaults.
    #[must_use]
    pub fn browser_settings(&self) -> BrowserSettings {
        let defaults = BrowserSettings::default();
        let section = &self.browser;
        BrowserSettings {
            headless: section.headless,
            user_agent: section
                .user_agent
                .clone()
                .or_else(|| self.header("User-Agent"))
                .unwrap_or_else(|| BROWSER_USER_AGENT.to_string()),
            accept_language: section
                .accept_language
                .clone()
                .or_else(|| self.header("Accept-Language"))
                .unwrap_or_else(|| DEFAULT_ACCEPT_LANGUAGE.to_string()),
            page_load_timeout: Duration::from_secs(section.page_load_timeout_secs),
            executable: section.executable.clone(),
            consent_selectors: section
                .consent_selectors
                .clone()
                .unwrap_or(defaults.consent_selectors),
            region_selectors: section
                .region_selectors
                .clone()
                .unwrap_or(defaults.region_selectors),
            accept_texts: section.accept_texts.clone().unwrap_or(defaults.accept_texts),
        }
    }

    /// Header value by case-insensitive name.
    fn header(&self, name: &str) -> Option<String> {
        self.fetch
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

fn check_seconds(field: &str, value: u64, min: u64) -> Result<(), ConfigError> {
    if (min..=MAX_DURATION_SECS).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::invalid(
        field,
        value,
        &format!("{min} to {MAX_DURATION_SECS} seconds"),
    ))
}
