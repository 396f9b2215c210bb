//! Harvester Core Library
//!
//! Resilient page acquisition for catalog crawling: fetch pages from a site
//! that rate-limits, fails transiently, hides content behind popups or
//! renders it with scripts, and turn the item pages into flat records.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - Rate limiting, retry coordination and the light/browser fetch strategies
//! - [`crawl`] - Sequential catalog pagination and per-item processing
//! - [`extract`] - Link and field extraction with CSS selectors
//! - [`sink`] - Delimited output file
//! - [`config`] - Site configuration loading and validation
//! - [`proxy`] - Proxy list loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod proxy;
pub mod sink;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, SiteConfig};
pub use crawl::{CrawlController, CrawlPlan, CrawlReport, StopReason};
pub use extract::{ExtractError, ItemExtractor, LinkSelector, Record};
pub use fetch::{
    BrowserClient, FailureClass, FetchError, FetchOutcome, FetchRequest, Fetcher, LightClient,
    RateLimiter, RetryCoordinator, RetryPolicy, classify_error,
};
pub use sink::{DelimitedFileSink, RecordSink, SinkError};
