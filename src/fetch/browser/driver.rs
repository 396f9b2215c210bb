//! The seam between the render procedure and a concrete browser.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a [`BrowserDriver`].
#[derive(Debug, Error)]
pub enum DriverError {
    /// The browser could not be started or configured.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A command sent to the browser failed.
    #[error("browser command failed: {0}")]
    Command(String),

    /// The session is gone.
    #[error("browser session closed")]
    SessionClosed,
}

impl DriverError {
    /// Wraps any displayable browser error as a command failure.
    pub fn command(error: impl std::fmt::Display) -> Self {
        Self::Command(error.to_string())
    }
}

/// Low-level operations on a single browser tab.
///
/// A driver is owned by exactly one session worker and is never shared, so
/// every method takes `&mut self`.
#[async_trait]
pub trait BrowserDriver: Send + 'static {
    /// Starts navigating to `url`. Returns once the navigation is committed;
    /// subresources may still be loading.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Evaluates a script expression in the page and returns its value
    /// (`Null` for `undefined`).
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Clicks the first element matching `selector`. `Ok(false)` when nothing
    /// matches.
    async fn click_first(&mut self, selector: &str) -> Result<bool, DriverError>;

    /// Serialized HTML of the current document.
    async fn page_source(&mut self) -> Result<String, DriverError>;

    /// Shuts the browser down.
    async fn quit(&mut self) -> Result<(), DriverError>;
}
