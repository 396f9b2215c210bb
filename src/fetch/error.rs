//! Error types for page acquisition.
//!
//! Every fault raised by the HTTP transport or the browser session is turned
//! into a [`FetchError`], and every [`FetchError`] maps to exactly one
//! [`FailureClass`]. The retry coordinator only ever looks at the class.

use std::fmt;

use thiserror::Error;

/// Classification of a failed fetch, used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The TCP/TLS connection could not be established in time.
    ConnectTimeout,
    /// The connection was made but the response did not arrive in time.
    ReadTimeout,
    /// HTTP 5xx.
    ServerError(u16),
    /// HTTP 404. Terminal: the page is skipped without retrying.
    NotFound,
    /// Any other HTTP 4xx.
    ClientError(u16),
    /// Anything the transport or browser raised that fits no other class.
    Unclassified,
}

impl FailureClass {
    /// Whether this failure ends the retry loop immediately.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectTimeout => write!(f, "connect-timeout"),
            Self::ReadTimeout => write!(f, "read-timeout"),
            Self::ServerError(code) => write!(f, "server-error({code})"),
            Self::NotFound => write!(f, "not-found"),
            Self::ClientError(code) => write!(f, "client-error({code})"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Errors that can occur while acquiring a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection could not be established before the connect timeout.
    #[error("connect timeout fetching {url}")]
    ConnectTimeout {
        /// The URL being fetched.
        url: String,
    },

    /// Response did not complete before the overall timeout.
    #[error("read timeout fetching {url}")]
    ReadTimeout {
        /// The URL being fetched.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level error other than a timeout (DNS, refused, TLS, body decode).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The browser session is gone or refused the command.
    #[error("browser session error fetching {url}: {message}")]
    Browser {
        /// The URL being fetched.
        url: String,
        /// What the session reported.
        message: String,
    },

    /// The client was already closed.
    #[error("client closed before fetching {url}")]
    Closed {
        /// The URL being fetched.
        url: String,
    },
}

impl FetchError {
    /// Creates a connect-timeout error.
    pub fn connect_timeout(url: impl Into<String>) -> Self {
        Self::ConnectTimeout { url: url.into() }
    }

    /// Creates a read-timeout error.
    pub fn read_timeout(url: impl Into<String>) -> Self {
        Self::ReadTimeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a browser session error.
    pub fn browser(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Browser {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a closed-client error.
    pub fn closed(url: impl Into<String>) -> Self {
        Self::Closed { url: url.into() }
    }

    /// Maps a reqwest error into the matching variant.
    ///
    /// Timeouts during connection setup are told apart from timeouts while
    /// waiting for the response.
    pub fn from_reqwest(url: impl Into<String>, error: reqwest::Error) -> Self {
        let url = url.into();
        if error.is_timeout() {
            if error.is_connect() {
                Self::connect_timeout(url)
            } else {
                Self::read_timeout(url)
            }
        } else if let Some(status) = error.status() {
            Self::http_status(url, status.as_u16())
        } else {
            Self::network(url, error)
        }
    }

    /// The URL this error is about.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::ConnectTimeout { url }
            | Self::ReadTimeout { url }
            | Self::HttpStatus { url, .. }
            | Self::Network { url, .. }
            | Self::Browser { url, .. }
            | Self::Closed { url } => url,
        }
    }

    /// Classifies this error. See [`classify_error`].
    #[must_use]
    pub fn failure_class(&self) -> FailureClass {
        classify_error(self)
    }
}

/// Classifies a fetch error into a failure class for retry decisions.
///
/// | Error | Class |
/// |-------|-------|
/// | connect timeout | `ConnectTimeout` |
/// | read timeout | `ReadTimeout` |
/// | HTTP 404 | `NotFound` |
/// | other HTTP 4xx | `ClientError(code)` |
/// | HTTP 5xx | `ServerError(code)` |
/// | network, browser, closed, odd statuses | `Unclassified` |
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureClass {
    match error {
        FetchError::ConnectTimeout { .. } => FailureClass::ConnectTimeout,
        FetchError::ReadTimeout { .. } => FailureClass::ReadTimeout,
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Network { .. } | FetchError::Browser { .. } | FetchError::Closed { .. } => {
            FailureClass::Unclassified
        }
    }
}

fn classify_http_status(status: u16) -> FailureClass {
    match status {
        404 => FailureClass::NotFound,
        status if (400..500).contains(&status) => FailureClass::ClientError(status),
        status if (500..600).contains(&status) => FailureClass::ServerError(status),
        _ => FailureClass::Unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_404_not_found() {
        let error = FetchError::http_status("http://example.com", 404);
        assert_eq!(classify_error(&error), FailureClass::NotFound);
        assert!(error.failure_class().is_terminal());
    }

    #[test]
    fn test_classify_server_errors() {
        for status in [500, 502, 503, 504, 599] {
            let error = FetchError::http_status("http://example.com", status);
            assert_eq!(classify_error(&error), FailureClass::ServerError(status));
        }
    }

    #[test]
    fn test_classify_other_client_errors() {
        for status in [400, 401, 403, 429] {
            let error = FetchError::http_status("http://example.com", status);
            assert_eq!(classify_error(&error), FailureClass::ClientError(status));
            assert!(!error.failure_class().is_terminal());
        }
    }

    #[test]
    fn test_classify_timeouts() {
        assert_eq!(
            classify_error(&FetchError::connect_timeout("http://example.com")),
            FailureClass::ConnectTimeout
        );
        assert_eq!(
            classify_error(&FetchError::read_timeout("http://example.com")),
            FailureClass::ReadTimeout
        );
    }

    #[test]
    fn test_classify_browser_and_closed_unclassified() {
        assert_eq!(
            classify_error(&FetchError::browser("http://example.com", "gone")),
            FailureClass::Unclassified
        );
        assert_eq!(
            classify_error(&FetchError::closed("http://example.com")),
            FailureClass::Unclassified
        );
    }

    #[test]
    fn test_classify_unexpected_status_unclassified() {
        let error = FetchError::http_status("http://example.com", 302);
        assert_eq!(classify_error(&error), FailureClass::Unclassified);
    }

    #[test]
    fn test_fetch_error_display_contains_url_and_status() {
        let error = FetchError::http_status("https://shop.example/item/1", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected status in: {msg}");
        assert!(msg.contains("https://shop.example/item/1"), "Expected URL in: {msg}");
        assert_eq!(error.url(), "https://shop.example/item/1");
    }

    #[test]
    fn test_failure_class_display() {
        assert_eq!(FailureClass::ServerError(502).to_string(), "server-error(502)");
        assert_eq!(FailureClass::NotFound.to_string(), "not-found");
    }
}
