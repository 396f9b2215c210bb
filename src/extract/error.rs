//! Error types for selector compilation and record extraction.

use thiserror::Error;

/// Errors that can occur while building extractors or extracting a record.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// A selector expression is not valid CSS
    #[error("invalid selector '{selector}': {reason}\n  Suggestion: Check the selector in the site configuration")]
    InvalidSelector {
        /// The offending selector text
        selector: String,
        /// Parser message
        reason: String,
    },

    /// A selector expression has nothing to match with
    #[error("selector for '{field}' is empty")]
    EmptySelector {
        /// Field or role the selector belongs to
        field: String,
    },

    /// Base URL for link resolution is malformed
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The base URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Page came back without any content
    #[error("empty document for {url}")]
    EmptyDocument {
        /// Page URL
        url: String,
    },
}

impl ExtractError {
    /// Creates an `InvalidSelector` error.
    #[must_use]
    pub fn invalid_selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `EmptySelector` error.
    #[must_use]
    pub fn empty_selector(field: &str) -> Self {
        Self::EmptySelector {
            field: field.to_string(),
        }
    }

    /// Creates an `InvalidBaseUrl` error.
    #[must_use]
    pub fn invalid_base_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidBaseUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `EmptyDocument` error.
    #[must_use]
    pub fn empty_document(url: &str) -> Self {
        Self::EmptyDocument {
            url: url.to_string(),
        }
    }
}
