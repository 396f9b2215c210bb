//! Retry policy and the coordinator that drives attempts for one URL.
//!
//! A failed fetch is classified into a [`FailureClass`]; the [`RetryPolicy`]
//! turns class and attempt number into a [`RetryDecision`], and the
//! [`RetryCoordinator`] carries the decision out.
//!
//! # Policy
//!
//! - `NotFound` is skipped at once.
//! - Timeouts and server errors are retried until `max_attempts` is spent.
//! - Other client errors and unclassified faults are retried the same way.
//! - The wait before attempt `n + 1` is `backoff_unit × n`. There is no wait
//!   after the final attempt.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::fetch::{FailureClass, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(3));
//!
//! match policy.should_retry(FailureClass::ServerError(503), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(3));
//!         assert_eq!(attempt, 2);
//!     }
//!     other => panic!("unexpected decision: {other:?}"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::error::{FailureClass, FetchError};
use super::{FetchRequest, Fetcher};

/// Default maximum attempts per URL.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit (3 seconds).
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(3);

/// Decision on what to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// The attempt number that will run next (1-indexed).
        attempt: u32,
    },

    /// Give up on this URL without spending more attempts.
    Skip,

    /// Every allowed attempt has been made.
    Exhausted,
}

/// Attempt budget and linear backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one. Always at least 1.
    max_attempts: u32,

    /// Multiplied by the failed attempt number to get the wait.
    backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Creates a policy with a custom attempt budget and the default unit.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_BACKOFF_UNIT)
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff unit.
    #[must_use]
    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }

    /// Wait inserted after failed attempt `attempt` (1-indexed). Saturates at
    /// [`Duration::MAX`].
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }

    /// Decides what follows a failure of class `class` on attempt `attempt`.
    #[must_use]
    pub fn should_retry(&self, class: FailureClass, attempt: u32) -> RetryDecision {
        if class.is_terminal() {
            return RetryDecision::Skip;
        }

        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }

        RetryDecision::Retry {
            delay: self.backoff_for(attempt),
            attempt: attempt + 1,
        }
    }
}

/// Final result of a coordinated fetch.
///
/// `Skipped` and `Exhausted` both mean "no document"; they are kept apart so
/// callers can log and count them separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The document body.
    Success(String),

    /// The page does not exist; no retry was made.
    Skipped {
        /// Number of attempts made.
        attempts: u32,
    },

    /// All attempts failed.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Class of the last failure.
        last_failure: FailureClass,
    },
}

impl FetchOutcome {
    /// Returns the document on success.
    #[must_use]
    pub fn into_document(self) -> Option<String> {
        match self {
            Self::Success(body) => Some(body),
            Self::Skipped { .. } | Self::Exhausted { .. } => None,
        }
    }

    /// Number of attempts made, for outcomes without a document.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Success(_) => None,
            Self::Skipped { attempts } | Self::Exhausted { attempts, .. } => Some(*attempts),
        }
    }
}

/// Runs fetch attempts for one URL under a [`RetryPolicy`].
///
/// Attempts are strictly sequential; the coordinator never has two attempts
/// for the same URL in flight.
#[derive(Debug, Clone, Default)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
}

impl RetryCoordinator {
    /// Creates a coordinator with the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `request` through `fetcher`, retrying per policy.
    pub async fn fetch(&self, fetcher: &dyn Fetcher, request: &FetchRequest) -> FetchOutcome {
        self.run(&request.url, || fetcher.fetch(request)).await
    }

    /// Runs `operation` until it succeeds, is skipped, or the budget is spent.
    #[instrument(skip(self, operation), fields(max_attempts = self.policy.max_attempts))]
    pub async fn run<F, Fut>(&self, url: &str, mut operation: F) -> FetchOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            let error = match operation().await {
                Ok(body) => return FetchOutcome::Success(body),
                Err(error) => error,
            };

            let class = error.failure_class();
            if matches!(
                class,
                FailureClass::ClientError(_) | FailureClass::Unclassified
            ) {
                warn!(url, %class, attempt, error = %error, "unexpected fetch failure, treating as retryable");
            } else {
                warn!(url, %class, attempt, error = %error, "fetch failed");
            }

            match self.policy.should_retry(class, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url,
                        %class,
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis(),
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Skip => {
                    warn!(url, %class, attempt, "page not found, skipping");
                    return FetchOutcome::Skipped { attempts: attempt };
                }
                RetryDecision::Exhausted => {
                    warn!(url, %class, attempts = attempt, "all fetch attempts exhausted");
                    return FetchOutcome::Exhausted {
                        attempts: attempt,
                        last_failure: class,
                    };
                }
            }
        }
    }
}
