//! Request pacing for a single acquisition client.
//!
//! Each [`Fetcher`](super::Fetcher) owns one [`RateLimiter`]. Every request the
//! client makes, successful or not, first takes a slot from it, so consecutive
//! requests are always at least `interval` apart.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use harvester_core::fetch::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_secs(3));
//!
//! // First slot is granted immediately
//! limiter.acquire_slot().await;
//!
//! // Second slot waits until three seconds have passed since the first
//! limiter.acquire_slot().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::CUMULATIVE_DELAY_WARNING_THRESHOLD;

/// Minimum-interval rate limiter.
///
/// Uses the monotonic tokio clock, so wall-clock changes never shorten or
/// stretch the interval. The last-grant time is held under an async mutex for
/// the whole wait, which serializes callers: a second caller cannot be
/// granted a slot while the first is still waiting for its own.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,

    /// `None` until the first slot has been granted.
    last_grant: Mutex<Option<Instant>>,

    /// Total delay applied so far, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl RateLimiter {
    /// Creates a rate limiter with the given minimum interval.
    #[must_use]
    #[instrument(skip_all, fields(interval_ms = interval.as_millis()))]
    pub fn new(interval: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            interval,
            last_grant: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a rate limiter that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }

    /// Returns the configured minimum interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the total delay this limiter has imposed so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Waits until a request may be issued, then records the grant.
    ///
    /// The first call returns immediately.
    pub async fn acquire_slot(&self) {
        let mut last_grant = self.last_grant.lock().await;

        if let Some(previous) = *last_grant {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let delay = self.interval.saturating_sub(elapsed);
                let cumulative = self.add_cumulative_delay(delay);

                debug!(
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying rate limit delay"
                );

                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
                    && cumulative.saturating_sub(delay) < CUMULATIVE_DELAY_WARNING_THRESHOLD
                {
                    warn!(
                        cumulative_delay_secs = cumulative.as_secs(),
                        "rate limiting has added substantial delay to this run"
                    );
                }

                tokio::time::sleep(delay).await;
            }
        }

        *last_grant = Some(Instant::now());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}
