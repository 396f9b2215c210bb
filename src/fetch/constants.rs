//! Constants for the fetch module (timeouts, pacing, browser defaults).

use std::time::Duration;

/// HTTP connect timeout for the light client (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall HTTP request timeout for the light client (60 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default bound for DOM-ready and wait-selector polling (30 seconds).
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default browser navigation timeout (60 seconds).
pub const PAGE_LOAD_TIMEOUT_SECS: u64 = 60;

/// How often the browser client re-checks ready state and wait selectors.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Warning threshold for cumulative rate limit delay (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Browser window and viewport size.
pub const VIEWPORT_WIDTH: u32 = 1366;
/// Browser window and viewport height.
pub const VIEWPORT_HEIGHT: u32 = 900;

/// Pixels scrolled after load to trigger lazy content.
pub const LAZY_SCROLL_PIXELS: u32 = 300;
