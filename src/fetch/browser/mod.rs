//! Browser acquisition strategy.
//!
//! [`BrowserClient`] keeps one browser session for the whole run. The session
//! lives on a dedicated worker task that owns the [`BrowserDriver`]
//! exclusively; `fetch` hands the worker a job and waits for the rendered HTML,
//! so only one page is ever rendered at a time.
//!
//! Rendering is best-effort. Navigation timeouts, a document that never
//! becomes ready, popups that won't close and wait selectors that never match
//! are all logged and absorbed: whatever HTML the tab holds at the end is
//! returned. Only a session that cannot produce any source yields `""`.

mod chromium;
mod driver;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

pub use chromium::ChromiumDriver;
pub use driver::{BrowserDriver, DriverError};

use super::constants::{LAZY_SCROLL_PIXELS, PAGE_LOAD_TIMEOUT_SECS, POLL_INTERVAL};
use super::{FetchError, FetchRequest, Fetcher, RateLimiter};
use crate::user_agent::{BROWSER_USER_AGENT, DEFAULT_ACCEPT_LANGUAGE};

/// Cookie-consent buttons, tried in order until one is clicked.
pub const DEFAULT_CONSENT_SELECTORS: [&str; 7] = [
    "button.cookie-accept",
    "button#cookie-accept",
    "button[data-accept]",
    ".cookie .btn-accept",
    ".cookies__accept",
    "button[onclick*='cookie']",
    "button[aria-label*='Принять']",
];

/// Region/city confirmation buttons, tried in order until one is clicked.
pub const DEFAULT_REGION_SELECTORS: [&str; 4] = [
    "button[class*='confirm']",
    "button[class*='accept']",
    ".modal [type='button'].btn-primary",
    ".region-confirm__actions .button",
];

/// Button captions treated as "yes, dismiss this".
pub const DEFAULT_ACCEPT_TEXTS: [&str; 10] = [
    "Принять",
    "Согласен",
    "Да, верно",
    "Хорошо",
    "Понятно",
    "Ок",
    "OK",
    "Accept",
    "Agree",
    "Got it",
];

const READY_STATE_SCRIPT: &str = "document.readyState";

/// Stand-in deadline distance for limits too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Browser session settings.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Run without a visible window.
    pub headless: bool,
    /// User-Agent presented by the browser.
    pub user_agent: String,
    /// `Accept-Language`; its first tag also sets the browser locale.
    pub accept_language: String,
    /// Bound on a single navigation.
    pub page_load_timeout: Duration,
    /// Explicit Chromium binary. Auto-detected when `None`.
    pub executable: Option<PathBuf>,
    /// Consent popup selectors.
    pub consent_selectors: Vec<String>,
    /// Region confirmation selectors.
    pub region_selectors: Vec<String>,
    /// Affirmative button captions for the generic dismissal script.
    pub accept_texts: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            page_load_timeout: Duration::from_secs(PAGE_LOAD_TIMEOUT_SECS),
            executable: None,
            consent_selectors: to_strings(&DEFAULT_CONSENT_SELECTORS),
            region_selectors: to_strings(&DEFAULT_REGION_SELECTORS),
            accept_texts: to_strings(&DEFAULT_ACCEPT_TEXTS),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// A render request handed to the session worker.
struct RenderJob {
    request: FetchRequest,
    reply: oneshot::Sender<String>,
}

/// Handle to the running session worker.
struct Session {
    jobs: mpsc::Sender<RenderJob>,
    worker: JoinHandle<()>,
}

/// Fetch strategy backed by one long-lived browser session.
pub struct BrowserClient {
    limiter: RateLimiter,
    session: Mutex<Option<Session>>,
}

impl BrowserClient {
    /// Launches Chromium and starts the session worker.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Launch`] if the browser cannot be started.
    pub async fn launch(settings: BrowserSettings, limiter: RateLimiter) -> Result<Self, DriverError> {
        let driver = ChromiumDriver::launch(&settings).await?;
        Ok(Self::with_driver(driver, settings, limiter))
    }

    /// Starts the session worker around an already running driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_driver<D: BrowserDriver>(
        driver: D,
        settings: BrowserSettings,
        limiter: RateLimiter,
    ) -> Self {
        let (jobs, inbox) = mpsc::channel(1);
        let worker = tokio::spawn(run_session(driver, settings, inbox));
        Self {
            limiter,
            session: Mutex::new(Some(Session { jobs, worker })),
        }
    }
}

#[async_trait]
impl Fetcher for BrowserClient {
    fn name(&self) -> &'static str {
        "browser"
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let jobs = {
            let session = self.session.lock().await;
            match session.as_ref() {
                Some(session) => session.jobs.clone(),
                None => return Err(FetchError::closed(&request.url)),
            }
        };

        self.limiter.acquire_slot().await;

        let (reply, rendered) = oneshot::channel();
        let job = RenderJob {
            request: request.clone(),
            reply,
        };
        jobs.send(job)
            .await
            .map_err(|_| FetchError::browser(&request.url, "browser worker has stopped"))?;
        rendered
            .await
            .map_err(|_| FetchError::browser(&request.url, "browser worker dropped the request"))
    }

    async fn close(&self) {
        let Some(Session { jobs, worker }) = self.session.lock().await.take() else {
            debug!("browser client already closed");
            return;
        };

        // Closing the job channel ends the worker loop, which quits the browser.
        drop(jobs);
        if let Err(error) = worker.await {
            warn!(error = %error, "browser worker ended abnormally");
        }
    }
}

/// Worker loop: renders jobs one at a time, then quits the browser once the
/// job channel closes.
async fn run_session<D: BrowserDriver>(
    mut driver: D,
    settings: BrowserSettings,
    mut inbox: mpsc::Receiver<RenderJob>,
) {
    while let Some(RenderJob { request, reply }) = inbox.recv().await {
        let html = render(&mut driver, &settings, &request).await;
        if reply.send(html).is_err() {
            debug!(url = %request.url, "fetch caller went away before the page was returned");
        }
    }

    match driver.quit().await {
        Ok(()) => info!("browser session closed"),
        Err(error) => warn!(error = %error, "browser did not shut down cleanly"),
    }
}

/// Loads `request.url` and returns whatever HTML the tab holds afterwards.
async fn render<D: BrowserDriver>(
    driver: &mut D,
    settings: &BrowserSettings,
    request: &FetchRequest,
) -> String {
    navigate(driver, &request.url, settings.page_load_timeout).await;

    if !wait_until(driver, READY_STATE_SCRIPT, request.timeout, is_ready_state).await {
        debug!(url = %request.url, "document not ready before timeout, continuing");
    }

    if timeout(request.timeout, dismiss_popups(driver, settings))
        .await
        .is_err()
    {
        debug!(url = %request.url, "popup dismissal timed out");
    }

    if let Err(error) = driver
        .evaluate(&format!("window.scrollBy(0, {LAZY_SCROLL_PIXELS});"))
        .await
    {
        debug!(error = %error, "lazy-content scroll failed");
    }

    if let Some(selector) = &request.wait_selector {
        let script = selector_count_script(selector);
        if !wait_until(driver, &script, request.timeout, has_matches).await {
            debug!(url = %request.url, selector, "wait selector not found before timeout, continuing");
        }
    }

    match driver.page_source().await {
        Ok(html) => html,
        Err(error) => {
            warn!(url = %request.url, error = %error, "browser produced no document");
            String::new()
        }
    }
}

async fn navigate<D: BrowserDriver>(driver: &mut D, url: &str, limit: Duration) {
    match timeout(limit, driver.navigate(url)).await {
        Ok(Ok(())) => debug!(url, "navigation committed"),
        Err(_) => debug!(url, "navigation timed out, using partial document"),
        Ok(Err(error)) => {
            warn!(url, error = %error, "navigation failed, retrying once");
            match timeout(limit, driver.navigate(url)).await {
                Ok(Ok(())) => debug!(url, "navigation committed on second try"),
                Ok(Err(error)) => warn!(url, error = %error, "navigation failed again, using current document"),
                Err(_) => debug!(url, "navigation timed out on second try"),
            }
        }
    }
}

fn deadline_after(limit: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(limit).unwrap_or(now + FAR_FUTURE)
}

/// Re-evaluates `script` until `accept` holds or `limit` runs out.
async fn wait_until<D, F>(driver: &mut D, script: &str, limit: Duration, accept: F) -> bool
where
    D: BrowserDriver,
    F: Fn(&Value) -> bool,
{
    let deadline = deadline_after(limit);
    loop {
        match timeout_at(deadline, driver.evaluate(script)).await {
            Ok(Ok(value)) if accept(&value) => return true,
            Ok(Ok(_)) => {}
            Ok(Err(error)) => debug!(error = %error, "poll evaluation failed"),
            Err(_) => return false,
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

fn is_ready_state(value: &Value) -> bool {
    matches!(value.as_str(), Some("interactive" | "complete"))
}

fn has_matches(value: &Value) -> bool {
    value.as_u64().is_some_and(|count| count > 0)
}

async fn dismiss_popups<D: BrowserDriver>(driver: &mut D, settings: &BrowserSettings) {
    for group in [&settings.consent_selectors, &settings.region_selectors] {
        for selector in group {
            match driver.click_first(selector).await {
                Ok(true) => {
                    debug!(selector, "dismissed popup");
                    break;
                }
                Ok(false) => {}
                Err(error) => debug!(selector, error = %error, "popup click failed"),
            }
        }
    }

    if settings.accept_texts.is_empty() {
        return;
    }
    match driver.evaluate(&accept_button_script(&settings.accept_texts)).await {
        Ok(Value::Bool(true)) => debug!("clicked affirmative button"),
        Ok(_) => {}
        Err(error) => debug!(error = %error, "affirmative button script failed"),
    }
}

/// Script counting elements that match `selector`.
fn selector_count_script(selector: &str) -> String {
    format!(
        "document.querySelectorAll({}).length",
        Value::from(selector)
    )
}

/// Script clicking the first button-like element whose caption contains one
/// of `texts` (case-insensitive). Evaluates to whether it clicked.
fn accept_button_script(texts: &[String]) -> String {
    let texts = Value::from(texts.to_vec());
    format!(
        r#"(() => {{
    const texts = {texts}.map((t) => t.toLowerCase());
    const nodes = Array.from(document.querySelectorAll('button, a[role="button"], .btn, .button'));
    for (const node of nodes) {{
        const caption = (node.innerText || node.textContent || '').trim().toLowerCase();
        if (caption && texts.some((t) => caption.includes(t))) {{
            node.click();
            return true;
        }}
    }}
    return false;
}})()"#
    )
}
