//! Chromium driver on top of chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::BrowserSettings;
use super::driver::{BrowserDriver, DriverError};
use crate::fetch::constants::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::user_agent::primary_locale;

/// Hides `navigator.webdriver` before any page script runs.
const HIDE_WEBDRIVER_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// A headless Chromium instance with one tab.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launches Chromium and opens the tab every fetch will reuse.
    ///
    /// If the browser starts but the tab cannot be prepared, the browser is
    /// shut down before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Launch`] if the browser or its tab cannot be
    /// started.
    #[instrument(skip_all, fields(headless = settings.headless))]
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .viewport(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                ..Viewport::default()
            })
            .request_timeout(settings.page_load_timeout)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", settings.user_agent))
            .arg(format!("--lang={}", primary_locale(&settings.accept_language)));
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    debug!(error = %error, "browser handler event error");
                }
            }
        });

        let page = match prepare_page(&browser, settings).await {
            Ok(page) => page,
            Err(error) => {
                if let Err(close_error) = browser.close().await {
                    warn!(error = %close_error, "failed to close half-started browser");
                }
                handler.abort();
                return Err(error);
            }
        };

        info!("browser session started");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

async fn prepare_page(browser: &Browser, settings: &BrowserSettings) -> Result<Page, DriverError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| DriverError::Launch(e.to_string()))?;

    let mut user_agent = SetUserAgentOverrideParams::new(settings.user_agent.clone());
    user_agent.accept_language = Some(settings.accept_language.clone());
    if let Err(error) = page.execute(user_agent).await {
        warn!(error = %error, "could not override user agent for the tab");
    }

    if let Err(error) = page
        .execute(AddScriptToEvaluateOnNewDocumentParams::new(
            HIDE_WEBDRIVER_SCRIPT,
        ))
        .await
    {
        warn!(error = %error, "could not install webdriver masking script");
    }

    Ok(page)
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(DriverError::command)?;
        match &response.result.error_text {
            Some(text) => Err(DriverError::Command(text.clone())),
            None => Ok(()),
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(DriverError::command)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click_first(&mut self, selector: &str) -> Result<bool, DriverError> {
        let Ok(element) = self.page.find_element(selector).await else {
            return Ok(false);
        };
        element.click().await.map_err(DriverError::command)?;
        Ok(true)
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        self.page.content().await.map_err(DriverError::command)
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        let closed = self.browser.close().await.map_err(DriverError::command);
        if let Err(error) = self.browser.wait().await {
            debug!(error = %error, "waiting for browser process failed");
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}
