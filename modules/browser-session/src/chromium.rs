// Chromium backend over CDP. One `ChromiumSession` owns one browser process
// (or one remote browser connection) and the task driving its event handler.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{BrowserError, Result};
use crate::{
    BrowserConfig, BrowserLauncher, BrowserPage, BrowserSession, NavigateOptions, WaitStrategy,
};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub enum Backend {
    /// Spawn a local Chromium. `None` lets chromiumoxide locate the binary.
    Local { executable: Option<PathBuf> },
    /// Connect to an already-running browser, e.g. a Browserless websocket URL.
    Remote { ws_url: String },
}

pub struct ChromiumLauncher {
    backend: Backend,
}

impl ChromiumLauncher {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn local() -> Self {
        Self::new(Backend::Local { executable: None })
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserSession>> {
        let (browser, mut handler) = match &self.backend {
            Backend::Local { executable } => {
                let (width, height) = config.viewport;
                let mut builder = CdpConfig::builder()
                    .window_size(width, height)
                    .request_timeout(config.navigation_timeout)
                    .args([
                        "--disable-blink-features=AutomationControlled",
                        "--disable-dev-shm-usage",
                        "--disable-gpu",
                        "--no-sandbox",
                        "--no-first-run",
                        "--disable-extensions",
                    ]);
                if let Some(path) = executable {
                    builder = builder.chrome_executable(path);
                }
                if !config.headless {
                    builder = builder.with_head();
                }
                let cdp_config = builder.build().map_err(BrowserError::Launch)?;

                info!("Launching local Chromium");
                Browser::launch(cdp_config)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?
            }
            Backend::Remote { ws_url } => {
                info!("Connecting to remote browser");
                Browser::connect(ws_url.as_str())
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(ChromiumSession {
            browser,
            handler_task,
            user_agent: config.user_agent.clone(),
            closed: false,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_agent: Option<String>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open(&mut self) -> Result<Box<dyn BrowserPage>> {
        let page = self.browser.new_page("about:blank").await?;
        if let Some(ref ua) = self.user_agent {
            page.execute(SetUserAgentOverrideParams::new(ua.clone()))
                .await?;
        }
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();
        debug!("Browser session closed");

        result.map(|_| ()).map_err(BrowserError::from)
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<()> {
        match tokio::time::timeout(options.timeout, self.page.goto(url)).await {
            Err(_) => {
                return Err(BrowserError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: options.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }

        if let WaitStrategy::Settle(delay) = options.wait {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    selector,
                    timeout_ms = timeout.as_millis() as u64,
                    "Selector never appeared, continuing with partial render"
                );
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn evaluate_value(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| BrowserError::Evaluate(e.to_string()))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder().full_page(true).build();
        Ok(self.page.screenshot(params).await?)
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Browser session dropped without close; aborting handler");
            self.handler_task.abort();
        }
    }
}
