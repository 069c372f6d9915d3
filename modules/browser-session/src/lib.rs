pub mod chromium;
pub mod error;

pub use chromium::{Backend, ChromiumLauncher};
pub use error::{BrowserError, Result};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub user_agent: Option<String>,
    pub viewport: (u32, u32),
    pub navigation_timeout: Duration,
    pub wait_timeout: Duration,
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DESKTOP_USER_AGENT.to_string()),
            viewport: (1280, 2000),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Return as soon as the load event fires.
    Load,
    /// Wait for the load event, then give client-side rendering time to settle.
    Settle(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct NavigateOptions {
    pub wait: WaitStrategy,
    pub timeout: Duration,
}

impl NavigateOptions {
    pub fn settled(timeout: Duration) -> Self {
        Self {
            wait: WaitStrategy::Settle(Duration::from_millis(1500)),
            timeout,
        }
    }
}

/// Launches one browser process (or remote browser) per call.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn open(&mut self) -> Result<Box<dyn BrowserPage>>;
    async fn close(&mut self) -> Result<()>;
}

/// A live page. Everything returned from it is plain data; no handle into the
/// page's execution context escapes.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<()>;

    /// Soft wait: logs and returns false on timeout instead of failing.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> bool;

    /// Run a script in the page and return its JSON-serializable result.
    async fn evaluate_value(&self, script: &str) -> Result<serde_json::Value>;

    async fn content(&self) -> Result<String>;

    async fn screenshot(&self) -> Result<Vec<u8>>;
}

/// Typed wrapper over [`BrowserPage::evaluate_value`].
pub async fn evaluate<T: DeserializeOwned>(page: &dyn BrowserPage, script: &str) -> Result<T> {
    let value = page.evaluate_value(script).await?;
    serde_json::from_value(value).map_err(|e| BrowserError::Evaluate(e.to_string()))
}

/// Launch a browser, open one page, run `body`, and close the browser on
/// every exit path.
pub async fn with_page<T, E, F, Fut>(
    launcher: &dyn BrowserLauncher,
    config: &BrowserConfig,
    body: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(Box<dyn BrowserPage>) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<BrowserError>,
{
    let mut session = launcher.launch(config).await?;

    let outcome = match session.open().await {
        Ok(page) => body(page).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browser session");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        launched: AtomicUsize,
        closed: AtomicUsize,
    }

    struct FakeLauncher {
        counters: Arc<Counters>,
        fail_open: bool,
    }

    struct FakeSession {
        counters: Arc<Counters>,
        fail_open: bool,
    }

    struct FakePage;

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self, _config: &BrowserConfig) -> Result<Box<dyn BrowserSession>> {
            self.counters.launched.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                counters: self.counters.clone(),
                fail_open: self.fail_open,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn open(&mut self) -> Result<Box<dyn BrowserPage>> {
            if self.fail_open {
                return Err(BrowserError::Page("no target".into()));
            }
            Ok(Box::new(FakePage))
        }

        async fn close(&mut self) -> Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn goto(&self, url: &str, options: NavigateOptions) -> Result<()> {
            Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: options.timeout.as_millis() as u64,
            })
        }

        async fn wait_for(&self, _selector: &str, _timeout: Duration) -> bool {
            false
        }

        async fn evaluate_value(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::json!({ "count": 3 }))
        }

        async fn content(&self) -> Result<String> {
            Ok("<html></html>".into())
        }

        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(vec![0x89, 0x50])
        }
    }

    fn launcher(fail_open: bool) -> (FakeLauncher, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            FakeLauncher {
                counters: counters.clone(),
                fail_open,
            },
            counters,
        )
    }

    #[tokio::test]
    async fn closes_after_success() {
        let (launcher, counters) = launcher(false);
        let result: std::result::Result<String, BrowserError> =
            with_page(&launcher, &BrowserConfig::default(), |page| async move {
                page.content().await
            })
            .await;

        assert_eq!(result.unwrap(), "<html></html>");
        assert_eq!(counters.launched.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closes_after_navigation_timeout() {
        let (launcher, counters) = launcher(false);
        let result: std::result::Result<(), BrowserError> =
            with_page(&launcher, &BrowserConfig::default(), |page| async move {
                page.goto(
                    "https://example.com",
                    NavigateOptions::settled(Duration::from_millis(10)),
                )
                .await
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closes_when_page_cannot_open() {
        let (launcher, counters) = launcher(true);
        let result: std::result::Result<(), BrowserError> =
            with_page(&launcher, &BrowserConfig::default(), |_page| async move { Ok(()) }).await;

        assert!(result.is_err());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn typed_evaluate_decodes_plain_data() {
        #[derive(serde::Deserialize)]
        struct Count {
            count: u32,
        }

        let page = FakePage;
        let decoded: Count = evaluate(&page, "({count: 3})").await.unwrap();
        assert_eq!(decoded.count, 3);

        let mismatch: Result<Vec<String>> = evaluate(&page, "({count: 3})").await;
        assert!(matches!(mismatch, Err(BrowserError::Evaluate(_))));
    }
}
