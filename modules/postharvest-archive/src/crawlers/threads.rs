// Threads: render in a headless browser, snapshot the DOM, extract in Rust.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use browser_session::{evaluate, with_page, BrowserConfig, BrowserLauncher, BrowserPage, NavigateOptions};
use postharvest_common::{NormalizedPost, Platform};
use tracing::{info, warn};

use super::Crawler;
use crate::error::CrawlError;
use crate::extractor::{extract, extract_meta_only, DomSnapshot, ExtractedPost, SelectorProfile, SNAPSHOT_JS};
use crate::resolver::ResolvedUrl;

const DEFAULT_ATTEMPTS: u32 = 2;

pub struct ThreadsCrawler {
    launcher: Arc<dyn BrowserLauncher>,
    browser: BrowserConfig,
    profile: SelectorProfile,
    attempts: u32,
    screenshot_dir: Option<PathBuf>,
}

impl ThreadsCrawler {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, browser: BrowserConfig) -> Self {
        Self {
            launcher,
            browser,
            profile: SelectorProfile::threads(),
            attempts: DEFAULT_ATTEMPTS,
            screenshot_dir: None,
        }
    }

    pub fn with_profile(mut self, profile: SelectorProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Save a full-page screenshot here whenever extraction comes back empty.
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = Some(dir.into());
        self
    }

    async fn attempt(&self, url: &str) -> Result<NormalizedPost, CrawlError> {
        with_page(self.launcher.as_ref(), &self.browser, |page| async move {
            page.goto(url, NavigateOptions::settled(self.browser.navigation_timeout))
                .await?;
            page.wait_for(&self.profile.ready_selector, self.browser.wait_timeout)
                .await;

            let extracted = self.snapshot_and_extract(page.as_ref(), url).await?;
            if extracted.is_empty() {
                self.capture(page.as_ref(), url).await;
                return Err(CrawlError::Empty(url.to_string()));
            }

            info!(
                url,
                comments = extracted.comments.len(),
                images = extracted.images.len(),
                "Threads post extracted"
            );
            Ok(extracted.into_post(Platform::Threads, url))
        })
        .await
    }

    /// Evaluation errors degrade to meta-only; only a page that cannot even
    /// return its HTML fails the attempt.
    async fn snapshot_and_extract(
        &self,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<ExtractedPost, CrawlError> {
        match evaluate::<DomSnapshot>(page, SNAPSHOT_JS).await {
            Ok(snapshot) => Ok(extract(&snapshot, &self.profile)),
            Err(e) => {
                warn!(url, error = %e, "DOM snapshot failed, falling back to meta tags");
                let html = page.content().await?;
                Ok(extract_meta_only(&DomSnapshot::from_html(html)))
            }
        }
    }

    async fn capture(&self, page: &dyn BrowserPage, url: &str) {
        let Some(ref dir) = self.screenshot_dir else {
            return;
        };
        let bytes = match page.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url, error = %e, "Diagnostic screenshot failed");
                return;
            }
        };
        let name = format!("threads-empty-{}.png", chrono::Utc::now().timestamp_millis());
        let path = dir.join(name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => info!(url, path = %path.display(), "Saved diagnostic screenshot"),
            Err(e) => warn!(url, error = %e, "Could not write diagnostic screenshot"),
        }
    }
}

#[async_trait]
impl Crawler for ThreadsCrawler {
    fn name(&self) -> &str {
        "threads crawler"
    }

    async fn crawl(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
        let mut attempt = 1;
        loop {
            match self.attempt(&target.url).await {
                Ok(post) => return Ok(post),
                Err(CrawlError::Browser(e)) if e.is_fatal() && attempt < self.attempts => {
                    warn!(url = %target.url, attempt, error = %e, "Threads attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
