// Any other platform: load the page and keep what its meta tags say.

use std::sync::Arc;

use async_trait::async_trait;
use browser_session::{evaluate, with_page, BrowserConfig, BrowserLauncher, NavigateOptions};
use postharvest_common::NormalizedPost;
use tracing::{info, warn};

use super::Crawler;
use crate::error::CrawlError;
use crate::extractor::{extract_meta_only, DomSnapshot, SNAPSHOT_JS};
use crate::resolver::ResolvedUrl;

pub struct GenericCrawler {
    launcher: Arc<dyn BrowserLauncher>,
    browser: BrowserConfig,
}

impl GenericCrawler {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, browser: BrowserConfig) -> Self {
        Self { launcher, browser }
    }
}

#[async_trait]
impl Crawler for GenericCrawler {
    fn name(&self) -> &str {
        "generic crawler"
    }

    async fn crawl(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
        let url = target.url.as_str();
        let snapshot = with_page(self.launcher.as_ref(), &self.browser, |page| async move {
            page.goto(url, NavigateOptions::settled(self.browser.navigation_timeout))
                .await?;
            match evaluate::<DomSnapshot>(page.as_ref(), SNAPSHOT_JS).await {
                Ok(snapshot) => Ok::<_, CrawlError>(snapshot),
                Err(e) => {
                    warn!(url, error = %e, "DOM snapshot failed, reading raw HTML");
                    Ok(DomSnapshot::from_html(page.content().await?))
                }
            }
        })
        .await?;

        let extracted = extract_meta_only(&snapshot);
        if extracted.is_empty() {
            return Err(CrawlError::Empty(target.url.clone()));
        }

        info!(url, platform = %target.platform, "Page metadata extracted");
        Ok(extracted.into_post(target.platform, url))
    }
}
