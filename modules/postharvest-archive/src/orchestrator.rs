// Orchestrator: the public entry point. Resolves the platform, picks an
// acquisition strategy, and hands every successful result to persistence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use apify_client::ApifyClient;
use browser_session::{Backend, BrowserConfig, BrowserLauncher, ChromiumLauncher};
use postharvest_common::{
    Acquisition, AcquisitionSource, AnalysisResult, AppConfig, NormalizedPost, Platform,
    PostAnalyzer, PostRecord,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::crawlers::{
    ApifySecondary, Crawler, FallbackCrawler, GenericCrawler, SecondaryProvider, ThreadsCrawler,
    TwitterCrawler,
};
use crate::error::{ArchiveError, Result};
use crate::extractor::SelectorProfile;
use crate::official_api::{MetaOEmbedClient, OfficialApi};
use crate::resolver::{resolve_url, ResolvedUrl};
use crate::store::{PersistenceGateway, UpsertOutcome};

/// Which concrete acquisition backends to build.
pub struct AcquisitionConfig {
    pub browser: BrowserConfig,
    pub backend: Backend,
    pub apify_api_key: Option<String>,
    pub meta_access_token: Option<String>,
    pub screenshot_dir: Option<PathBuf>,
    pub boundary_phrases: Vec<String>,
}

impl AcquisitionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let backend = match &config.chrome_url {
            Some(ws_url) => Backend::Remote {
                ws_url: ws_url.clone(),
            },
            None => Backend::Local {
                executable: config.chrome_bin.as_ref().map(PathBuf::from),
            },
        };

        Self {
            browser: BrowserConfig {
                navigation_timeout: config.navigation_timeout,
                wait_timeout: config.wait_timeout,
                ..BrowserConfig::default()
            },
            backend,
            apify_api_key: config.apify_api_key.clone(),
            meta_access_token: config.meta_access_token.clone(),
            screenshot_dir: config.screenshot_dir.as_ref().map(PathBuf::from),
            boundary_phrases: config.boundary_phrases.clone(),
        }
    }
}

/// Result of [`Orchestrator::process_and_analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedPost {
    #[serde(flatten)]
    pub acquisition: Acquisition,
    pub analysis: Option<AnalysisResult>,
}

pub struct Orchestrator {
    official_api: Arc<dyn OfficialApi>,
    /// Platforms listed here are crawler-only and never try the official API.
    crawlers: HashMap<Platform, Arc<dyn Crawler>>,
    generic: Arc<dyn Crawler>,
    gateway: PersistenceGateway,
    analyzer: Option<Arc<dyn PostAnalyzer>>,
}

impl Orchestrator {
    pub fn new(official_api: Arc<dyn OfficialApi>, generic: Arc<dyn Crawler>) -> Self {
        Self {
            official_api,
            crawlers: HashMap::new(),
            generic,
            gateway: PersistenceGateway::disabled(),
            analyzer: None,
        }
    }

    /// Production wiring: Chromium for Threads and generic pages, the guest
    /// API for X, Apify as secondary provider when a key is present.
    pub fn from_config(config: AcquisitionConfig, gateway: PersistenceGateway) -> Self {
        let launcher: Arc<dyn BrowserLauncher> = Arc::new(ChromiumLauncher::new(config.backend));
        let secondary: Option<Arc<dyn SecondaryProvider>> = config
            .apify_api_key
            .map(|key| Arc::new(ApifySecondary::new(ApifyClient::new(key))) as _);

        let mut threads = ThreadsCrawler::new(launcher.clone(), config.browser.clone())
            .with_profile(SelectorProfile::threads().with_boundary_phrases(config.boundary_phrases));
        if let Some(dir) = config.screenshot_dir {
            threads = threads.with_screenshot_dir(dir);
        }

        let threads = FallbackCrawler::new(Arc::new(threads), secondary.clone());
        let twitter = FallbackCrawler::new(Arc::new(TwitterCrawler::new()), secondary);
        let generic = GenericCrawler::new(launcher, config.browser);

        Self::new(
            Arc::new(MetaOEmbedClient::new(config.meta_access_token)),
            Arc::new(generic),
        )
        .with_crawler(Platform::Threads, Arc::new(threads))
        .with_crawler(Platform::Twitter, Arc::new(twitter))
        .with_gateway(gateway)
    }

    pub fn with_crawler(mut self, platform: Platform, crawler: Arc<dyn Crawler>) -> Self {
        self.crawlers.insert(platform, crawler);
        self
    }

    pub fn with_gateway(mut self, gateway: PersistenceGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn PostAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Acquire a post and upsert it. Persistence problems are logged, never
    /// returned.
    pub async fn process_url(&self, url: &str, user_id: Option<&str>) -> Result<Acquisition> {
        let acquisition = self.acquire(url).await?;
        self.persist(&acquisition.data, user_id, None).await;
        Ok(acquisition)
    }

    /// Acquire, run the analyzer (if any), then upsert the annotated record.
    pub async fn process_and_analyze(
        &self,
        url: &str,
        user_id: Option<&str>,
    ) -> Result<ProcessedPost> {
        let acquisition = self.acquire(url).await?;

        let analysis = match &self.analyzer {
            Some(analyzer) => Some(analyzer.analyze(&acquisition.data).await),
            None => {
                warn!("No analyzer configured, storing without analysis");
                None
            }
        };

        self.persist(&acquisition.data, user_id, analysis.as_ref()).await;
        Ok(ProcessedPost {
            acquisition,
            analysis,
        })
    }

    async fn acquire(&self, url: &str) -> Result<Acquisition> {
        let target = resolve_url(url);
        if target.platform == Platform::Unknown {
            return Err(ArchiveError::UnknownPlatform(url.to_string()));
        }
        info!(url = %target.url, platform = %target.platform, "Processing URL");

        if let Some(crawler) = self.crawlers.get(&target.platform) {
            let data = run_crawler(crawler.as_ref(), &target).await?;
            return Ok(Acquisition {
                source: AcquisitionSource::Crawler,
                data,
            });
        }

        match self.official_api.fetch(&target).await {
            Ok(Some(data)) => {
                return Ok(Acquisition {
                    source: AcquisitionSource::Api,
                    data,
                })
            }
            Ok(None) => info!(url = %target.url, "Official API has no data, using crawler"),
            Err(e) => warn!(url = %target.url, error = %e, "Official API failed, using crawler"),
        }

        let data = run_crawler(self.generic.as_ref(), &target).await?;
        Ok(Acquisition {
            source: AcquisitionSource::Crawler,
            data,
        })
    }

    async fn persist(
        &self,
        post: &NormalizedPost,
        user_id: Option<&str>,
        analysis: Option<&AnalysisResult>,
    ) {
        let record = PostRecord::from_post(post, user_id, analysis);
        match self.gateway.upsert(&record).await {
            UpsertOutcome::Stored(_) | UpsertOutcome::Skipped(_) => {}
            UpsertOutcome::Failed(e) => {
                warn!(url = %record.original_url, error = %e, "Upsert failed, returning post anyway")
            }
        }
    }
}

async fn run_crawler(crawler: &dyn Crawler, target: &ResolvedUrl) -> Result<NormalizedPost> {
    crawler
        .crawl(target)
        .await
        .map_err(|source| ArchiveError::Acquisition {
            stage: crawler.name().to_string(),
            source,
        })
}
