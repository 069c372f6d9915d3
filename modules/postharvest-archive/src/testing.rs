// Test mocks for the acquisition pipeline, one per trait boundary:
// - MockCrawler (Crawler)
// - MockOfficialApi (OfficialApi)
// - MemoryPostWriter (PostWriter)
// - MockAnalyzer (PostAnalyzer)
// - MockLauncher (BrowserLauncher) serving fixed HTML through FakePage

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use browser_session::{
    BrowserConfig, BrowserError, BrowserLauncher, BrowserPage, BrowserSession, NavigateOptions,
};
use postharvest_common::{
    AnalysisResult, AnalysisSummary, NormalizedPost, PostAnalyzer, PostRecord,
};
use uuid::Uuid;

use crate::crawlers::Crawler;
use crate::error::CrawlError;
use crate::official_api::OfficialApi;
use crate::resolver::ResolvedUrl;
use crate::store::{ConflictTarget, PostWriter, StoreError};

// ---------------------------------------------------------------------------
// MockCrawler
// ---------------------------------------------------------------------------

type ErrorFactory = Box<dyn Fn() -> CrawlError + Send + Sync>;

/// Returns a post with fixed content, or a fresh error on every call.
pub struct MockCrawler {
    name: String,
    content: Option<String>,
    error: Option<ErrorFactory>,
    calls: Mutex<Vec<String>>,
}

impl MockCrawler {
    pub fn succeeding(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            content: Some(content.to_string()),
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str, error: impl Fn() -> CrawlError + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_string(),
            content: None,
            error: Some(Box::new(error)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// URLs this crawler was asked for, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Crawler for MockCrawler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn crawl(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
        self.calls.lock().unwrap().push(target.url.clone());
        if let Some(error) = &self.error {
            return Err(error());
        }
        let mut post = NormalizedPost::new(target.platform, &target.url);
        post.content = self.content.clone().unwrap_or_default();
        Ok(post.finalize())
    }
}

// ---------------------------------------------------------------------------
// MockOfficialApi
// ---------------------------------------------------------------------------

enum ApiBehavior {
    NoData,
    Post(String),
    Fail,
}

pub struct MockOfficialApi {
    behavior: ApiBehavior,
    calls: AtomicUsize,
}

impl MockOfficialApi {
    /// Always reports "not available".
    pub fn no_data() -> Self {
        Self::with(ApiBehavior::NoData)
    }

    pub fn returning(content: &str) -> Self {
        Self::with(ApiBehavior::Post(content.to_string()))
    }

    pub fn failing() -> Self {
        Self::with(ApiBehavior::Fail)
    }

    fn with(behavior: ApiBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfficialApi for MockOfficialApi {
    async fn fetch(&self, target: &ResolvedUrl) -> Result<Option<NormalizedPost>, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ApiBehavior::NoData => Ok(None),
            ApiBehavior::Post(content) => {
                let mut post = NormalizedPost::new(target.platform, &target.url);
                post.content = content.clone();
                Ok(Some(post.finalize()))
            }
            ApiBehavior::Fail => Err(CrawlError::Api {
                status: 500,
                message: "mock API failure".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryPostWriter
// ---------------------------------------------------------------------------

/// In-memory writer keyed by `original_url`. Records every attempted conflict
/// target so tests can assert the gateway's key policy.
#[derive(Default)]
pub struct MemoryPostWriter {
    stored: Mutex<Vec<(Uuid, PostRecord)>>,
    targets: Mutex<Vec<ConflictTarget>>,
    original_url_conflict: bool,
    fail_all: bool,
}

impl MemoryPostWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write keyed on `original_url`, as a table without a
    /// unique index on that column would.
    pub fn with_original_url_conflict(mut self) -> Self {
        self.original_url_conflict = true;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn write_count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }

    pub fn targets(&self) -> Vec<ConflictTarget> {
        self.targets.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<PostRecord> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[async_trait]
impl PostWriter for MemoryPostWriter {
    async fn write(&self, record: &PostRecord, target: ConflictTarget) -> Result<Uuid, StoreError> {
        self.targets.lock().unwrap().push(target);

        if self.fail_all {
            return Err(StoreError::Other("store unavailable".into()));
        }
        if self.original_url_conflict && target == ConflictTarget::OriginalUrl {
            return Err(StoreError::OriginalUrlConflict(
                "there is no unique or exclusion constraint matching the ON CONFLICT specification"
                    .into(),
            ));
        }

        let mut stored = self.stored.lock().unwrap();
        let existing = stored.iter_mut().find(|(id, r)| match target {
            ConflictTarget::PrimaryKey => record.id == Some(*id),
            ConflictTarget::OriginalUrl => r.original_url == record.original_url,
        });
        match existing {
            Some((id, r)) => {
                *r = record.clone();
                Ok(*id)
            }
            None => {
                let id = record.id.unwrap_or_else(Uuid::new_v4);
                stored.push((id, record.clone()));
                Ok(id)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

pub struct MockAnalyzer {
    summary: String,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostAnalyzer for MockAnalyzer {
    async fn analyze(&self, _post: &NormalizedPost) -> AnalysisResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AnalysisResult {
            summary: AnalysisSummary::Text(self.summary.clone()),
            structured: None,
            model: "mock".into(),
            raw: serde_json::Value::Null,
            placeholder: false,
        }
    }
}

// ---------------------------------------------------------------------------
// MockLauncher / FakePage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct BrowserCounters {
    pub launched: AtomicUsize,
    pub closed: AtomicUsize,
    pub screenshots: AtomicUsize,
}

impl BrowserCounters {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn screenshots(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct PageScript {
    html: String,
    navigation_timeout: bool,
    evaluate_fails: bool,
}

/// Launches fake sessions whose single page serves fixed HTML.
pub struct MockLauncher {
    script: PageScript,
    counters: Arc<BrowserCounters>,
}

impl MockLauncher {
    pub fn serving(html: &str) -> Self {
        Self {
            script: PageScript {
                html: html.to_string(),
                ..PageScript::default()
            },
            counters: Arc::new(BrowserCounters::default()),
        }
    }

    /// Every `goto` fails with a navigation timeout.
    pub fn timing_out() -> Self {
        Self {
            script: PageScript {
                navigation_timeout: true,
                ..PageScript::default()
            },
            counters: Arc::new(BrowserCounters::default()),
        }
    }

    /// In-page evaluation throws; `content()` still returns the HTML.
    pub fn with_failing_evaluate(mut self) -> Self {
        self.script.evaluate_fails = true;
        self
    }

    pub fn counters(&self) -> Arc<BrowserCounters> {
        self.counters.clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(
        &self,
        _config: &BrowserConfig,
    ) -> browser_session::Result<Box<dyn BrowserSession>> {
        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeSession {
    script: PageScript,
    counters: Arc<BrowserCounters>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn open(&mut self) -> browser_session::Result<Box<dyn BrowserPage>> {
        Ok(Box::new(FakePage {
            script: self.script.clone(),
            counters: self.counters.clone(),
        }))
    }

    async fn close(&mut self) -> browser_session::Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakePage {
    script: PageScript,
    counters: Arc<BrowserCounters>,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, options: NavigateOptions) -> browser_session::Result<()> {
        if self.script.navigation_timeout {
            return Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: options.timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn wait_for(&self, _selector: &str, _timeout: Duration) -> bool {
        true
    }

    async fn evaluate_value(&self, _script: &str) -> browser_session::Result<serde_json::Value> {
        if self.script.evaluate_fails {
            return Err(BrowserError::Evaluate("Execution context was destroyed".into()));
        }
        Ok(serde_json::json!({ "html": self.script.html, "meta": {} }))
    }

    async fn content(&self) -> browser_session::Result<String> {
        Ok(self.script.html.clone())
    }

    async fn screenshot(&self) -> browser_session::Result<Vec<u8>> {
        self.counters.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}
