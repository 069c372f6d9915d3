use std::sync::Arc;

use postharvest_archive::testing::{MemoryPostWriter, MockAnalyzer, MockCrawler, MockOfficialApi};
use postharvest_archive::{ArchiveError, CrawlError, Orchestrator, PersistenceGateway};
use postharvest_common::{AcquisitionSource, Platform};

struct Harness {
    api: Arc<MockOfficialApi>,
    threads: Arc<MockCrawler>,
    generic: Arc<MockCrawler>,
    writer: Arc<MemoryPostWriter>,
}

impl Harness {
    fn new(api: MockOfficialApi) -> Self {
        Self {
            api: Arc::new(api),
            threads: Arc::new(MockCrawler::succeeding("threads crawler", "thread body")),
            generic: Arc::new(MockCrawler::succeeding("generic crawler", "page body")),
            writer: Arc::new(MemoryPostWriter::new()),
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.api.clone(), self.generic.clone())
            .with_crawler(Platform::Threads, self.threads.clone())
            .with_gateway(PersistenceGateway::new(self.writer.clone()))
    }
}

#[tokio::test]
async fn unknown_platform_fails_fast() {
    let h = Harness::new(MockOfficialApi::returning("never"));

    let err = h
        .orchestrator()
        .process_url("https://example.org/some/page", Some("u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::UnknownPlatform(ref u) if u == "https://example.org/some/page"));
    assert_eq!(h.api.call_count(), 0);
    assert!(h.generic.calls().is_empty());
    assert_eq!(h.writer.write_count(), 0);
}

#[tokio::test]
async fn threads_is_crawler_only_and_uses_canonical_domain() {
    let h = Harness::new(MockOfficialApi::returning("from api"));

    let acquisition = h
        .orchestrator()
        .process_url("https://www.threads.com/@user/post/ABC", Some("u1"))
        .await
        .unwrap();

    assert_eq!(acquisition.source, AcquisitionSource::Crawler);
    assert_eq!(acquisition.data.content, "thread body");
    assert_eq!(h.threads.calls(), ["https://www.threads.net/@user/post/ABC"]);
    assert_eq!(h.api.call_count(), 0);

    let stored = h.writer.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].original_url, "https://www.threads.net/@user/post/ABC");
    assert_eq!(stored[0].user_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn official_api_result_is_used_when_available() {
    let h = Harness::new(MockOfficialApi::returning("from api"));

    let acquisition = h
        .orchestrator()
        .process_url("https://www.instagram.com/p/abc/", Some("u1"))
        .await
        .unwrap();

    assert_eq!(acquisition.source, AcquisitionSource::Api);
    assert_eq!(acquisition.data.content, "from api");
    assert!(h.generic.calls().is_empty());
    assert_eq!(h.writer.write_count(), 1);
}

#[tokio::test]
async fn no_api_data_falls_back_to_generic_crawler() {
    let h = Harness::new(MockOfficialApi::no_data());

    let acquisition = h
        .orchestrator()
        .process_url("https://www.facebook.com/page/posts/1", None)
        .await
        .unwrap();

    assert_eq!(acquisition.source, AcquisitionSource::Crawler);
    assert_eq!(acquisition.data.content, "page body");
    assert_eq!(h.api.call_count(), 1);
    assert_eq!(h.generic.calls().len(), 1);
}

#[tokio::test]
async fn api_error_falls_back_to_generic_crawler() {
    let h = Harness::new(MockOfficialApi::failing());

    let acquisition = h
        .orchestrator()
        .process_url("https://www.instagram.com/p/abc/", Some("u1"))
        .await
        .unwrap();

    assert_eq!(acquisition.source, AcquisitionSource::Crawler);
}

#[tokio::test]
async fn crawler_failure_names_the_stage() {
    let api = Arc::new(MockOfficialApi::no_data());
    let threads = Arc::new(MockCrawler::failing("threads crawler", || {
        CrawlError::Empty("https://www.threads.net/@a/post/1".into())
    }));
    let orchestrator = Orchestrator::new(
        api,
        Arc::new(MockCrawler::succeeding("generic crawler", "x")),
    )
    .with_crawler(Platform::Threads, threads);

    let err = orchestrator
        .process_url("https://www.threads.net/@a/post/1", Some("u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Acquisition { ref stage, .. } if stage == "threads crawler"));
    assert!(err.to_string().starts_with("threads crawler failed:"));
}

#[tokio::test]
async fn upsert_failure_does_not_fail_processing() {
    let writer = Arc::new(MemoryPostWriter::failing());
    let orchestrator = Orchestrator::new(
        Arc::new(MockOfficialApi::no_data()),
        Arc::new(MockCrawler::succeeding("generic crawler", "x")),
    )
    .with_crawler(
        Platform::Twitter,
        Arc::new(MockCrawler::succeeding("twitter guest api", "tweet")),
    )
    .with_gateway(PersistenceGateway::new(writer.clone()));

    let acquisition = orchestrator
        .process_url("https://x.com/jack/status/20", Some("u1"))
        .await
        .unwrap();

    assert_eq!(acquisition.data.content, "tweet");
    assert_eq!(writer.write_count(), 1);
}

#[tokio::test]
async fn missing_user_id_skips_the_store() {
    let h = Harness::new(MockOfficialApi::no_data());

    h.orchestrator()
        .process_url("https://www.threads.net/@a/post/1", None)
        .await
        .unwrap();

    assert_eq!(h.writer.write_count(), 0);
}

#[tokio::test]
async fn analysis_is_stored_with_the_post() {
    let h = Harness::new(MockOfficialApi::no_data());
    let analyzer = Arc::new(MockAnalyzer::new("short summary"));

    let processed = h
        .orchestrator()
        .with_analyzer(analyzer.clone())
        .process_and_analyze("https://www.threads.net/@a/post/1", Some("u1"))
        .await
        .unwrap();

    assert_eq!(analyzer.call_count(), 1);
    assert_eq!(processed.analysis.unwrap().model, "mock");

    let stored = h.writer.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].full_json["analysis"]["model"], "mock");
}
