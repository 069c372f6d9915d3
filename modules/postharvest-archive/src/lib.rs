pub mod crawlers;
pub mod error;
pub mod extractor;
pub mod official_api;
pub mod orchestrator;
pub mod resolver;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use crawlers::{
    ApifySecondary, Crawler, FallbackCrawler, GenericCrawler, SecondaryProvider, ThreadsCrawler,
    TwitterCrawler,
};
pub use error::{ArchiveError, CrawlError, Result};
pub use extractor::{extract, extract_meta_only, DomSnapshot, ExtractedPost, SelectorProfile};
pub use official_api::{MetaOEmbedClient, OfficialApi};
pub use orchestrator::{AcquisitionConfig, Orchestrator, ProcessedPost};
pub use resolver::{canonicalize, resolve, resolve_url, ResolvedUrl};
pub use store::{
    ConflictTarget, PersistenceGateway, PgPostWriter, PostWriter, SkipReason, StoreError,
    UpsertOutcome,
};
