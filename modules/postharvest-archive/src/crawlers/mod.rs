pub mod fallback;
pub mod generic;
pub mod threads;
pub mod twitter;

use async_trait::async_trait;
use postharvest_common::NormalizedPost;

use crate::error::CrawlError;
use crate::resolver::ResolvedUrl;

pub use fallback::{ApifySecondary, FallbackCrawler, SecondaryProvider};
pub use generic::GenericCrawler;
pub use threads::ThreadsCrawler;
pub use twitter::TwitterCrawler;

/// One acquisition strategy for one or more platforms.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Stage name used in errors and logs, e.g. "threads crawler".
    fn name(&self) -> &str;

    async fn crawl(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError>;
}
