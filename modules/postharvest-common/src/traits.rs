use async_trait::async_trait;

use crate::types::{AnalysisResult, NormalizedPost};

/// Enrichment step run between acquisition and persistence. Implementations
/// must not fail: exhaustion is reported through a placeholder result.
#[async_trait]
pub trait PostAnalyzer: Send + Sync {
    async fn analyze(&self, post: &NormalizedPost) -> AnalysisResult;
}
