// AiAnalysisChain: ordered provider fallback that never fails.
//
// Order: primary direct provider, secondary named model on the broker, then
// the broker's free-tier models starting at the process-wide rotation cursor.
// Each candidate is tried once per call; total exhaustion yields a placeholder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ai_client::{AiError, ChatInput, ChatProvider, Claude, Completion, OpenRouter};
use async_trait::async_trait;
use postharvest_common::{
    AnalysisResult, AnalysisSummary, AppConfig, NormalizedPost, PostAnalyzer, RemixResult,
    StructuredSummary,
};
use tracing::{debug, info, warn};

use crate::images::{collect_images, EncodedImage, HttpImageFetcher, ImageFetcher};
use crate::parse::parse_ai_response;
use crate::prompt::{remix_request, transcript, ANALYSIS_SYSTEM_PROMPT, REMIX_SYSTEM_PROMPT};

pub const ANALYSIS_IMAGE_LIMIT: usize = 3;
pub const REMIX_IMAGE_LIMIT: usize = 4;

pub const PLACEHOLDER_MODEL: &str = "placeholder";

const ANALYSIS_MAX_TOKENS: u32 = 1500;
const REMIX_MAX_TOKENS: u32 = 2000;

/// Used when `OPENROUTER_FREE_MODELS` is not set.
pub const DEFAULT_FREE_MODELS: &[&str] = &[
    "meta-llama/llama-3.3-70b-instruct:free",
    "google/gemini-2.0-flash-exp:free",
    "qwen/qwen2.5-vl-72b-instruct:free",
    "mistralai/mistral-small-3.1-24b-instruct:free",
    "deepseek/deepseek-chat-v3-0324:free",
];

/// Index of the free model the next call starts from. Shared by every chain
/// in the process. Relaxed loads and stores: a race can skip or repeat one
/// candidate, nothing worse.
static FREE_MODEL_CURSOR: AtomicUsize = AtomicUsize::new(0);

/// Where in the chain a candidate sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Primary,
    Secondary,
    Free(usize),
}

/// What a failed attempt means for the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    /// Try the next candidate.
    Continue,
    /// Credentials are shared per provider; skip its remaining candidates.
    SkipProvider,
}

fn next_after(err: &AiError) -> Next {
    if err.is_credential() {
        Next::SkipProvider
    } else {
        Next::Continue
    }
}

pub struct AnalysisChain {
    primary: Option<Arc<dyn ChatProvider>>,
    secondary: Option<Arc<dyn ChatProvider>>,
    free: Vec<Arc<dyn ChatProvider>>,
    cursor: &'static AtomicUsize,
    images: Option<Arc<dyn ImageFetcher>>,
}

impl Default for AnalysisChain {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisChain {
    /// An empty chain. Every call returns the placeholder until providers are added.
    pub fn new() -> Self {
        Self {
            primary: None,
            secondary: None,
            free: Vec::new(),
            cursor: &FREE_MODEL_CURSOR,
            images: None,
        }
    }

    /// Claude as primary when `ANTHROPIC_API_KEY` is set; OpenRouter for the
    /// secondary and free models when `OPENROUTER_API_KEY` is set.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut chain = Self::new().with_image_fetcher(Arc::new(HttpImageFetcher::new()));

        if let Some(key) = &config.anthropic_api_key {
            let model = config
                .anthropic_model
                .clone()
                .unwrap_or_else(|| ai_client::claude::DEFAULT_MODEL.to_string());
            chain = chain.with_primary(Arc::new(Claude::new(key.clone(), model)));
        }

        if let Some(key) = &config.openrouter_api_key {
            let models: Vec<String> = if config.openrouter_free_models.is_empty() {
                DEFAULT_FREE_MODELS.iter().map(|m| m.to_string()).collect()
            } else {
                config.openrouter_free_models.clone()
            };
            let broker = OpenRouter::new(key.clone(), models.first().cloned().unwrap_or_default())
                .with_app_name("postharvest");

            if let Some(model) = &config.openrouter_secondary_model {
                chain = chain.with_secondary(Arc::new(broker.for_model(model.clone())));
            }

            let free = models
                .into_iter()
                .map(|m| Arc::new(broker.for_model(m)) as Arc<dyn ChatProvider>)
                .collect();
            chain = chain.with_free_models(free);
        }

        info!(
            primary = chain.primary.is_some(),
            secondary = chain.secondary.is_some(),
            free_models = chain.free.len(),
            "Analysis chain configured"
        );
        chain
    }

    pub fn with_primary(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn with_free_models(mut self, providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        self.free = providers;
        self
    }

    /// Use a private rotation cursor instead of the process-wide one.
    pub fn with_cursor(mut self, cursor: &'static AtomicUsize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(fetcher);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some() || !self.free.is_empty()
    }

    /// Free-model index the next call will start from.
    pub fn cursor_position(&self) -> usize {
        match self.free.len() {
            0 => 0,
            n => self.cursor.load(Ordering::Relaxed) % n,
        }
    }

    /// Candidates in attempt order for this call.
    fn candidates(&self) -> Vec<(Stage, Arc<dyn ChatProvider>)> {
        let mut out = Vec::with_capacity(self.free.len() + 2);
        if let Some(p) = &self.primary {
            out.push((Stage::Primary, p.clone()));
        }
        if let Some(p) = &self.secondary {
            out.push((Stage::Secondary, p.clone()));
        }
        let n = self.free.len();
        let start = self.cursor_position();
        for k in 0..n {
            let idx = (start + k) % n;
            out.push((Stage::Free(idx), self.free[idx].clone()));
        }
        out
    }

    fn any_vision(&self) -> bool {
        self.candidates().iter().any(|(_, p)| p.supports_vision())
    }

    async fn source_images(&self, post: &NormalizedPost, limit: usize) -> Vec<EncodedImage> {
        match &self.images {
            Some(fetcher) if !post.images.is_empty() && self.any_vision() => {
                collect_images(fetcher.as_ref(), post.images.as_slice(), limit).await
            }
            _ => Vec::new(),
        }
    }

    /// Walk the candidates once. `None` means every candidate failed.
    async fn run(&self, input: &ChatInput, images: &[EncodedImage]) -> Option<Completion> {
        let with_images = images.iter().fold(input.clone(), |acc, img| {
            acc.image(img.media_type.clone(), img.data_base64.clone())
        });
        let free_count = self.free.len();
        let mut skipped: Vec<String> = Vec::new();

        for (stage, provider) in self.candidates() {
            if skipped.iter().any(|name| name == provider.name()) {
                debug!(provider = provider.name(), model = provider.model(), "Skipping provider after credential error");
                continue;
            }

            let request = if provider.supports_vision() && !images.is_empty() {
                &with_images
            } else {
                input
            };

            let outcome = match provider.complete(request).await {
                Ok(c) if c.text.trim().is_empty() => Err(AiError::Empty(c.model)),
                other => other,
            };

            match outcome {
                Ok(completion) => {
                    info!(
                        stage = ?stage,
                        provider = provider.name(),
                        model = %completion.model,
                        images = request.image_count(),
                        "AI provider succeeded"
                    );
                    return Some(completion);
                }
                Err(e) => {
                    warn!(
                        stage = ?stage,
                        provider = provider.name(),
                        model = provider.model(),
                        error = %e,
                        "AI provider failed, trying next"
                    );
                    if let Stage::Free(idx) = stage {
                        self.cursor.store((idx + 1) % free_count, Ordering::Relaxed);
                    }
                    if next_after(&e) == Next::SkipProvider {
                        skipped.push(provider.name().to_string());
                    }
                }
            }
        }

        None
    }

    pub async fn analyze(&self, post: &NormalizedPost) -> AnalysisResult {
        if !self.is_configured() {
            warn!("No AI providers configured, returning placeholder analysis");
            return placeholder_analysis();
        }

        let mut input = ChatInput::new(ANALYSIS_SYSTEM_PROMPT).text(transcript(post));
        input.max_tokens = Some(ANALYSIS_MAX_TOKENS);
        let images = self.source_images(post, ANALYSIS_IMAGE_LIMIT).await;

        match self.run(&input, &images).await {
            Some(completion) => {
                let parsed = parse_ai_response(&completion.text);
                AnalysisResult {
                    summary: parsed.summary,
                    structured: parsed.structured,
                    model: completion.model,
                    raw: completion.raw,
                    placeholder: false,
                }
            }
            None => {
                warn!(url = %post.original_url, "All AI providers failed, returning placeholder analysis");
                placeholder_analysis()
            }
        }
    }

    /// Rewrite the post per `instructions`. Exhaustion returns the original
    /// text marked as a placeholder.
    pub async fn remix(&self, post: &NormalizedPost, instructions: &str) -> RemixResult {
        let mut input = ChatInput::new(REMIX_SYSTEM_PROMPT).text(remix_request(post, instructions));
        input.max_tokens = Some(REMIX_MAX_TOKENS);
        let images = self.source_images(post, REMIX_IMAGE_LIMIT).await;

        match self.run(&input, &images).await {
            Some(completion) => RemixResult {
                content: completion.text.trim().to_string(),
                model: completion.model,
                raw: completion.raw,
                placeholder: false,
            },
            None => {
                warn!(url = %post.original_url, "All AI providers failed, returning original text");
                RemixResult {
                    content: post.content.clone(),
                    model: PLACEHOLDER_MODEL.to_string(),
                    raw: serde_json::Value::Null,
                    placeholder: true,
                }
            }
        }
    }
}

pub fn placeholder_analysis() -> AnalysisResult {
    AnalysisResult {
        summary: AnalysisSummary::Structured(StructuredSummary {
            core_insight: "AI analysis is temporarily unavailable.".to_string(),
            key_points: Vec::new(),
            actionable_knowledge: String::new(),
            tags: Vec::new(),
        }),
        structured: None,
        model: PLACEHOLDER_MODEL.to_string(),
        raw: serde_json::Value::Null,
        placeholder: true,
    }
}

#[async_trait]
impl PostAnalyzer for AnalysisChain {
    async fn analyze(&self, post: &NormalizedPost) -> AnalysisResult {
        AnalysisChain::analyze(self, post).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_skip_the_provider() {
        assert_eq!(next_after(&AiError::Unauthorized("bad key".into())), Next::SkipProvider);
        assert_eq!(next_after(&AiError::RateLimited("slow down".into())), Next::Continue);
        assert_eq!(
            next_after(&AiError::Api {
                status: 500,
                message: "boom".into()
            }),
            Next::Continue
        );
    }

    #[test]
    fn placeholder_has_a_summary() {
        let result = placeholder_analysis();
        assert!(result.placeholder);
        assert_eq!(result.model, PLACEHOLDER_MODEL);
        assert!(matches!(
            result.summary,
            AnalysisSummary::Structured(ref s) if !s.core_insight.is_empty()
        ));
    }

    #[test]
    fn default_config_builds_free_list() {
        let config = AppConfig {
            database_url: None,
            user_id: None,
            chrome_url: None,
            chrome_bin: None,
            navigation_timeout: std::time::Duration::from_secs(60),
            wait_timeout: std::time::Duration::from_secs(15),
            screenshot_dir: None,
            apify_api_key: None,
            meta_access_token: None,
            anthropic_api_key: None,
            anthropic_model: None,
            openrouter_api_key: Some("or-key".into()),
            openrouter_secondary_model: None,
            openrouter_free_models: Vec::new(),
            boundary_phrases: Vec::new(),
        };
        let chain = AnalysisChain::from_config(&config);

        assert!(chain.primary.is_none());
        assert!(chain.secondary.is_none());
        assert_eq!(chain.free.len(), DEFAULT_FREE_MODELS.len());
        assert!(chain.any_vision());
    }
}
