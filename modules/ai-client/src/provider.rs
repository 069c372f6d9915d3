use async_trait::async_trait;

use crate::error::AiError;

/// One part of a user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image {
        media_type: String,
        data_base64: String,
    },
}

impl ContentPart {
    pub fn data_url(media_type: &str, data_base64: &str) -> String {
        format!("data:{media_type};base64,{data_base64}")
    }
}

/// A single-turn chat: one system prompt, one multimodal user message.
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub system: String,
    pub parts: Vec<ContentPart>,
    pub max_tokens: Option<u32>,
}

impl ChatInput {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..Default::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Text(text.into()));
        self
    }

    pub fn image(mut self, media_type: impl Into<String>, data_base64: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Image {
            media_type: media_type.into(),
            data_base64: data_base64.into(),
        });
        self
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::Image { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name for logs ("claude", "openrouter").
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn supports_vision(&self) -> bool {
        model_supports_vision(self.model())
    }

    async fn complete(&self, input: &ChatInput) -> Result<Completion, AiError>;
}

/// Model-name heuristic for image input support.
pub fn model_supports_vision(model: &str) -> bool {
    let m = model.to_ascii_lowercase();
    m.starts_with("claude")
        || m.starts_with("anthropic/")
        || m.contains("gpt-4o")
        || m.contains("gemini")
        || m.contains("-vl")
        || m.contains("vision")
        || m.contains("llama-4")
        || m.contains("pixtral")
        || m.contains("mistral-small-3.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vision_heuristic() {
        assert!(model_supports_vision("claude-sonnet-4-20250514"));
        assert!(model_supports_vision("google/gemini-2.0-flash-exp:free"));
        assert!(model_supports_vision("qwen/qwen2.5-vl-72b-instruct:free"));
        assert!(!model_supports_vision("meta-llama/llama-3.3-70b-instruct:free"));
        assert!(!model_supports_vision("deepseek/deepseek-chat-v3-0324:free"));
    }
}
