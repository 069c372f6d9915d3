mod client;
pub(crate) mod types;

use async_trait::async_trait;

use crate::error::AiError;
use crate::provider::{ChatInput, ChatProvider, Completion, ContentPart};
use client::ClaudeClient;
use types::*;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

// =============================================================================
// Claude
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    fn build_request(&self, input: &ChatInput) -> ChatRequest {
        let blocks = input
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => ContentBlock::Text { text: text.clone() },
                ContentPart::Image {
                    media_type,
                    data_base64,
                } => ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: media_type.clone(),
                        data: data_base64.clone(),
                    },
                },
            })
            .collect();

        let mut request = ChatRequest::new(&self.model).message(WireMessage::user(blocks));
        if !input.system.is_empty() {
            request = request.system(&input.system);
        }
        if let Some(max) = input.max_tokens {
            request = request.max_tokens(max);
        }
        request
    }
}

#[async_trait]
impl ChatProvider for Claude {
    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn complete(&self, input: &ChatInput) -> Result<Completion, AiError> {
        let request = self.build_request(input);
        let raw = self.client().chat(&request).await?;

        let response: ChatResponse = serde_json::from_value(raw.clone())?;
        let text = response
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AiError::Empty(format!("claude/{}", self.model)))?;

        Ok(Completion {
            text,
            model: self.model.clone(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_new() {
        let ai = Claude::new("sk-ant-test", DEFAULT_MODEL);
        assert_eq!(ai.model(), "claude-sonnet-4-20250514");
        assert_eq!(ai.api_key, "sk-ant-test");
    }

    #[test]
    fn request_carries_image_blocks_and_system() {
        let ai = Claude::new("k", DEFAULT_MODEL);
        let input = ChatInput::new("be brief")
            .text("describe")
            .image("image/jpeg", "QUJD");
        let body = serde_json::to_value(ai.build_request(&input)).unwrap();

        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"][0]["content"][0]["type"], "text");
        assert_eq!(body["messages"][0]["content"][1]["type"], "image");
        assert_eq!(
            body["messages"][0]["content"][1]["source"]["media_type"],
            "image/jpeg"
        );
    }
}
