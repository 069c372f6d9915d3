mod client;
pub(crate) mod types;

use async_trait::async_trait;

use crate::error::AiError;
use crate::provider::{ChatInput, ChatProvider, Completion, ContentPart};
use client::OpenRouterClient;
use types::*;

/// One OpenRouter model behind one API key. The analysis chain builds one of
/// these per candidate model.
#[derive(Clone)]
pub struct OpenRouter {
    api_key: String,
    model: String,
    base_url: Option<String>,
    app_name: Option<String>,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            app_name: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Same key and headers, different model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    fn client(&self) -> OpenRouterClient {
        let mut client = OpenRouterClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client = client.with_base_url(url);
        }
        if let Some(ref name) = self.app_name {
            client = client.with_app_name(name);
        }
        client
    }

    fn build_request(&self, input: &ChatInput) -> ChatRequest {
        let parts = input
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                ContentPart::Image {
                    media_type,
                    data_base64,
                } => WirePart::ImageUrl {
                    image_url: ImageUrl {
                        url: ContentPart::data_url(media_type, data_base64),
                    },
                },
            })
            .collect();

        let mut request = ChatRequest::new(&self.model);
        if !input.system.is_empty() {
            request = request.message(WireMessage::system(&input.system));
        }
        request = request.message(WireMessage::user_parts(parts));
        request.max_tokens = input.max_tokens;
        request
    }
}

#[async_trait]
impl ChatProvider for OpenRouter {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, input: &ChatInput) -> Result<Completion, AiError> {
        let request = self.build_request(input);
        let (response, raw) = self.client().chat(&request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AiError::Empty(format!("openrouter/{}", self.model)))?;

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
    fn request_uses_data_url_images() {
        let ai = OpenRouter::new("k", "qwen/qwen2.5-vl-72b-instruct:free");
        let input = ChatInput::new("sys").text("hi").image("image/png", "AAAA");
        let body = serde_json::to_value(ai.build_request(&input)).unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["content"][0]["type"], "text");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn for_model_keeps_credentials() {
        let base = OpenRouter::new("k", "a").with_app_name("postharvest");
        let other = base.for_model("b");
        assert_eq!(other.model(), "b");
        assert_eq!(other.api_key, "k");
        assert_eq!(other.app_name.as_deref(), Some("postharvest"));
    }
}
