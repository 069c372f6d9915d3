use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use super::types::*;
use crate::error::AiError;
use crate::util::body_preview;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

pub(crate) struct OpenRouterClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    app_name: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENROUTER_API_URL.to_string(),
            app_name: None,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref name) = self.app_name {
            if let Ok(val) = HeaderValue::from_str(name) {
                headers.insert("X-Title", val);
            }
        }

        Ok(headers)
    }

    /// POST a chat completion. Returns the raw body alongside the decoded
    /// response; an `error` object inside a 200 body is classified the same
    /// way as an HTTP status.
    pub async fn chat(
        &self,
        request: &ChatRequest,
    ) -> Result<(ChatResponse, serde_json::Value), AiError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "OpenRouter chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(
                model = %request.model,
                status = status.as_u16(),
                body = %body_preview(&error_text),
                "OpenRouter API error"
            );
            return Err(AiError::from_status(status.as_u16(), error_text));
        }

        let raw: serde_json::Value = response.json().await?;
        let decoded: ChatResponse = serde_json::from_value(raw.clone())?;

        if let Some(ref embedded) = decoded.error {
            let code = embedded.status().unwrap_or(500);
            warn!(model = %request.model, code, message = %embedded.message, "OpenRouter embedded error");
            return Err(AiError::from_status(code, embedded.message.clone()));
        }

        Ok((decoded, raw))
    }
}
