use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Empty response from {0}")]
    Empty(String),
}

impl AiError {
    /// Classify a non-2xx HTTP response.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => AiError::RateLimited(body),
            401 | 403 => AiError::Unauthorized(body),
            _ => AiError::Api {
                status,
                message: body,
            },
        }
    }

    /// Credential problems apply to every model behind the same key.
    pub fn is_credential(&self) -> bool {
        matches!(self, AiError::Unauthorized(_) | AiError::Config(_))
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for AiError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        AiError::Config(e.to_string())
    }
}
