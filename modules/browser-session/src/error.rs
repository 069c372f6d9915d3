use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Page evaluation failed: {0}")]
    Evaluate(String),

    #[error("Page error: {0}")]
    Page(String),
}

impl BrowserError {
    /// Launch failures and navigation timeouts end the current attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BrowserError::Launch(_) | BrowserError::NavigationTimeout { .. }
        )
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Page(err.to_string())
    }
}
