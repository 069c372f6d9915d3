use browser_session::BrowserError;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Unknown platform for URL: {0}")]
    UnknownPlatform(String),

    #[error("{stage} failed: {source}")]
    Acquisition {
        stage: String,
        #[source]
        source: CrawlError,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Failures of a single acquisition path (browser, guest API, secondary provider).
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("{0}")]
    RateLimited(String),

    #[error("Guest token unavailable: {0}")]
    GuestToken(String),

    #[error("Upstream API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Nothing could be extracted from {0}")]
    Empty(String),

    #[error("Unsupported URL for this crawler: {0}")]
    InvalidUrl(String),

    #[error("Secondary provider failed: {0}")]
    Secondary(String),

    #[error("{0} (fallback not configured)")]
    FallbackNotConfigured(Box<CrawlError>),

    #[error("primary failed: {primary}; fallback failed: {secondary}")]
    BothFailed {
        primary: Box<CrawlError>,
        secondary: Box<CrawlError>,
    },
}

impl CrawlError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            CrawlError::RateLimited(_) => true,
            CrawlError::FallbackNotConfigured(inner) => inner.is_rate_limited(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for CrawlError {
    fn from(err: serde_json::Error) -> Self {
        CrawlError::Parse(err.to_string())
    }
}

impl From<apify_client::ApifyError> for CrawlError {
    fn from(err: apify_client::ApifyError) -> Self {
        CrawlError::Secondary(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_context_is_appended() {
        let err = CrawlError::FallbackNotConfigured(Box::new(CrawlError::RateLimited(
            "X guest API rate limit reached".into(),
        )));
        assert_eq!(
            err.to_string(),
            "X guest API rate limit reached (fallback not configured)"
        );
        assert!(err.is_rate_limited());
    }

    #[test]
    fn acquisition_error_names_stage() {
        let err = ArchiveError::Acquisition {
            stage: "threads crawler".into(),
            source: CrawlError::Empty("https://www.threads.net/@a/post/1".into()),
        };
        assert!(err.to_string().starts_with("threads crawler failed:"));
    }
}
