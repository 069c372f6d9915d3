use std::time::Duration;

use crate::error::PostHarvestError;

/// Application configuration loaded from environment variables (and `.env`).
/// Every provider key is optional: a missing key disables that provider.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Persistence
    pub database_url: Option<String>,
    pub user_id: Option<String>,

    // Browser (local Chromium binary, or a remote CDP endpoint such as Browserless)
    pub chrome_url: Option<String>,
    pub chrome_bin: Option<String>,
    pub navigation_timeout: Duration,
    pub wait_timeout: Duration,
    pub screenshot_dir: Option<String>,

    // Acquisition providers
    pub apify_api_key: Option<String>,
    pub meta_access_token: Option<String>,

    // AI providers
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_secondary_model: Option<String>,
    pub openrouter_free_models: Vec<String>,

    // Extraction
    pub boundary_phrases: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, PostHarvestError> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: optional_env("DATABASE_URL"),
            user_id: optional_env("POSTHARVEST_USER_ID"),
            chrome_url: optional_env("CHROME_URL"),
            chrome_bin: optional_env("CHROME_BIN"),
            navigation_timeout: seconds_env("NAVIGATION_TIMEOUT_SECS", 60)?,
            wait_timeout: seconds_env("WAIT_TIMEOUT_SECS", 15)?,
            screenshot_dir: optional_env("SCREENSHOT_DIR"),
            apify_api_key: optional_env("APIFY_API_KEY"),
            meta_access_token: optional_env("META_ACCESS_TOKEN"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_model: optional_env("ANTHROPIC_MODEL"),
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            openrouter_secondary_model: optional_env("OPENROUTER_SECONDARY_MODEL"),
            openrouter_free_models: list_env("OPENROUTER_FREE_MODELS"),
            boundary_phrases: list_env("BOUNDARY_PHRASES"),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.char_indices().nth(5).map(|(i, _)| i).unwrap_or(v.len());
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  CHROME_URL: {}", preview(&self.chrome_url));
        tracing::info!("  APIFY_API_KEY: {}", preview(&self.apify_api_key));
        tracing::info!("  META_ACCESS_TOKEN: {}", preview(&self.meta_access_token));
        tracing::info!("  ANTHROPIC_API_KEY: {}", preview(&self.anthropic_api_key));
        tracing::info!("  OPENROUTER_API_KEY: {}", preview(&self.openrouter_api_key));
        tracing::info!(
            "  OPENROUTER_FREE_MODELS: {} configured",
            self.openrouter_free_models.len()
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn list_env(key: &str) -> Vec<String> {
    parse_list(&std::env::var(key).unwrap_or_default())
}

fn seconds_env(key: &str, default: u64) -> Result<Duration, PostHarvestError> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| PostHarvestError::Config(format!("{key} must be a number of seconds"))),
        None => Ok(Duration::from_secs(default)),
    }
}

pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_drops_empties() {
        assert_eq!(
            parse_list(" a/b:free , ,c/d:free,"),
            vec!["a/b:free".to_string(), "c/d:free".to_string()]
        );
        assert!(parse_list("").is_empty());
    }
}
