pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    RunData, StartUrl, ThreadsPost, ThreadsScraperInput, ThreadsUser, Tweet, TweetAuthor,
    TweetMedia, TweetScraperInput,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for curious_coder/threads-scraper.
const THREADS_SCRAPER: &str = "curious_coder~threads-scraper";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Replies fetched alongside a single Threads post.
const THREADS_MAX_ITEMS: u32 = 50;

/// Status checks per run. Each one long-polls for up to 60s.
const DEFAULT_MAX_POLLS: u32 = 5;

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    max_polls: u32,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls.max(1);
        self
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize>(&self, actor: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes, at most `max_polls` times. Uses
    /// `waitForFinish=60` for long-polling.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let mut last_status = String::new();
        for _ in 0..self.max_polls {
            let url = format!(
                "{}/actor-runs/{}?waitForFinish=60",
                self.base_url, run_id
            );
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                    last_status = api_resp.data.status;
                }
            }
        }

        tracing::warn!(run_id, polls = self.max_polls, "Giving up on Apify run");
        Err(ApifyError::PollLimit {
            run_id: run_id.to_string(),
            status: last_status,
            polls: self.max_polls,
        })
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!(
            "{}/datasets/{}/items?format=json",
            self.base_url, dataset_id
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Start, poll, and collect results for one actor.
    async fn run_actor<I: Serialize, T: DeserializeOwned>(
        &self,
        actor: &str,
        input: &I,
    ) -> Result<Vec<T>> {
        let run = self.start_run(actor, input).await?;
        tracing::info!(run_id = %run.id, actor, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items(&completed.default_dataset_id).await
    }

    /// Scrape a single Threads post and its visible replies.
    pub async fn scrape_thread(&self, post_url: &str) -> Result<Vec<ThreadsPost>> {
        tracing::info!(post_url, "Starting Threads post scrape");

        let input = ThreadsScraperInput {
            start_urls: vec![StartUrl {
                url: post_url.to_string(),
            }],
            max_items: THREADS_MAX_ITEMS,
        };
        let items: Vec<ThreadsPost> = self.run_actor(THREADS_SCRAPER, &input).await?;
        tracing::info!(count = items.len(), "Fetched Threads items");

        Ok(items)
    }

    /// Scrape a single tweet by its status URL.
    pub async fn scrape_tweet(&self, status_url: &str) -> Result<Option<Tweet>> {
        tracing::info!(status_url, "Starting X/Twitter single-post scrape");

        let input = TweetScraperInput {
            start_urls: vec![status_url.to_string()],
            max_items: 1,
        };
        let tweets: Vec<Tweet> = self.run_actor(TWEET_SCRAPER, &input).await?;
        tracing::info!(count = tweets.len(), "Fetched tweets");

        Ok(tweets.into_iter().next())
    }
}
