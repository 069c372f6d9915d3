// Official platform APIs. Only Meta oEmbed is wired up; everything else
// reports "no data" so the orchestrator falls through to a crawler.

use async_trait::async_trait;
use postharvest_common::{NormalizedPost, Platform};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::CrawlError;
use crate::resolver::ResolvedUrl;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// `Ok(None)` means the API has nothing for this URL (or is not configured);
/// the caller moves on to a crawler either way.
#[async_trait]
pub trait OfficialApi: Send + Sync {
    async fn fetch(&self, target: &ResolvedUrl) -> Result<Option<NormalizedPost>, CrawlError>;
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    provider_name: Option<String>,
}

pub struct MetaOEmbedClient {
    http: reqwest::Client,
    access_token: Option<String>,
    base_url: String,
}

impl MetaOEmbedClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            base_url: GRAPH_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(platform: Platform) -> Option<&'static str> {
        match platform {
            Platform::Instagram => Some("instagram_oembed"),
            Platform::Facebook => Some("oembed_post"),
            _ => None,
        }
    }
}

#[async_trait]
impl OfficialApi for MetaOEmbedClient {
    async fn fetch(&self, target: &ResolvedUrl) -> Result<Option<NormalizedPost>, CrawlError> {
        let Some(token) = &self.access_token else {
            debug!("META_ACCESS_TOKEN not set, skipping official API");
            return Ok(None);
        };
        let Some(endpoint) = Self::endpoint(target.platform) else {
            return Ok(None);
        };

        let resp = self
            .http
            .get(format!("{}/{endpoint}", self.base_url))
            .query(&[
                ("url", target.url.as_str()),
                ("access_token", token.as_str()),
                ("omitscript", "true"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrawlError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let embed: OEmbedResponse = resp.json().await?;
        let mut post = NormalizedPost::new(target.platform, &target.url);
        post.author = embed.author_name.unwrap_or_default();
        post.author_handle = post.author.clone();
        post.content = embed.title.unwrap_or_default().trim().to_string();
        if let Some(thumb) = embed.thumbnail_url {
            post.images.insert(thumb);
        }
        post.raw = serde_json::json!({ "source": "oembed", "provider": embed.provider_name });

        if post.is_empty() {
            return Ok(None);
        }

        info!(url = %target.url, platform = %target.platform, "Post fetched from official API");
        Ok(Some(post.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn target(platform: Platform, url: &str) -> ResolvedUrl {
        ResolvedUrl {
            platform,
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn no_token_means_no_data() {
        let client = MetaOEmbedClient::new(None);
        let result = client
            .fetch(&target(Platform::Instagram, "https://www.instagram.com/p/abc/"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn maps_instagram_oembed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/instagram_oembed")
                    .query_param("access_token", "tok")
                    .query_param("url", "https://www.instagram.com/p/abc/");
                then.status(200).json_body(serde_json::json!({
                    "author_name": "natgeo",
                    "title": "A caption",
                    "thumbnail_url": "https://cdn.instagram.com/t.jpg",
                    "provider_name": "Instagram"
                }));
            })
            .await;

        let client = MetaOEmbedClient::new(Some("tok".into())).with_base_url(server.base_url());
        let post = client
            .fetch(&target(Platform::Instagram, "https://www.instagram.com/p/abc/"))
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(post.author, "natgeo");
        assert_eq!(post.content, "A caption");
        assert_eq!(post.images.as_slice(), ["https://cdn.instagram.com/t.jpg"]);
    }

    #[tokio::test]
    async fn not_found_is_no_data() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/oembed_post");
                then.status(404);
            })
            .await;

        let client = MetaOEmbedClient::new(Some("tok".into())).with_base_url(server.base_url());
        let result = client
            .fetch(&target(Platform::Facebook, "https://www.facebook.com/x/posts/1"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn other_platforms_are_skipped() {
        let client = MetaOEmbedClient::new(Some("tok".into()));
        let result = client
            .fetch(&target(Platform::Unknown, "https://example.org"))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
