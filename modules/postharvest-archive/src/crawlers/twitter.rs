// X/Twitter: unauthenticated guest-token GraphQL lookup of a single tweet.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postharvest_common::{MediaSet, NormalizedPost, Platform};
use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info};

use super::Crawler;
use crate::error::CrawlError;
use crate::resolver::ResolvedUrl;

const API_BASE: &str = "https://api.x.com";

/// Public bearer shipped with the x.com web client.
const WEB_BEARER: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const TWEET_RESULT_QUERY_ID: &str = "Xl5pC_lBk_gcO2ItU39DQw";

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

static STATUS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status(?:es)?/(\d+)").expect("valid regex"));

/// Card binding keys that carry a preview image, best first.
const CARD_IMAGE_KEYS: &[&str] = &[
    "photo_image_full_size_large",
    "thumbnail_image_large",
    "summary_photo_image_large",
    "player_image_large",
    "thumbnail_image",
];

pub struct TwitterCrawler {
    http: reqwest::Client,
    base_url: String,
    query_id: String,
}

impl Default for TwitterCrawler {
    fn default() -> Self {
        Self::new()
    }
}

impl TwitterCrawler {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_BASE.to_string(),
            query_id: TWEET_RESULT_QUERY_ID.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = query_id.into();
        self
    }

    async fn guest_token(&self) -> Result<String, CrawlError> {
        let url = format!("{}/1.1/guest/activate.json", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(WEB_BEARER)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlError::RateLimited(
                "X guest API rate limit reached while activating a guest token".into(),
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrawlError::GuestToken(format!("HTTP {status}: {body}")));
        }

        let body: Value = resp.json().await?;
        body["guest_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CrawlError::GuestToken("response had no guest_token".into()))
    }

    async fn tweet_result(&self, tweet_id: &str, token: &str) -> Result<Value, CrawlError> {
        let url = format!(
            "{}/graphql/{}/TweetResultByRestId",
            self.base_url, self.query_id
        );
        let variables = serde_json::json!({
            "tweetId": tweet_id,
            "withCommunity": false,
            "includePromotedContent": false,
            "withVoice": false,
        });

        let resp = self
            .http
            .get(&url)
            .bearer_auth(WEB_BEARER)
            .header("x-guest-token", token)
            .query(&[
                ("variables", variables.to_string()),
                ("features", graphql_features().to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlError::RateLimited(
                "X guest API rate limit reached; try again later".into(),
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrawlError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Crawler for TwitterCrawler {
    fn name(&self) -> &str {
        "twitter guest api"
    }

    async fn crawl(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
        let tweet_id = status_id(&target.url)
            .ok_or_else(|| CrawlError::InvalidUrl(target.url.clone()))?;

        let token = self.guest_token().await?;
        debug!(tweet_id = %tweet_id, "Guest token acquired");

        let body = self.tweet_result(&tweet_id, &token).await?;
        let post = map_tweet(&body, &target.url)?;
        info!(
            tweet_id = %tweet_id,
            images = post.images.len(),
            videos = post.videos.len(),
            "Tweet fetched"
        );
        Ok(post)
    }
}

/// Numeric status id from `/status/<id>` or `/statuses/<id>`.
pub fn status_id(url: &str) -> Option<String> {
    STATUS_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn graphql_features() -> Value {
    serde_json::json!({
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "articles_preview_enabled": true,
        "tweetypie_unmention_optimization_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "rweb_video_timestamps_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_enhance_cards_enabled": false,
    })
}

/// Map a `TweetResultByRestId` response into a post.
pub fn map_tweet(body: &Value, url: &str) -> Result<NormalizedPost, CrawlError> {
    let mut result = &body["data"]["tweetResult"]["result"];
    if result.is_null() {
        return Err(CrawlError::NotFound(url.to_string()));
    }
    if result["__typename"] == "TweetWithVisibilityResults" {
        result = &result["tweet"];
    }
    match result["__typename"].as_str() {
        Some("TweetTombstone") | Some("TweetUnavailable") => {
            return Err(CrawlError::NotFound(url.to_string()));
        }
        _ => {}
    }

    let legacy = &result["legacy"];
    if legacy.is_null() {
        return Err(CrawlError::Parse("tweet result has no legacy object".into()));
    }

    let mut post = NormalizedPost::new(Platform::Twitter, url);
    post.content = tweet_text(result);

    let user = &result["core"]["user_results"]["result"];
    post.author = first_str(&[&user["core"]["name"], &user["legacy"]["name"]]).unwrap_or_default();
    post.author_handle =
        first_str(&[&user["core"]["screen_name"], &user["legacy"]["screen_name"]])
            .unwrap_or_default();
    post.avatar_url = first_str(&[
        &user["avatar"]["image_url"],
        &user["legacy"]["profile_image_url_https"],
    ])
    .map(|u| u.replace("_normal.", "_400x400."));

    post.posted_at = legacy["created_at"]
        .as_str()
        .and_then(|s| DateTime::parse_from_str(s, CREATED_AT_FORMAT).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let (images, videos) = media(legacy);
    post.images = images;
    post.videos = videos;
    if let Some(card_image) = card_image(&result["card"]) {
        post.images.insert(card_image);
    }

    post.raw = serde_json::json!({ "tweet_id": legacy["id_str"] });
    Ok(post.finalize())
}

fn first_str(candidates: &[&Value]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Long-form note text when present, otherwise `full_text`; t.co links
/// expanded and media links removed.
fn tweet_text(result: &Value) -> String {
    let note = &result["note_tweet"]["note_tweet_results"]["result"];
    let (text, urls) = match note["text"].as_str() {
        Some(t) => (t, &note["entity_set"]["urls"]),
        None => (
            result["legacy"]["full_text"].as_str().unwrap_or_default(),
            &result["legacy"]["entities"]["urls"],
        ),
    };

    let mut text = text.to_string();
    for entry in urls.as_array().into_iter().flatten() {
        if let (Some(short), Some(expanded)) = (entry["url"].as_str(), entry["expanded_url"].as_str()) {
            text = text.replace(short, expanded);
        }
    }

    let legacy = &result["legacy"];
    let media_links = legacy["entities"]["media"]
        .as_array()
        .into_iter()
        .chain(legacy["extended_entities"]["media"].as_array())
        .flatten()
        .filter_map(|m| m["url"].as_str());
    for link in media_links {
        text = text.replace(link, "");
    }

    text.trim().to_string()
}

fn media(legacy: &Value) -> (MediaSet, MediaSet) {
    let mut images = MediaSet::new();
    let mut videos = MediaSet::new();

    let items = legacy["extended_entities"]["media"]
        .as_array()
        .or_else(|| legacy["entities"]["media"].as_array());

    for item in items.into_iter().flatten() {
        match item["type"].as_str() {
            Some("photo") => {
                if let Some(url) = item["media_url_https"].as_str() {
                    images.insert(url);
                }
            }
            Some("video") | Some("animated_gif") => {
                let best = item["video_info"]["variants"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter(|v| v["content_type"] == "video/mp4")
                    .max_by_key(|v| v["bitrate"].as_u64().unwrap_or(0))
                    .and_then(|v| v["url"].as_str());
                if let Some(url) = best {
                    videos.insert(url);
                }
            }
            _ => {}
        }
    }

    (images, videos)
}

fn card_image(card: &Value) -> Option<String> {
    let bindings = card["legacy"]["binding_values"].as_array()?;
    CARD_IMAGE_KEYS.iter().find_map(|key| {
        bindings
            .iter()
            .find(|b| b["key"] == *key)
            .and_then(|b| b["value"]["image_value"]["url"].as_str())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_id_from_both_hosts() {
        assert_eq!(status_id("https://x.com/jack/status/20").as_deref(), Some("20"));
        assert_eq!(
            status_id("https://twitter.com/jack/statuses/1234567890?s=20").as_deref(),
            Some("1234567890")
        );
        assert_eq!(status_id("https://x.com/jack"), None);
    }

    fn sample() -> Value {
        json!({
            "data": { "tweetResult": { "result": {
                "__typename": "TweetWithVisibilityResults",
                "tweet": {
                    "__typename": "Tweet",
                    "core": { "user_results": { "result": {
                        "core": { "name": "Jack", "screen_name": "jack" },
                        "avatar": { "image_url": "https://pbs.twimg.com/profile_images/1/a_normal.jpg" }
                    }}},
                    "legacy": {
                        "id_str": "20",
                        "created_at": "Tue Mar 21 20:50:14 +0000 2006",
                        "full_text": "read https://t.co/abc https://t.co/media",
                        "entities": {
                            "urls": [{ "url": "https://t.co/abc", "expanded_url": "https://example.com/article" }],
                            "media": [{ "url": "https://t.co/media" }]
                        },
                        "extended_entities": { "media": [
                            { "type": "photo", "url": "https://t.co/media", "media_url_https": "https://pbs.twimg.com/media/1.jpg" },
                            { "type": "photo", "url": "https://t.co/media", "media_url_https": "https://pbs.twimg.com/media/1.jpg" },
                            { "type": "video", "url": "https://t.co/media", "media_url_https": "https://pbs.twimg.com/thumb.jpg",
                              "video_info": { "variants": [
                                { "content_type": "application/x-mpegURL", "url": "https://video.twimg.com/pl.m3u8" },
                                { "content_type": "video/mp4", "bitrate": 256000, "url": "https://video.twimg.com/low.mp4" },
                                { "content_type": "video/mp4", "bitrate": 2176000, "url": "https://video.twimg.com/high.mp4" }
                              ]}}
                        ]}
                    },
                    "card": { "legacy": { "binding_values": [
                        { "key": "thumbnail_image_large", "value": { "image_value": { "url": "https://pbs.twimg.com/card.jpg" } } }
                    ]}}
                }
            }}}
        })
    }

    #[test]
    fn maps_nested_tweet() {
        let post = map_tweet(&sample(), "https://x.com/jack/status/20").unwrap();

        assert_eq!(post.author, "Jack");
        assert_eq!(post.author_handle, "jack");
        assert_eq!(
            post.avatar_url.as_deref(),
            Some("https://pbs.twimg.com/profile_images/1/a_400x400.jpg")
        );
        assert_eq!(post.content, "read https://example.com/article");
        assert_eq!(
            post.images.as_slice(),
            ["https://pbs.twimg.com/media/1.jpg", "https://pbs.twimg.com/card.jpg"]
        );
        assert_eq!(post.videos.as_slice(), ["https://video.twimg.com/high.mp4"]);
        assert_eq!(
            post.posted_at.map(|t| t.to_rfc3339()),
            Some("2006-03-21T20:50:14+00:00".to_string())
        );
        assert_eq!(post.full_json.len(), 1);
    }

    #[test]
    fn legacy_user_fields_and_note_tweet() {
        let body = json!({
            "data": { "tweetResult": { "result": {
                "__typename": "Tweet",
                "core": { "user_results": { "result": {
                    "legacy": {
                        "name": "Old Layout",
                        "screen_name": "old",
                        "profile_image_url_https": "https://pbs.twimg.com/p/b_normal.png"
                    }
                }}},
                "note_tweet": { "note_tweet_results": { "result": {
                    "text": "a very long note https://t.co/n",
                    "entity_set": { "urls": [{ "url": "https://t.co/n", "expanded_url": "https://n.example" }] }
                }}},
                "legacy": { "full_text": "truncated…", "created_at": "bad date" }
            }}}
        });
        let post = map_tweet(&body, "https://x.com/old/status/1").unwrap();

        assert_eq!(post.author, "Old Layout");
        assert_eq!(post.author_handle, "old");
        assert_eq!(post.avatar_url.as_deref(), Some("https://pbs.twimg.com/p/b_400x400.png"));
        assert_eq!(post.content, "a very long note https://n.example");
        assert!(post.posted_at.is_none());
    }

    #[test]
    fn tombstone_is_not_found() {
        let body = json!({ "data": { "tweetResult": { "result": { "__typename": "TweetTombstone" } } } });
        assert!(matches!(
            map_tweet(&body, "https://x.com/a/status/1"),
            Err(CrawlError::NotFound(_))
        ));
        let empty = json!({ "data": { "tweetResult": {} } });
        assert!(matches!(
            map_tweet(&empty, "https://x.com/a/status/1"),
            Err(CrawlError::NotFound(_))
        ));
    }
}
