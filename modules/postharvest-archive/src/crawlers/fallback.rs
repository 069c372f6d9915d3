// Primary crawler with an optional secondary provider behind it.

use std::collections::HashMap;
use std::sync::Arc;

use apify_client::{ApifyClient, ThreadsPost, Tweet};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use postharvest_common::{Comment, MediaSet, NormalizedPost, Platform};
use tracing::{info, warn};

use super::Crawler;
use crate::error::CrawlError;
use crate::resolver::ResolvedUrl;

const TWEET_CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// A paid or third-party source consulted only after the primary path fails.
#[async_trait]
pub trait SecondaryProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError>;
}

pub struct FallbackCrawler {
    primary: Arc<dyn Crawler>,
    secondary: Option<Arc<dyn SecondaryProvider>>,
}

impl FallbackCrawler {
    pub fn new(primary: Arc<dyn Crawler>, secondary: Option<Arc<dyn SecondaryProvider>>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Crawler for FallbackCrawler {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn crawl(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
        let primary_err = match self.primary.crawl(target).await {
            Ok(post) => return Ok(post),
            Err(e) => e,
        };

        let Some(secondary) = &self.secondary else {
            return Err(CrawlError::FallbackNotConfigured(Box::new(primary_err)));
        };

        warn!(
            url = %target.url,
            primary = self.primary.name(),
            secondary = secondary.name(),
            error = %primary_err,
            "Primary acquisition failed, trying secondary provider"
        );

        match secondary.fetch(target).await {
            Ok(post) => Ok(post),
            Err(secondary_err) => Err(CrawlError::BothFailed {
                primary: Box::new(primary_err),
                secondary: Box::new(secondary_err),
            }),
        }
    }
}

/// Apify actors for single Threads posts (with nested replies) and tweets.
pub struct ApifySecondary {
    client: ApifyClient,
}

impl ApifySecondary {
    pub fn new(client: ApifyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecondaryProvider for ApifySecondary {
    fn name(&self) -> &str {
        "apify"
    }

    async fn fetch(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
        let post = match target.platform {
            Platform::Threads => {
                let items = self.client.scrape_thread(&target.url).await?;
                threads_to_post(items, &target.url)?
            }
            Platform::Twitter => {
                let tweet = self
                    .client
                    .scrape_tweet(&target.url)
                    .await?
                    .ok_or_else(|| CrawlError::NotFound(target.url.clone()))?;
                tweet_to_post(&tweet, &target.url)
            }
            other => {
                return Err(CrawlError::Secondary(format!(
                    "no secondary source for {other}"
                )))
            }
        };

        info!(
            url = %target.url,
            comments = post.comments.len(),
            "Secondary provider returned post"
        );
        Ok(post)
    }
}

fn unix_time(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn threads_comment(item: &ThreadsPost) -> Comment {
    let user = item.user.clone().unwrap_or_default();
    let handle = user.username.unwrap_or_default();
    Comment {
        author: user.full_name.filter(|n| !n.is_empty()).unwrap_or_else(|| handle.clone()),
        author_handle: handle,
        text: item.text.clone().unwrap_or_default(),
        posted_at: unix_time(item.taken_at),
        avatar_url: user.profile_pic_url,
        images: item.images.iter().cloned().collect(),
        replies: Vec::new(),
    }
}

/// The first item without a parent is the post. Items whose parent is the
/// post become comments; items whose parent is a comment (or a reply) become
/// replies of that comment. Replies to unknown parents become comments.
pub fn threads_to_post(items: Vec<ThreadsPost>, url: &str) -> Result<NormalizedPost, CrawlError> {
    let main_idx = items
        .iter()
        .position(|i| i.parent_id.is_none())
        .ok_or_else(|| CrawlError::NotFound(url.to_string()))?;
    let main = &items[main_idx];
    let main_id = main.id.clone();

    let mut post = NormalizedPost::new(Platform::Threads, url);
    let head = threads_comment(main);
    post.author = head.author;
    post.author_handle = head.author_handle;
    post.avatar_url = head.avatar_url;
    post.posted_at = head.posted_at;
    post.content = head.text;
    post.images = head.images;
    post.videos = main.videos.iter().cloned().collect::<MediaSet>();

    // Comment id -> position in post.comments, and reply id -> owning comment.
    let mut owner: HashMap<String, usize> = HashMap::new();
    let mut pending = Vec::new();

    for (i, item) in items.iter().enumerate() {
        if i == main_idx {
            continue;
        }
        let parent = item.parent_id.as_deref();
        if parent.is_none() || parent == main_id.as_deref() {
            if let Some(id) = &item.id {
                owner.insert(id.clone(), post.comments.len());
            }
            post.comments.push(threads_comment(item));
        } else {
            pending.push(item);
        }
    }

    // Items may list a reply before the reply it answers, so place what we
    // can and go around again until a pass makes no progress.
    loop {
        let before = pending.len();
        pending.retain(|item| {
            let parent = item.parent_id.as_deref().unwrap_or_default();
            let Some(idx) = owner.get(parent).copied() else {
                return true;
            };
            if let Some(id) = &item.id {
                owner.insert(id.clone(), idx);
            }
            post.comments[idx].replies.push(threads_comment(item));
            false
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }
    for item in pending {
        post.comments.push(threads_comment(item));
    }

    post.raw = serde_json::json!({ "source": "apify", "items": items.len() });
    Ok(post.finalize())
}

pub fn tweet_to_post(tweet: &Tweet, url: &str) -> NormalizedPost {
    let mut post = NormalizedPost::new(Platform::Twitter, url);
    post.content = tweet.content().unwrap_or_default().trim().to_string();

    if let Some(author) = &tweet.author {
        post.author_handle = author.user_name.clone().unwrap_or_default();
        post.author = author
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| post.author_handle.clone());
        post.avatar_url = author.profile_picture.clone();
    }

    post.posted_at = tweet
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_str(s, TWEET_CREATED_AT_FORMAT).ok())
        .map(|dt| dt.with_timezone(&Utc));

    for media in tweet.all_media() {
        match (media.media_type.as_deref(), &media.video_url) {
            (Some("video") | Some("animated_gif"), Some(video)) => {
                post.videos.insert(video.as_str());
            }
            (_, _) => {
                if let Some(image) = &media.url {
                    post.images.insert(image.as_str());
                }
            }
        }
    }

    post.raw = serde_json::json!({ "source": "apify", "tweet_id": tweet.id });
    post.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCrawler;
    use apify_client::{ThreadsUser, TweetAuthor, TweetMedia};

    fn item(id: &str, parent: Option<&str>, user: &str, text: &str) -> ThreadsPost {
        ThreadsPost {
            id: Some(id.into()),
            text: Some(text.into()),
            user: Some(ThreadsUser {
                username: Some(user.into()),
                ..Default::default()
            }),
            taken_at: Some(1_700_000_000),
            parent_id: parent.map(str::to_string),
            ..Default::default()
        }
    }

    fn target(platform: Platform, url: &str) -> ResolvedUrl {
        ResolvedUrl {
            platform,
            url: url.into(),
        }
    }

    struct FailingSecondary;

    #[async_trait]
    impl SecondaryProvider for FailingSecondary {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
            Err(CrawlError::NotFound(target.url.clone()))
        }
    }

    struct StaticSecondary;

    #[async_trait]
    impl SecondaryProvider for StaticSecondary {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, target: &ResolvedUrl) -> Result<NormalizedPost, CrawlError> {
            let mut post = NormalizedPost::new(target.platform, &target.url);
            post.content = "from secondary".into();
            Ok(post.finalize())
        }
    }

    #[test]
    fn threads_items_nest_replies_under_comments() {
        let items = vec![
            item("c1", Some("p"), "bob", "first"),
            item("p", None, "zuck", "the post"),
            item("r1", Some("c1"), "carol", "reply to bob"),
            item("c2", Some("p"), "dave", "second"),
            item("r2", Some("r1"), "erin", "deeper"),
        ];
        let post = threads_to_post(items, "https://www.threads.net/@zuck/post/1").unwrap();

        assert_eq!(post.content, "the post");
        assert_eq!(post.author_handle, "zuck");
        assert_eq!(post.comments.len(), 2);
        assert_eq!(post.comments[0].replies.len(), 2);
        assert_eq!(post.comments[0].replies[1].text, "deeper");

        let indices: Vec<String> = post.full_json.iter().map(|e| e.index.to_string()).collect();
        assert_eq!(indices, ["0", "1", "1.1", "1.2", "2"]);
    }

    #[test]
    fn reply_listed_before_its_parent_reply_still_nests() {
        let items = vec![
            item("p", None, "zuck", "the post"),
            item("c1", Some("p"), "bob", "first"),
            item("r2", Some("r1"), "erin", "deeper"),
            item("r1", Some("c1"), "carol", "reply to bob"),
            item("x", Some("gone"), "frank", "parent missing"),
        ];
        let post = threads_to_post(items, "https://www.threads.net/@zuck/post/1").unwrap();

        assert_eq!(post.comments.len(), 2);
        let replies: Vec<&str> = post.comments[0].replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(replies, ["reply to bob", "deeper"]);
        assert_eq!(post.comments[1].text, "parent missing");
    }

    #[test]
    fn threads_items_without_root_are_not_found() {
        let items = vec![item("c1", Some("p"), "bob", "orphan")];
        assert!(matches!(
            threads_to_post(items, "u"),
            Err(CrawlError::NotFound(_))
        ));
    }

    #[test]
    fn tweet_media_split_into_images_and_videos() {
        let tweet = Tweet {
            id: Some("20".into()),
            full_text: Some(" just setting up ".into()),
            created_at: Some("Tue Mar 21 20:50:14 +0000 2006".into()),
            author: Some(TweetAuthor {
                user_name: Some("jack".into()),
                name: None,
                profile_picture: None,
            }),
            media: vec![
                TweetMedia {
                    media_type: Some("photo".into()),
                    url: Some("https://pbs/1.jpg".into()),
                    video_url: None,
                },
                TweetMedia {
                    media_type: Some("video".into()),
                    url: Some("https://pbs/thumb.jpg".into()),
                    video_url: Some("https://video/1.mp4".into()),
                },
            ],
            ..Default::default()
        };
        let post = tweet_to_post(&tweet, "https://x.com/jack/status/20");

        assert_eq!(post.content, "just setting up");
        assert_eq!(post.author, "jack");
        assert_eq!(post.images.as_slice(), ["https://pbs/1.jpg"]);
        assert_eq!(post.videos.as_slice(), ["https://video/1.mp4"]);
        assert!(post.posted_at.is_some());
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let crawler = FallbackCrawler::new(
            Arc::new(MockCrawler::succeeding("twitter guest api", "primary")),
            Some(Arc::new(FailingSecondary)),
        );
        let post = crawler
            .crawl(&target(Platform::Twitter, "https://x.com/a/status/1"))
            .await
            .unwrap();
        assert_eq!(post.content, "primary");
    }

    #[tokio::test]
    async fn missing_secondary_keeps_primary_error() {
        let crawler = FallbackCrawler::new(
            Arc::new(MockCrawler::failing("twitter guest api", || {
                CrawlError::RateLimited("X guest API rate limit reached".into())
            })),
            None,
        );
        let err = crawler
            .crawl(&target(Platform::Twitter, "https://x.com/a/status/1"))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("fallback not configured"));
    }

    #[tokio::test]
    async fn secondary_rescues_primary_failure() {
        let crawler = FallbackCrawler::new(
            Arc::new(MockCrawler::failing("threads crawler", || {
                CrawlError::Empty("u".into())
            })),
            Some(Arc::new(StaticSecondary)),
        );
        let post = crawler
            .crawl(&target(Platform::Threads, "https://www.threads.net/@a/post/1"))
            .await
            .unwrap();
        assert_eq!(post.content, "from secondary");
    }

    #[tokio::test]
    async fn both_failures_are_reported() {
        let crawler = FallbackCrawler::new(
            Arc::new(MockCrawler::failing("threads crawler", || {
                CrawlError::Empty("u".into())
            })),
            Some(Arc::new(FailingSecondary)),
        );
        let err = crawler
            .crawl(&target(Platform::Threads, "https://www.threads.net/@a/post/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::BothFailed { .. }));
    }
}
