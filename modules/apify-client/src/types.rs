use serde::{Deserialize, Serialize};

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the threads post scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadsScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

/// Input for the apidojo/tweet-scraper actor, single-URL mode.
#[derive(Debug, Clone, Serialize)]
pub struct TweetScraperInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

// --- Threads ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadsUser {
    pub username: Option<String>,
    #[serde(rename = "full_name")]
    pub full_name: Option<String>,
    #[serde(rename = "profile_pic_url")]
    pub profile_pic_url: Option<String>,
}

/// A single thread item from the dataset. The main post comes first; replies
/// follow with `parent_id` pointing at the post they answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadsPost {
    pub id: Option<String>,
    pub code: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "caption")]
    pub text: Option<String>,
    pub user: Option<ThreadsUser>,
    /// Unix seconds.
    #[serde(rename = "taken_at")]
    pub taken_at: Option<i64>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(rename = "parent_id")]
    pub parent_id: Option<String>,
}

// --- X/Twitter ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetAuthor {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "profilePicture")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetMedia {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    #[serde(rename = "media_url_https", alias = "url")]
    pub url: Option<String>,
    #[serde(rename = "videoUrl", alias = "video_url")]
    pub video_url: Option<String>,
}

/// A single tweet from the dataset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tweet {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "fullText", alias = "full_text")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: Option<String>,
    pub author: Option<TweetAuthor>,
    #[serde(default, rename = "extendedEntities")]
    pub extended_entities: Option<TweetEntities>,
    #[serde(default)]
    pub media: Vec<TweetMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetEntities {
    #[serde(default)]
    pub media: Vec<TweetMedia>,
}

impl Tweet {
    /// Returns whichever text field is populated, preferring `fullText`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }

    /// Media from either the flat `media` list or `extendedEntities`.
    pub fn all_media(&self) -> impl Iterator<Item = &TweetMedia> {
        self.media.iter().chain(
            self.extended_entities
                .iter()
                .flat_map(|entities| entities.media.iter()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tweet_accepts_both_field_spellings() {
        let camel: Tweet = serde_json::from_value(serde_json::json!({
            "fullText": "long text",
            "createdAt": "Wed Oct 10 20:19:24 +0000 2018",
            "author": { "userName": "jack", "name": "Jack", "profilePicture": "https://pbs/p.jpg" },
            "media": [{ "type": "photo", "media_url_https": "https://pbs/1.jpg" }]
        }))
        .unwrap();
        assert_eq!(camel.content(), Some("long text"));
        assert_eq!(camel.all_media().count(), 1);

        let snake: Tweet = serde_json::from_value(serde_json::json!({
            "text": "short",
            "full_text": null,
            "created_at": "Wed Oct 10 20:19:24 +0000 2018"
        }))
        .unwrap();
        assert_eq!(snake.content(), Some("short"));
        assert!(snake.created_at.is_some());
    }

    #[test]
    fn threads_post_defaults_missing_media() {
        let post: ThreadsPost = serde_json::from_value(serde_json::json!({
            "id": "1",
            "caption": "hello",
            "user": { "username": "zuck" },
            "taken_at": 1700000000
        }))
        .unwrap();
        assert_eq!(post.text.as_deref(), Some("hello"));
        assert!(post.images.is_empty());
        assert!(post.parent_id.is_none());
    }
}
