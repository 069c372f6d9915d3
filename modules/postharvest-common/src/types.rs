use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::PostHarvestError;
use crate::util::{content_hash, truncate_chars};

// --- Platform ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Threads,
    Twitter,
    Instagram,
    Facebook,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Threads => "threads",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- MediaSet ---

/// Ordered set of media URLs. Insertion order is kept, repeats and empty
/// strings are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct MediaSet(Vec<String>);

impl MediaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the URL was not already present.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.is_empty() || self.0.iter().any(|u| u == trimmed) {
            return false;
        }
        self.0.push(trimmed.to_string());
        true
    }

    pub fn union(&mut self, other: &MediaSet) {
        for url in &other.0 {
            self.insert(url.as_str());
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|u| u == url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for MediaSet {
    fn from(urls: Vec<String>) -> Self {
        urls.into_iter().collect()
    }
}

impl From<MediaSet> for Vec<String> {
    fn from(set: MediaSet) -> Self {
        set.0
    }
}

impl FromIterator<String> for MediaSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = MediaSet::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

impl<'a> IntoIterator for &'a MediaSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// --- Comment ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub author_handle: String,
    pub text: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub images: MediaSet,
    /// Only populated when a source exposes reply structure; the DOM pass
    /// always leaves this empty.
    #[serde(default)]
    pub replies: Vec<Comment>,
}

// --- Full JSON entries ---

/// Position of an entry in the AI-facing transcript: `0` is the main post,
/// `n` the n-th top-level comment, `n.r` the r-th reply to comment `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryIndex {
    pub comment: u32,
    pub reply: Option<u32>,
}

impl EntryIndex {
    pub const MAIN: EntryIndex = EntryIndex {
        comment: 0,
        reply: None,
    };

    pub fn comment(n: u32) -> Self {
        Self {
            comment: n,
            reply: None,
        }
    }

    pub fn reply(comment: u32, reply: u32) -> Self {
        Self {
            comment,
            reply: Some(reply),
        }
    }
}

impl fmt::Display for EntryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reply {
            Some(r) => write!(f, "{}.{}", self.comment, r),
            None => write!(f, "{}", self.comment),
        }
    }
}

impl FromStr for EntryIndex {
    type Err = PostHarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PostHarvestError::Validation(format!("invalid entry index: {s:?}"));
        let (head, tail) = match s.trim().split_once('.') {
            Some((h, t)) => (h, Some(t)),
            None => (s.trim(), None),
        };
        let comment = head.parse::<u32>().map_err(|_| invalid())?;
        let reply = match tail {
            Some(t) => Some(t.parse::<u32>().map_err(|_| invalid())?),
            None => None,
        };
        if comment == 0 && reply.is_some() {
            return Err(invalid());
        }
        Ok(Self { comment, reply })
    }
}

impl Serialize for EntryIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(EntryIndex::comment(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullJsonEntry {
    pub index: EntryIndex,
    pub text: String,
    pub author: String,
    pub author_handle: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub images: Vec<String>,
}

// --- NormalizedPost ---

/// Platform-agnostic acquisition result. Built once per `process_url` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPost {
    pub platform: Platform,
    pub original_url: String,
    pub scraped_at: DateTime<Utc>,
    pub author: String,
    pub author_handle: String,
    pub avatar_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub content: String,
    pub images: MediaSet,
    pub videos: MediaSet,
    pub comments: Vec<Comment>,
    pub full_json: Vec<FullJsonEntry>,
    /// Meta tags and raw snapshots for diagnostics. Nothing downstream reads it.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl NormalizedPost {
    pub fn new(platform: Platform, original_url: impl Into<String>) -> Self {
        Self {
            platform,
            original_url: original_url.into(),
            scraped_at: Utc::now(),
            author: String::new(),
            author_handle: String::new(),
            avatar_url: None,
            posted_at: None,
            content: String::new(),
            images: MediaSet::new(),
            videos: MediaSet::new(),
            comments: Vec::new(),
            full_json: Vec::new(),
            raw: serde_json::Value::Null,
        }
    }

    /// True when acquisition produced nothing a reader could use.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
            && self.images.is_empty()
            && self.videos.is_empty()
            && self.author.is_empty()
    }

    /// Rebuild `full_json` from the post and its comments. Called once at the
    /// end of acquisition.
    pub fn finalize(mut self) -> Self {
        self.full_json = build_full_json(&self);
        self
    }
}

fn build_full_json(post: &NormalizedPost) -> Vec<FullJsonEntry> {
    let mut entries = Vec::with_capacity(post.comments.len() + 1);
    entries.push(FullJsonEntry {
        index: EntryIndex::MAIN,
        text: post.content.clone(),
        author: post.author.clone(),
        author_handle: post.author_handle.clone(),
        posted_at: post.posted_at,
        images: post.images.as_slice().to_vec(),
    });

    for (i, comment) in post.comments.iter().enumerate() {
        let n = i as u32 + 1;
        entries.push(entry_for(EntryIndex::comment(n), comment));
        for (r, reply) in comment.replies.iter().enumerate() {
            entries.push(entry_for(EntryIndex::reply(n, r as u32 + 1), reply));
        }
    }

    entries
}

fn entry_for(index: EntryIndex, comment: &Comment) -> FullJsonEntry {
    FullJsonEntry {
        index,
        text: comment.text.clone(),
        author: comment.author.clone(),
        author_handle: comment.author_handle.clone(),
        posted_at: comment.posted_at,
        images: comment.images.as_slice().to_vec(),
    }
}

// --- Acquisition ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionSource {
    Api,
    Crawler,
}

impl fmt::Display for AcquisitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionSource::Api => f.write_str("api"),
            AcquisitionSource::Crawler => f.write_str("crawler"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    pub source: AcquisitionSource,
    pub data: NormalizedPost,
}

// --- Analysis ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredSummary {
    #[serde(default)]
    pub core_insight: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub actionable_knowledge: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StructuredSummary {
    /// Lenient read of a model's JSON object. Values of an unexpected type
    /// are kept as their JSON text rather than failing the whole summary.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let list = |key: &str| match &value[key] {
            serde_json::Value::Array(items) => items
                .iter()
                .map(json_text)
                .filter(|s| !s.is_empty())
                .collect(),
            other => Some(json_text(other))
                .filter(|s| !s.is_empty())
                .into_iter()
                .collect(),
        };
        Self {
            core_insight: json_text(&value["core_insight"]),
            key_points: list("key_points"),
            actionable_knowledge: json_text(&value["actionable_knowledge"]),
            tags: list("tags"),
        }
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisSummary {
    Structured(StructuredSummary),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    /// The parsed JSON payload, when the model returned one.
    pub structured: Option<serde_json::Value>,
    pub model: String,
    pub raw: serde_json::Value,
    #[serde(default)]
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemixResult {
    pub content: String,
    pub model: String,
    pub raw: serde_json::Value,
    #[serde(default)]
    pub placeholder: bool,
}

// --- Persistence record ---

/// Flattened row handed to the persistence upsert contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Option<Uuid>,
    pub user_id: Option<String>,
    pub platform: Platform,
    pub original_url: String,
    pub title: Option<String>,
    pub content: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub full_json: serde_json::Value,
    pub content_hash: String,
}

const TITLE_MAX_CHARS: usize = 80;

impl PostRecord {
    pub fn from_post(
        post: &NormalizedPost,
        user_id: Option<&str>,
        analysis: Option<&AnalysisResult>,
    ) -> Self {
        let title = post
            .content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| truncate_chars(l, TITLE_MAX_CHARS).to_string())
            .or_else(|| (!post.author.is_empty()).then(|| post.author.clone()));

        let full_json = serde_json::json!({
            "entries": post.full_json,
            "author": {
                "name": post.author,
                "handle": post.author_handle,
                "avatar_url": post.avatar_url,
            },
            "images": post.images,
            "videos": post.videos,
            "scraped_at": post.scraped_at,
            "analysis": analysis,
        });

        Self {
            id: None,
            user_id: user_id.map(str::to_string).filter(|u| !u.trim().is_empty()),
            platform: post.platform,
            original_url: post.original_url.clone(),
            title,
            content: post.content.clone(),
            posted_at: post.posted_at,
            is_archived: false,
            full_json,
            content_hash: content_hash(&post.content),
        }
    }
}
