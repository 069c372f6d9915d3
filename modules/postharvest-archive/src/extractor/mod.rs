// DomExtractor: rebuilds a post and its flat comment list from a serialized
// DOM snapshot. Pure functions over plain data; the browser only supplies
// the snapshot.

pub mod meta;
pub mod profile;
pub mod text;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use postharvest_common::{Comment, MediaSet, NormalizedPost, Platform};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use meta::{apply_meta_fallback, author_from_og_title, meta_from_html};
pub use profile::SelectorProfile;

/// Evaluated in the page; returns `{ html, meta }` as plain JSON.
pub const SNAPSHOT_JS: &str = r#"(() => {
  const meta = {};
  document.querySelectorAll('meta[content]').forEach((m) => {
    const key = m.getAttribute('property') || m.getAttribute('name');
    const value = (m.getAttribute('content') || '').trim();
    if (key && value && !(key in meta)) meta[key] = value;
  });
  return { html: document.documentElement.outerHTML, meta };
})()"#;

/// Serialized page state. Only data crosses the page boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub html: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl DomSnapshot {
    /// Build from raw page HTML, reading meta tags on this side.
    pub fn from_html(html: impl Into<String>) -> Self {
        let html = html.into();
        let meta = meta_from_html(&Html::parse_document(&html));
        Self { html, meta }
    }
}

/// Fields recovered from a post page, before platform/URL are attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPost {
    pub author: String,
    pub author_handle: String,
    pub avatar_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub content: String,
    pub images: MediaSet,
    pub videos: MediaSet,
    pub comments: Vec<Comment>,
    pub meta: BTreeMap<String, String>,
}

impl ExtractedPost {
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
            && self.images.is_empty()
            && self.videos.is_empty()
            && self.author.is_empty()
    }

    pub fn into_post(self, platform: Platform, url: &str) -> NormalizedPost {
        let mut post = NormalizedPost::new(platform, url);
        post.author = self.author;
        post.author_handle = self.author_handle;
        post.avatar_url = self.avatar_url;
        post.posted_at = self.posted_at;
        post.content = self.content;
        post.images = self.images;
        post.videos = self.videos;
        post.comments = self.comments;
        post.raw = serde_json::json!({ "meta": self.meta });
        post.finalize()
    }
}

/// Per-container fields shared by the main post and comments.
struct Entry {
    author: Option<String>,
    author_handle: Option<String>,
    avatar_url: Option<String>,
    posted_at: Option<DateTime<Utc>>,
    text: String,
    images: MediaSet,
    videos: MediaSet,
}

/// Full extraction: containers, boundary cut, main post, comments, meta union.
pub fn extract(snapshot: &DomSnapshot, profile: &SelectorProfile) -> ExtractedPost {
    let document = Html::parse_document(&snapshot.html);
    let meta = if snapshot.meta.is_empty() {
        meta_from_html(&document)
    } else {
        snapshot.meta.clone()
    };

    let position: HashMap<_, usize> = document
        .tree
        .root()
        .descendants()
        .enumerate()
        .map(|(i, node)| (node.id(), i))
        .collect();

    let mut containers: Vec<ElementRef<'_>> = document.select(&profile.container).collect();

    let boundary = document
        .select(&profile.boundary_heading)
        .find(|heading| profile.is_boundary_text(&text::clean_text(*heading, &profile.strip, &[])))
        .and_then(|heading| position.get(&heading.id()).copied());

    if let Some(cut) = boundary {
        let before = containers.len();
        containers.retain(|c| position.get(&c.id()).is_some_and(|&p| p < cut));
        debug!(
            dropped = before - containers.len(),
            "Dropped containers after related-content boundary"
        );
    }

    let mut post = ExtractedPost::default();

    if let Some((main, rest)) = containers.split_first() {
        let entry = read_entry(*main, profile);
        post.author = entry.author.or_else(|| entry.author_handle.clone()).unwrap_or_default();
        post.author_handle = entry.author_handle.unwrap_or_default();
        post.avatar_url = entry.avatar_url;
        post.posted_at = entry.posted_at;
        post.content = entry.text;
        post.images = entry.images;
        post.videos = entry.videos;

        for container in rest {
            if let Some(comment) = read_comment(*container, profile) {
                post.comments.push(comment);
            }
        }
    }

    apply_meta_fallback(&mut post, &meta);
    post.meta = meta;
    post
}

/// Meta-only extraction for when the full snapshot is unavailable.
pub fn extract_meta_only(snapshot: &DomSnapshot) -> ExtractedPost {
    let meta = if snapshot.meta.is_empty() && !snapshot.html.is_empty() {
        meta_from_html(&Html::parse_document(&snapshot.html))
    } else {
        snapshot.meta.clone()
    };
    let mut post = ExtractedPost::default();
    apply_meta_fallback(&mut post, &meta);
    post.meta = meta;
    post
}

fn read_comment(container: ElementRef<'_>, profile: &SelectorProfile) -> Option<Comment> {
    let entry = read_entry(container, profile);

    // Suggested-follow chips and similar noise carry one of these but not both.
    let (Some(avatar_url), Some(handle)) = (entry.avatar_url, entry.author_handle) else {
        debug!("Skipping container without avatar and author link");
        return None;
    };

    Some(Comment {
        author: entry.author.unwrap_or_else(|| handle.clone()),
        author_handle: handle,
        text: entry.text,
        posted_at: entry.posted_at,
        avatar_url: Some(avatar_url),
        images: entry.images,
        replies: Vec::new(),
    })
}

fn read_entry(container: ElementRef<'_>, profile: &SelectorProfile) -> Entry {
    let avatar_url = container
        .select(&profile.avatar)
        .find(|img| {
            img.value()
                .attr("alt")
                .is_some_and(|alt| profile.avatar_alt.is_match(alt))
        })
        .and_then(image_src);

    // Profile links outside the body text are header chrome; inside it they are mentions.
    let header_links: Vec<ElementRef<'_>> = container
        .select(&profile.author_link)
        .filter(|a| !inside(*a, &profile.text_span, container))
        .collect();

    let author_link = header_links.iter().copied().find(|a| {
        a.value().attr("href").is_some_and(|href| {
            !href.contains(profile.post_link_marker.as_str())
                && profile.handle_from_href(href).is_some()
        })
    });
    let author_handle = author_link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| profile.handle_from_href(href));
    let author = author_link
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty());

    let posted_at = container
        .select(&profile.timestamp)
        .filter_map(|t| t.value().attr("datetime"))
        .find_map(|dt| DateTime::parse_from_rfc3339(dt).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let mut images = MediaSet::new();
    for img in container.select(&profile.images) {
        if img
            .value()
            .attr("alt")
            .is_some_and(|alt| profile.avatar_alt.is_match(alt))
        {
            continue;
        }
        if declared_px(img, "width").is_some_and(|w| w < profile.min_image_px)
            || declared_px(img, "height").is_some_and(|h| h < profile.min_image_px)
        {
            continue;
        }
        if let Some(src) = image_src(img) {
            if !profile.is_thumbnail_url(&src) {
                images.insert(src);
            }
        }
    }

    let mut videos = MediaSet::new();
    for video in container.select(&profile.videos) {
        if let Some(src) = video.value().attr("src") {
            if !src.starts_with("blob:") {
                videos.insert(src);
            }
        }
    }

    let text = text::strip_trailing_noise(
        &text::clean_text(container, &profile.strip, &header_links),
        &profile.trailing_noise,
    );

    Entry {
        author,
        author_handle,
        avatar_url,
        posted_at,
        text,
        images,
        videos,
    }
}

/// True when an ancestor of `el` below `root` matches `scope`.
fn inside(el: ElementRef<'_>, scope: &Selector, root: ElementRef<'_>) -> bool {
    el.ancestors()
        .take_while(|node| node.id() != root.id())
        .filter_map(ElementRef::wrap)
        .any(|ancestor| scope.matches(&ancestor))
}

/// `src`, or the first candidate of `srcset`.
fn image_src(img: ElementRef<'_>) -> Option<String> {
    let el = img.value();
    el.attr("src")
        .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
        .map(str::to_string)
        .or_else(|| {
            el.attr("srcset")
                .and_then(|set| set.split(',').next())
                .and_then(|candidate| candidate.split_whitespace().next())
                .map(str::to_string)
        })
}

fn declared_px(img: ElementRef<'_>, attr: &str) -> Option<u32> {
    img.value()
        .attr(attr)
        .and_then(|v| v.trim().trim_end_matches("px").parse().ok())
}
