// <meta> tag handling: reading them out of HTML and the og:* fallback.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use postharvest_common::MediaSet;
use scraper::{Html, Selector};

use super::ExtractedPost;

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("valid selector"));

/// `Name (@handle) on Threads`, `Name (@handle) • Instagram photos`, etc.
static OG_TITLE_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(.*?)\s*\(@([A-Za-z0-9_.]+)\)").expect("valid regex"));

/// Meta tags keyed by `property` or `name`. The first occurrence of a key wins.
pub fn meta_from_html(document: &Html) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    for el in document.select(&META_SELECTOR) {
        let key = el
            .value()
            .attr("property")
            .or_else(|| el.value().attr("name"));
        let (Some(key), Some(content)) = (key, el.value().attr("content")) else {
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }
        meta.entry(key.to_string())
            .or_insert_with(|| content.trim().to_string());
    }
    meta
}

/// Split an og:title like `Mark Zuckerberg (@zuck) on Threads`.
pub fn author_from_og_title(title: &str) -> Option<(String, String)> {
    let caps = OG_TITLE_AUTHOR.captures(title)?;
    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    let handle = caps.get(2)?.as_str();
    let name = if name.is_empty() { handle } else { name };
    Some((name.to_string(), handle.to_string()))
}

/// Fill whatever the DOM pass left empty from og:* tags. Never overwrites
/// DOM-derived values; media from meta is unioned in only when the DOM
/// produced none.
pub fn apply_meta_fallback(post: &mut ExtractedPost, meta: &BTreeMap<String, String>) {
    if post.content.trim().is_empty() {
        if let Some(desc) = meta
            .get("og:description")
            .or_else(|| meta.get("description"))
        {
            post.content = desc.trim().to_string();
        }
    }

    if post.images.is_empty() {
        post.images.union(&meta_media(
            meta,
            &["og:image", "og:image:url", "og:image:secure_url", "twitter:image"],
        ));
    }

    if post.videos.is_empty() {
        post.videos.union(&meta_media(
            meta,
            &["og:video", "og:video:url", "og:video:secure_url"],
        ));
    }

    if post.author.is_empty() {
        if let Some((name, handle)) = meta.get("og:title").and_then(|t| author_from_og_title(t)) {
            post.author = name;
            if post.author_handle.is_empty() {
                post.author_handle = handle;
            }
        }
    }
}

fn meta_media(meta: &BTreeMap<String, String>, keys: &[&str]) -> MediaSet {
    keys.iter()
        .filter_map(|key| meta.get(*key))
        .map(|url| url.to_string())
        .collect()
}
