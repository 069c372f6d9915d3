// Selector configuration for the DOM extractor. The algorithm in `mod.rs` is
// platform-neutral; everything markup-specific lives here.

use regex::Regex;
use scraper::Selector;

/// Markup knowledge for one platform's rendered post page.
#[derive(Debug, Clone)]
pub struct SelectorProfile {
    /// One element per post or comment, in document order.
    pub container: Selector,
    /// Same as `container`, as CSS text for in-page waits.
    pub ready_selector: String,
    /// Candidate avatar images; matched further by `avatar_alt`.
    pub avatar: Selector,
    pub avatar_alt: Regex,
    /// Profile links. Links containing `post_link_marker` are permalinks, not authors.
    pub author_link: Selector,
    /// Body text runs. Profile links inside them are mentions and stay in the text.
    pub text_span: Selector,
    pub post_link_marker: String,
    /// The handle is whatever follows this in the author href.
    pub handle_delimiter: String,
    pub timestamp: Selector,
    pub images: Selector,
    pub videos: Selector,
    /// Headings that may start the "related content" section.
    pub boundary_heading: Selector,
    pub boundary_phrases: Vec<String>,
    /// Subtrees skipped when collecting a container's text.
    pub strip: Selector,
    /// Anchored trailing patterns removed from cleaned text, applied until stable.
    pub trailing_noise: Vec<Regex>,
    /// Substrings marking avatar or thumbnail assets in image URLs.
    pub thumbnail_markers: Vec<String>,
    /// Images with a declared width or height below this are thumbnails.
    pub min_image_px: u32,
}

const THREADS_CONTAINER: &str = r#"div[data-pressable-container="true"]"#;

const THREADS_BOUNDARY_PHRASES: &[&str] = &[
    "Related threads",
    "More from",
    "You might like",
    "相關串文",
    "相关串文",
    "更多來自",
    "關聯的串文",
    "関連スレッド",
    "Hilos relacionados",
    "Threads relacionados",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

impl SelectorProfile {
    /// Threads post page as rendered for a logged-out desktop browser.
    pub fn threads() -> Self {
        Self {
            container: selector(THREADS_CONTAINER),
            ready_selector: THREADS_CONTAINER.to_string(),
            avatar: selector("img[alt]"),
            avatar_alt: regex(r"(?i)profile picture|的大頭貼照|的头像|のプロフィール写真"),
            author_link: selector(r#"a[href^="/@"]"#),
            text_span: selector(r#"span[dir="auto"]"#),
            post_link_marker: "/post/".to_string(),
            handle_delimiter: "/@".to_string(),
            timestamp: selector("time[datetime]"),
            images: selector("picture img, img[srcset]"),
            videos: selector("video[src], video source[src]"),
            boundary_heading: selector(r#"h1, h2, h3, h4, [role="heading"]"#),
            boundary_phrases: THREADS_BOUNDARY_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            strip: selector(
                r#"time, button, svg, [role="button"], picture, img, video, script, style"#,
            ),
            trailing_noise: vec![
                regex(r"(?i)(?:^|\n)\s*(?:translate|see translation|翻譯|翻译|查看翻譯|顯示翻譯)\s*$"),
                regex(r"(?i)(?:^|\n)\s*(?:pinned|已置頂|置顶)\s*$"),
                regex(r"(?:^|\n)\s*\d[\d.,]*\s*[KkMm萬万]?\s*$"),
            ],
            thumbnail_markers: vec![
                "s150x150".to_string(),
                "profile_pic".to_string(),
                "/t51.2885-19/".to_string(),
            ],
            min_image_px: 100,
        }
    }

    /// Add boundary phrases on top of the defaults. Blank and repeated
    /// phrases are ignored.
    pub fn with_boundary_phrases<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for phrase in extra {
            let phrase = phrase.into();
            let phrase = phrase.trim();
            if !phrase.is_empty() && !self.boundary_phrases.iter().any(|p| p == phrase) {
                self.boundary_phrases.push(phrase.to_string());
            }
        }
        self
    }

    /// True when the heading text names the related-content section.
    pub fn is_boundary_text(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        self.boundary_phrases
            .iter()
            .any(|phrase| text.contains(&phrase.to_lowercase()))
    }

    /// Handle from an author href, e.g. `/@zuck` or `https://www.threads.net/@zuck?x=1`.
    pub fn handle_from_href(&self, href: &str) -> Option<String> {
        let (_, rest) = href.split_once(self.handle_delimiter.as_str())?;
        let handle = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        (!handle.is_empty()).then(|| handle.to_string())
    }

    pub fn is_thumbnail_url(&self, url: &str) -> bool {
        self.thumbnail_markers.iter().any(|m| url.contains(m.as_str()))
    }
}
