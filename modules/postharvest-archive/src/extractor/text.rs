// Text cleaning over a container subtree. Works on a read-only walk of the
// parsed snapshot, so the live page is never touched.

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Selector};

const BLOCK_ELEMENTS: &[&str] = &["div", "p", "li", "h1", "h2", "h3", "h4"];

/// Visible text of `root`, skipping any subtree matched by `strip` and the
/// elements in `skip`. Block boundaries become line breaks; runs of
/// whitespace collapse.
pub fn clean_text(root: ElementRef<'_>, strip: &Selector, skip: &[ElementRef<'_>]) -> String {
    let mut raw = String::new();
    collect(root, strip, skip, &mut raw);
    normalize_lines(&raw)
}

fn collect(element: ElementRef<'_>, strip: &Selector, skip: &[ElementRef<'_>], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if strip.matches(&child_ref) || skip.iter().any(|s| s.id() == child_ref.id()) {
                    continue;
                }
                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect(child_ref, strip, skip, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove anchored trailing UI noise, repeating until no pattern matches.
pub fn strip_trailing_noise(text: &str, patterns: &[Regex]) -> String {
    let mut current = text.trim().to_string();
    loop {
        let before = current.len();
        for pattern in patterns {
            let stripped = pattern.replace(&current, "").trim_end().to_string();
            current = stripped;
        }
        if current.len() == before {
            return current;
        }
    }
}
