// Platform detection from the URL string alone (no HTTP).

use postharvest_common::{sanitize_url, Platform};
use url::Url;

/// A URL with its platform decided and its host/query normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub platform: Platform,
    pub url: String,
}

/// Platform domains in fixed priority order. First match wins.
const DOMAINS: &[(&str, Platform)] = &[
    ("threads.net", Platform::Threads),
    ("threads.com", Platform::Threads),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("instagram.com", Platform::Instagram),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
];

/// Match the URL host against the platform domains (exact or subdomain).
/// Input that does not parse as a URL falls back to a substring match.
pub fn resolve(url: &str) -> Platform {
    let lower = url.trim().to_lowercase();

    match host_of(&lower) {
        Some(host) => DOMAINS
            .iter()
            .find(|(domain, _)| host_matches(&host, domain))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Unknown),
        None => DOMAINS
            .iter()
            .find(|(domain, _)| lower.contains(domain))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Unknown),
    }
}

/// Host of `url`, accepting scheme-less input such as `x.com/jack/status/1`.
fn host_of(url: &str) -> Option<String> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{url}")).ok()?,
        Err(_) => return None,
    };
    parsed.host_str().map(str::to_string)
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Rewrite the `threads.com` alias to `threads.net` and drop tracking params.
pub fn canonicalize(url: &str) -> String {
    let trimmed = url.trim();
    let aliased = if resolve(trimmed) == Platform::Threads {
        trimmed.replacen("threads.com", "threads.net", 1)
    } else {
        trimmed.to_string()
    };
    sanitize_url(&aliased)
}

pub fn resolve_url(url: &str) -> ResolvedUrl {
    let url = canonicalize(url);
    ResolvedUrl {
        platform: resolve(&url),
        url,
    }
}
