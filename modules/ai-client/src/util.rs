/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Short preview of an error body for log lines.
pub(crate) fn body_preview(body: &str) -> String {
    let cut = truncate_to_char_boundary(body, 300);
    if cut.len() < body.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}
