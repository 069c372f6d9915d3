use postharvest_common::{truncate_chars, NormalizedPost};

/// Upper bound on transcript text sent to a model.
const MAX_TRANSCRIPT_CHARS: usize = 12_000;

pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a knowledge curator. You receive a social media post and its visible comments, numbered: [0] is the post itself, [n] is the n-th comment and [n.r] a reply to comment n. Images from the post may be attached.

Distill what a reader should take away. Respond with a single JSON object and nothing else:
{
  "core_insight": "one or two sentences",
  "key_points": ["3-6 short points, drawing on comments where they add substance"],
  "actionable_knowledge": "what the reader can do with this, or an empty string",
  "tags": ["3-6 lowercase topic tags"]
}

Write in the language of the original post."#;

pub const REMIX_SYSTEM_PROMPT: &str = r#"You rewrite social media posts. You receive a post with its comments and the user's instructions. Produce a new post in plain text that follows the instructions, keeps the factual content, and reads naturally on social media. Do not add hashtags unless asked. Output only the new post."#;

/// The post and its comments as numbered lines, truncated to a fixed budget.
pub fn transcript(post: &NormalizedPost) -> String {
    let mut out = String::new();
    out.push_str(&format!("Platform: {}\nURL: {}\n\n", post.platform, post.original_url));

    for entry in &post.full_json {
        let who = match (entry.author.is_empty(), entry.author_handle.is_empty()) {
            (false, false) => format!("{} (@{})", entry.author, entry.author_handle),
            (false, true) => entry.author.clone(),
            (true, false) => format!("@{}", entry.author_handle),
            (true, true) => "unknown".to_string(),
        };
        out.push_str(&format!("[{}] {who}: {}\n", entry.index, entry.text.trim()));
    }

    truncate_chars(&out, MAX_TRANSCRIPT_CHARS).to_string()
}

pub fn remix_request(post: &NormalizedPost, instructions: &str) -> String {
    let instructions = instructions.trim();
    let instructions = if instructions.is_empty() {
        "Rewrite it in your own words."
    } else {
        instructions
    };
    format!("{}\nInstructions: {instructions}", transcript(post))
}

#[cfg(test)]
mod tests {
    use super::*;
    use postharvest_common::{Comment, Platform};

    #[test]
    fn transcript_numbers_post_and_comments() {
        let mut post = NormalizedPost::new(Platform::Threads, "https://www.threads.net/@a/post/1");
        post.author = "Ann".into();
        post.author_handle = "ann".into();
        post.content = "Main text".into();
        post.comments.push(Comment {
            author_handle: "bob".into(),
            text: "A reply".into(),
            ..Default::default()
        });
        let text = transcript(&post.finalize());

        assert!(text.contains("[0] Ann (@ann): Main text"));
        assert!(text.contains("[1] @bob: A reply"));
    }

    #[test]
    fn transcript_is_bounded() {
        let mut post = NormalizedPost::new(Platform::Twitter, "https://x.com/a/status/1");
        post.content = "長".repeat(MAX_TRANSCRIPT_CHARS * 2);
        let text = transcript(&post.finalize());
        assert_eq!(text.chars().count(), MAX_TRANSCRIPT_CHARS);
    }
}
