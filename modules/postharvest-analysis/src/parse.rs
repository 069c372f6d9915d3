// Lenient parsing of model output into a structured summary.

use std::sync::LazyLock;

use postharvest_common::{AnalysisSummary, StructuredSummary};
use regex::Regex;
use serde_json::Value;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub summary: AnalysisSummary,
    /// The parsed object, when one was found.
    pub structured: Option<Value>,
}

/// Brace span first, then a fenced block, then the raw text.
pub fn parse_ai_response(text: &str) -> ParsedResponse {
    let parsed = brace_span(text).or_else(|| fenced_block(text));

    match parsed {
        Some(value) => ParsedResponse {
            summary: AnalysisSummary::Structured(StructuredSummary::from_value(&value)),
            structured: Some(value),
        },
        None => ParsedResponse {
            summary: AnalysisSummary::Text(text.trim().to_string()),
            structured: None,
        },
    }
}

fn as_object(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate.trim())
        .ok()
        .filter(Value::is_object)
}

fn brace_span(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    as_object(&text[start..=end])
}

fn fenced_block(text: &str) -> Option<Value> {
    FENCED_JSON
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| as_object(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_with_chatter() {
        let parsed = parse_ai_response(
            r#"Sure! Here it is: {"core_insight": "x", "key_points": ["a"], "tags": ["t"]} Hope that helps."#,
        );
        let structured = parsed.structured.unwrap();
        assert_eq!(structured["core_insight"], "x");
        match parsed.summary {
            AnalysisSummary::Structured(s) => assert_eq!(s.key_points, ["a"]),
            other => panic!("expected structured summary, got {other:?}"),
        }
    }

    #[test]
    fn fenced_json_yields_object_not_string() {
        let text = "Analysis:\n```json\n{\"core_insight\": \"fenced\", \"tags\": [\"a\", \"b\"]}\n```\n";
        let parsed = parse_ai_response(text);

        assert_eq!(parsed.structured.as_ref().unwrap()["core_insight"], "fenced");
        assert!(matches!(
            parsed.summary,
            AnalysisSummary::Structured(ref s) if s.core_insight == "fenced" && s.tags == ["a", "b"]
        ));
    }

    #[test]
    fn fence_is_used_when_brace_span_is_not_json() {
        // The outer brace span covers prose and is invalid; the fence still parses.
        let text = "Use {curly} words.\n```json\n{\"core_insight\": \"inner\"}\n```\nThe end }";
        let parsed = parse_ai_response(text);
        assert_eq!(parsed.structured.unwrap()["core_insight"], "inner");
    }

    #[test]
    fn plain_text_falls_through() {
        let parsed = parse_ai_response("  I could not produce JSON for this.  ");
        assert!(parsed.structured.is_none());
        assert_eq!(
            parsed.summary,
            AnalysisSummary::Text("I could not produce JSON for this.".into())
        );
    }

    #[test]
    fn arrays_are_not_summaries() {
        let parsed = parse_ai_response("[1, 2, 3]");
        assert!(parsed.structured.is_none());
    }
}
