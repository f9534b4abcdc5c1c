//! Normalization passes applied to raw model output before JSON parsing.
//!
//! The backend is asked for pure JSON but still returns it wrapped in code
//! fences, sprinkled with control characters, or carrying citation markers
//! when web grounding is active. The passes run in a fixed order, each one
//! independently testable:
//!
//! 1. [`strip_code_fences`]
//! 2. [`strip_control_chars`]
//! 3. [`strip_citation_markers`]
//! 4. parse; on failure, [`extract_balanced_span`] and parse again

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

/// Citation markers injected by a web-search-grounded backend, in both the
/// `【4:2†source】` and the `[1]` / `[2, 3]` shapes.
static CITATION_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"【[^】]*】|\[\d+(?:,\s*\d+)*\]").unwrap());

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}

/// Drop control characters that break JSON string parsing.
///
/// Newlines and tabs are kept; they are legal whitespace between tokens and
/// removing them would not make an invalid payload any more valid.
pub fn strip_control_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect()
}

/// Remove citation markers left behind by grounded generation.
pub fn strip_citation_markers(raw: &str) -> String {
    CITATION_MARKERS.replace_all(raw, "").into_owned()
}

/// The full normalization chain, in order.
pub fn normalize(raw: &str) -> String {
    strip_citation_markers(&strip_control_chars(&strip_code_fences(raw)))
}

/// Best-effort extraction of the outermost balanced `{...}` span.
///
/// Tracks string literals and escapes so braces inside values do not skew
/// the depth count. Returns `None` when no balanced span exists.
pub fn extract_balanced_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Normalize and parse, falling back to the balanced-span extraction when
/// the cleaned payload still fails to parse.
pub fn parse_repaired<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let cleaned = normalize(raw);
    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(first) => match extract_balanced_span(&cleaned) {
            Some(span) => serde_json::from_str(span),
            None => Err(first),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        title: String,
        tags: Vec<String>,
    }

    #[test]
    fn fences_and_control_chars_strip_to_the_bare_payload() {
        let bare = r#"{"title": "전기요금 절약 방법", "tags": ["절약"]}"#;
        let wrapped =
            "```json\n{\"title\": \u{8}\"전기요금 절약 방법\",\r \"tags\": [\"절약\"]\u{0}}\n```";

        let repaired = normalize(wrapped);
        let expected: Record = serde_json::from_str(bare).unwrap();
        assert_eq!(serde_json::from_str::<Record>(&repaired).unwrap(), expected);
    }

    #[test]
    fn fence_without_language_tag_strips_too() {
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_input_passes_through_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn newlines_and_tabs_survive_control_stripping() {
        assert_eq!(
            strip_control_chars("{\n\t\"a\": 1\u{1}\r}"),
            "{\n\t\"a\": 1}"
        );
    }

    #[test]
    fn citation_markers_are_removed() {
        assert_eq!(
            strip_citation_markers("요금제 비교【4:2†source】 결과[1] 및[2, 3] 정리"),
            "요금제 비교 결과 및 정리"
        );
    }

    #[test]
    fn balanced_span_ignores_braces_inside_strings() {
        let raw = r#"Here you go: {"a": "value with } brace", "b": {"c": 1}} trailing prose"#;
        assert_eq!(
            extract_balanced_span(raw),
            Some(r#"{"a": "value with } brace", "b": {"c": 1}}"#)
        );
    }

    #[test]
    fn balanced_span_handles_escaped_quotes() {
        let raw = r#"{"a": "quote \" and } inside"}"#;
        assert_eq!(extract_balanced_span(raw), Some(raw));
    }

    #[test]
    fn no_balanced_span_in_truncated_payload() {
        assert_eq!(extract_balanced_span(r#"{"a": "unterminated"#), None);
    }

    #[test]
    fn parse_repaired_recovers_json_wrapped_in_prose() {
        let raw = "물론이죠! 요청하신 결과입니다:\n```json\n{\"title\": \"절약 가이드\", \"tags\": [\"전기\", \"요금\"]}\n```\n도움이 되었길 바랍니다.";
        let record: Record = parse_repaired(raw).unwrap();
        assert_eq!(record.title, "절약 가이드");
        assert_eq!(record.tags, vec!["전기", "요금"]);
    }

    #[test]
    fn parse_repaired_reports_unrecoverable_payloads() {
        assert!(parse_repaired::<Record>("not json at all").is_err());
    }
}
