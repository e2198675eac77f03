//! Locating a JSON object inside free-form model output.
//!
//! Strategies are tried in a fixed order; within a strategy, candidates are
//! tried in the order they appear. The first candidate that parses as a JSON
//! object wins.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const FENCE_PATTERN: &str = r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n?(.*?)```";

/// One way of finding candidate JSON text in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Body of a code fence labelled `json`
    FencedJson,
    /// Body of any code fence
    FencedAny,
    /// From the first `{` to the last `}` of the raw text
    BraceSpan,
}

impl ExtractionStrategy {
    pub const ORDER: [ExtractionStrategy; 3] = [
        ExtractionStrategy::FencedJson,
        ExtractionStrategy::FencedAny,
        ExtractionStrategy::BraceSpan,
    ];

    /// Candidate spans for this strategy, trimmed, in order of appearance
    pub fn candidates<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self {
            ExtractionStrategy::FencedJson => fenced_blocks(text)
                .into_iter()
                .filter(|(label, _)| label.eq_ignore_ascii_case("json"))
                .map(|(_, body)| body)
                .collect(),
            ExtractionStrategy::FencedAny => fenced_blocks(text)
                .into_iter()
                .map(|(_, body)| body)
                .collect(),
            ExtractionStrategy::BraceSpan => brace_span(text).into_iter().collect(),
        }
    }
}

/// A parsed object and the strategy that found it
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub object: Map<String, Value>,
    pub strategy: ExtractionStrategy,
}

/// First JSON object found by the strategies in `ExtractionStrategy::ORDER`
pub fn extract_json_object(text: &str) -> Option<Extracted> {
    ExtractionStrategy::ORDER.iter().find_map(|strategy| {
        strategy
            .candidates(text)
            .into_iter()
            .find_map(parse_object)
            .map(|object| Extracted {
                object,
                strategy: *strategy,
            })
    })
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(FENCE_PATTERN).expect("fence pattern is valid"))
}

fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    fence()
        .captures_iter(text)
        .filter_map(|caps| {
            let label = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str().trim();
            Some((label, body))
        })
        .collect()
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(text[start..=end].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn fenced_json_with_trailing_prose() {
        let text = "```json\n{\"a\":1}\n```\nLet me know if you need anything else.";
        let extracted = extract_json_object(text).unwrap();
        assert_eq!(extracted.object, object(json!({"a": 1})));
        assert_eq!(extracted.strategy, ExtractionStrategy::FencedJson);
    }

    #[test]
    fn json_fence_is_preferred_over_other_fences() {
        let text = "```\n{\"from\": \"plain\"}\n```\n```JSON\n{\"from\": \"json\"}\n```";
        let extracted = extract_json_object(text).unwrap();
        assert_eq!(extracted.object, object(json!({"from": "json"})));
    }

    #[test]
    fn generic_fence_is_used_when_json_fence_is_broken() {
        let text = "```json\n{broken\n```\nRetrying:\n```\n{\"ok\": true}\n```";
        let extracted = extract_json_object(text).unwrap();
        assert_eq!(extracted.object, object(json!({"ok": true})));
        assert_eq!(extracted.strategy, ExtractionStrategy::FencedAny);
    }

    #[test]
    fn bare_object_inside_prose() {
        let text = "Here is the research: {\"issues\": [{\"title\": \"Tax {reform}\"}]} Hope it helps.";
        let extracted = extract_json_object(text).unwrap();
        assert_eq!(extracted.strategy, ExtractionStrategy::BraceSpan);
        assert_eq!(extracted.object["issues"][0]["title"], json!("Tax {reform}"));
    }

    #[test]
    fn arrays_and_scalars_are_not_objects() {
        assert!(extract_json_object("```json\n[1, 2, 3]\n```").is_none());
        assert!(extract_json_object("```\n42\n```").is_none());
    }

    #[test]
    fn text_without_braces_yields_nothing() {
        assert!(extract_json_object("I could not find any information about this person.").is_none());
        assert!(ExtractionStrategy::BraceSpan.candidates("} backwards {").is_empty());
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(
            ExtractionStrategy::FencedAny.candidates("```{\"a\": 2}```"),
            vec!["{\"a\": 2}"]
        );
    }
}
