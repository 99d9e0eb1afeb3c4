//! Intent inference over free-form input.
//!
//! The classifier holds an ordered rule table; the first matching rule
//! wins, so inference is deterministic for a given input. Named capture
//! groups in a rule's pattern become intent parameters. Input that
//! matches no rule yields the `unknown` intent with zero confidence.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// An inferred intent with extracted parameters and a confidence score.
#[derive(Debug, Clone)]
pub struct Intent {
    pub name: String,
    pub parameters: Map<String, Value>,
    pub confidence: f64,
}

impl Intent {
    /// An intent asserted by the caller rather than inferred.
    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Map::new(),
            confidence: 1.0,
        }
    }

    fn unknown() -> Self {
        Self {
            name: "unknown".into(),
            parameters: Map::new(),
            confidence: 0.0,
        }
    }
}

/// Coarse shape of a piece of input content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Url,
    Code,
    Text,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Json => "json",
            ContentKind::Url => "url",
            ContentKind::Code => "code",
            ContentKind::Text => "text",
        }
    }
}

/// Classify content by shape. Checked in order of specificity; anything
/// unrecognized is plain text.
pub fn classify_content(content: &str) -> ContentKind {
    let trimmed = content.trim();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<Value>(trimmed).is_ok()
    {
        return ContentKind::Json;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return ContentKind::Url;
    }
    let code_markers = ["fn ", "def ", "class ", "import ", "```", "#include", "let "];
    if code_markers.iter().any(|m| trimmed.contains(m)) {
        return ContentKind::Code;
    }
    ContentKind::Text
}

/// One entry in the classifier's rule table.
struct IntentRule {
    name: &'static str,
    pattern: Regex,
    confidence: f64,
}

/// Ordered-rule intent classifier.
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    /// Build the default rule table.
    ///
    /// Rules are ordered most-specific first; order is part of the
    /// classifier's contract since the first match wins.
    pub fn new() -> Self {
        let rules = vec![
            rule(
                "translate",
                r"(?i)\btranslate\b.*\binto\s+(?P<language>[a-zA-Z]+)",
                0.9,
            ),
            rule("translate", r"(?i)\btranslate\b", 0.6),
            rule("summarize", r"(?i)\b(summarize|summarise|tl;?dr)\b", 0.9),
            rule("question", r"(?i)^(what|who|when|where|why|how|is|are|can|does)\b", 0.8),
            rule("question", r"\?\s*$", 0.7),
            rule("creation", r"(?i)^(create|generate|write|draft|compose)\b", 0.8),
            rule("analysis", r"(?i)\b(analy[sz]e|analysis|review|evaluate)\b", 0.8),
            rule("transform", r"(?i)\b(convert|transform|reformat)\b", 0.7),
        ];
        Self { rules }
    }

    /// Infer the intent of a piece of text.
    ///
    /// The first matching rule in table order determines the intent; its
    /// named captures become parameters. The content kind is always
    /// attached under the `content_kind` parameter.
    pub fn infer(&self, text: &str) -> Intent {
        let kind = classify_content(text);
        for r in &self.rules {
            if let Some(captures) = r.pattern.captures(text) {
                let mut parameters = Map::new();
                for group in r.pattern.capture_names().flatten() {
                    if let Some(m) = captures.name(group) {
                        parameters.insert(
                            group.to_string(),
                            Value::String(m.as_str().to_lowercase()),
                        );
                    }
                }
                parameters.insert(
                    "content_kind".into(),
                    Value::String(kind.as_str().into()),
                );
                debug!(intent = r.name, confidence = r.confidence, "intent inferred");
                return Intent {
                    name: r.name.to_string(),
                    parameters,
                    confidence: r.confidence,
                };
            }
        }
        debug!("no intent rule matched");
        let mut intent = Intent::unknown();
        intent
            .parameters
            .insert("content_kind".into(), Value::String(kind.as_str().into()));
        intent
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn rule(name: &'static str, pattern: &str, confidence: f64) -> IntentRule {
    IntentRule {
        name,
        // Patterns are compile-time constants; a bad one is a programmer error
        pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid intent rule: {e}")),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_intent() {
        let intent = IntentClassifier::new().infer("What is a conflux?");
        assert_eq!(intent.name, "question");
        assert!(intent.confidence >= 0.8);
    }

    #[test]
    fn test_translate_extracts_language() {
        let intent = IntentClassifier::new().infer("Please translate this into French");
        assert_eq!(intent.name, "translate");
        assert_eq!(intent.parameters["language"], json!("french"));
    }

    #[test]
    fn test_translate_without_language_has_lower_confidence() {
        let intent = IntentClassifier::new().infer("translate this");
        assert_eq!(intent.name, "translate");
        assert!(intent.confidence < 0.9);
        assert!(!intent.parameters.contains_key("language"));
    }

    #[test]
    fn test_unmatched_text_is_unknown_with_zero_confidence() {
        let intent = IntentClassifier::new().infer("lorem ipsum dolor");
        assert_eq!(intent.name, "unknown");
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let classifier = IntentClassifier::new();
        // "analyze ... ?" matches both analysis and question rules; the
        // table order resolves the tie the same way every time
        let text = "analyze this code?";
        let first = classifier.infer(text);
        for _ in 0..10 {
            assert_eq!(classifier.infer(text).name, first.name);
        }
    }

    #[test]
    fn test_content_kind_json() {
        assert_eq!(classify_content(r#"{"a": 1}"#), ContentKind::Json);
        assert_eq!(classify_content("[1, 2]"), ContentKind::Json);
        // Braces alone are not enough
        assert_eq!(classify_content("{not json"), ContentKind::Text);
    }

    #[test]
    fn test_content_kind_url_and_code() {
        assert_eq!(classify_content("https://example.com/x"), ContentKind::Url);
        assert_eq!(classify_content("fn main() {}"), ContentKind::Code);
        assert_eq!(classify_content("plain words"), ContentKind::Text);
    }

    #[test]
    fn test_content_kind_attached_as_parameter() {
        let intent = IntentClassifier::new().infer("https://example.com/doc");
        assert_eq!(intent.name, "unknown");
        assert_eq!(intent.parameters["content_kind"], json!("url"));
    }
}
