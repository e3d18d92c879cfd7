//! Keyword router deciding which module should answer a question

use serde::Serialize;

/// Phrases suggesting the answer is text printed in the image
const TEXT_KEYWORDS: &[&str] = &[
    "read", "text", "says", "written", "word", "letter", "sign", "label", "caption", "title",
    "heading", "number", "digit", "price", "address", "phone", "email", "url", "date", "name on",
    "writing",
];

/// Phrases suggesting the answer needs scene understanding
const VISION_KEYWORDS: &[&str] = &[
    "what color", "how many", "where is", "who is", "what is", "describe", "show", "look like",
    "doing", "wearing", "holding", "scene", "background", "object", "person", "animal",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoutingDecision {
    #[serde(rename = "ocr")]
    TextModule,
    #[serde(rename = "vqa")]
    VisionModule,
}

impl RoutingDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextModule => "ocr",
            Self::VisionModule => "vqa",
        }
    }

    /// The module that is not this one
    pub fn other(&self) -> Self {
        match self {
            Self::TextModule => Self::VisionModule,
            Self::VisionModule => Self::TextModule,
        }
    }
}

/// Keyword match counts for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteScores {
    pub text: usize,
    pub vision: usize,
}

/// Count keywords contained anywhere in the lowercased question.
///
/// Matching is by substring, so "sign" also counts inside "design".
pub fn score(question: &str) -> RouteScores {
    let question = question.to_lowercase();
    let count = |keywords: &[&str]| keywords.iter().filter(|k| question.contains(*k)).count();
    RouteScores {
        text: count(TEXT_KEYWORDS),
        vision: count(VISION_KEYWORDS),
    }
}

/// Text module only when it has strictly more keyword matches; ties and
/// questions with no matches go to the vision module.
pub fn route(question: &str) -> RoutingDecision {
    let scores = score(question);
    let decision = if scores.text > scores.vision {
        RoutingDecision::TextModule
    } else {
        RoutingDecision::VisionModule
    };
    tracing::debug!(
        "Routed to {} (text={}, vision={})",
        decision.as_str(),
        scores.text,
        scores.vision
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_goes_to_vision() {
        assert_eq!(score("What color is the sign?"), RouteScores { text: 1, vision: 1 });
        assert_eq!(route("What color is the sign?"), RoutingDecision::VisionModule);
    }

    #[test]
    fn test_reading_question_goes_to_text() {
        assert_eq!(route("Read the text on this sign"), RoutingDecision::TextModule);
        assert_eq!(score("Read the text on this sign").vision, 0);
    }

    #[test]
    fn test_no_keywords_goes_to_vision() {
        assert_eq!(route(""), RoutingDecision::VisionModule);
        assert_eq!(route("Hmm?"), RoutingDecision::VisionModule);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(route("WHAT DOES THE LABEL SAY"), RoutingDecision::TextModule);
        assert_eq!(route("Describe The Scene"), RoutingDecision::VisionModule);
    }

    #[test]
    fn test_substring_matches_count() {
        // "design" contains "sign", "thread" contains "read"
        assert_eq!(score("the thread design").text, 2);
    }

    #[test]
    fn test_route_is_deterministic() {
        let question = "What is the price written on the label?";
        let first = route(question);
        for _ in 0..10 {
            assert_eq!(route(question), first);
        }
        assert_eq!(first, RoutingDecision::TextModule);
    }

    #[test]
    fn test_serializes_as_module_tags() {
        assert_eq!(serde_json::to_string(&RoutingDecision::TextModule).unwrap(), "\"ocr\"");
        assert_eq!(serde_json::to_string(&RoutingDecision::VisionModule).unwrap(), "\"vqa\"");
    }
}
