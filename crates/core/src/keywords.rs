//! Extracted keywords: the structured reading of a user utterance.

use serde::{Deserialize, Serialize};

use crate::corpus::Difficulty;

/// What the user is trying to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Question,
    Exercise,
    Error,
    Learning,
    #[default]
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Exercise => "exercise",
            Self::Error => "error",
            Self::Learning => "learning",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concepts, languages, error types and topics found in an utterance.
///
/// Every list is always present (possibly empty).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedKeywords {
    pub concepts: Vec<String>,
    pub languages: Vec<String>,
    pub error_types: Vec<String>,
    pub topics: Vec<String>,
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Lowercase whitespace-split words longer than two characters
    pub raw_tokens: Vec<String>,
}

impl ExtractedKeywords {
    /// Terms used by the keyword fallback: every tagged category plus the
    /// first five raw tokens.
    pub fn search_terms(&self) -> Vec<String> {
        self.concepts
            .iter()
            .chain(&self.languages)
            .chain(&self.error_types)
            .chain(&self.topics)
            .cloned()
            .chain(self.raw_tokens.iter().take(5).cloned())
            .collect()
    }

    /// Whether the exercise-matching path should run.
    pub fn wants_exercises(&self) -> bool {
        self.intent == Intent::Exercise || self.topics.iter().any(|t| t == "exercise")
    }

    /// Up to `limit` suggested topics: concepts, then topics, then languages.
    pub fn suggested_topics(&self, limit: usize) -> Vec<String> {
        self.concepts
            .iter()
            .chain(&self.topics)
            .chain(&self.languages)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_cap_raw_tokens() {
        let kw = ExtractedKeywords {
            concepts: vec!["recursion".into()],
            languages: vec!["Python".into()],
            raw_tokens: (0..8).map(|i| format!("tok{i}")).collect(),
            ..Default::default()
        };
        let terms = kw.search_terms();
        assert_eq!(terms.len(), 7);
        assert_eq!(terms[0], "recursion");
        assert_eq!(terms[6], "tok4");
    }

    #[test]
    fn exercise_topic_triggers_exercise_path() {
        let kw = ExtractedKeywords {
            topics: vec!["exercise".into()],
            ..Default::default()
        };
        assert!(kw.wants_exercises());
        assert!(!ExtractedKeywords::default().wants_exercises());
    }

    #[test]
    fn default_intent_is_general() {
        assert_eq!(ExtractedKeywords::default().intent, Intent::General);
        let json = serde_json::to_string(&Intent::Question).unwrap();
        assert_eq!(json, "\"question\"");
    }
}
