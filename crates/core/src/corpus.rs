//! Corpus types: exemplars and exercises available for retrieval.
//!
//! Exemplars are curated question/answer pairs used as grounding context.
//! Exercises are gradable practice problems and are read-only here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A stored question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    /// Unique ID
    pub id: String,

    /// Question text; also the promotion deduplication key
    pub question: String,

    /// Answer text
    pub answer: String,

    /// Category (e.g. "debugging", "python", "general")
    #[serde(default = "default_category")]
    pub category: String,

    /// Lowercase tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Higher priority wins ties on the keyword path
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Approximate popularity signal, only ever incremented
    #[serde(default)]
    pub usage_count: u64,

    #[serde(default = "default_active")]
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

pub fn default_category() -> String {
    "general".into()
}
fn default_priority() -> i32 {
    1
}
fn default_active() -> bool {
    true
}

impl Exemplar {
    /// Lowercased `question + answer`, the text surface used by literal matching.
    pub fn text_lower(&self) -> String {
        format!("{} {}", self.question, self.answer).to_lowercase()
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }
}

/// Fields supplied when creating an exemplar. The store assigns id,
/// usage count and creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExemplar {
    pub question: String,
    pub answer: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewExemplar {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            category: default_category(),
            tags: Vec::new(),
            priority: default_priority(),
            is_active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(|t| t.into().to_lowercase()).collect();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Exercise difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// A gradable practice problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Display name, e.g. "JavaScript"
    pub language: String,
    pub difficulty: Difficulty,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Exercise {
    /// Lowercased `title + description`.
    pub fn text_lower(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// The shared keyword-path ordering: priority desc, usage desc, recency desc.
///
/// Use with `sort_by` to get the canonical fallback order.
pub fn fallback_order(a: &Exemplar, b: &Exemplar) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.usage_count.cmp(&a.usage_count))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// One record of the `exemplars.json` export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedExemplar {
    pub question: String,
    pub answer: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

impl From<&Exemplar> for ExportedExemplar {
    fn from(e: &Exemplar) -> Self {
        let category = if e.category.trim().is_empty() {
            default_category()
        } else {
            e.category.clone()
        };
        Self {
            question: e.question.clone(),
            answer: e.answer.clone(),
            category,
            tags: e.tags.clone(),
            priority: e.priority,
        }
    }
}

/// A point-in-time view of the active corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    pub exemplars: Vec<Exemplar>,
    pub exercises: Vec<Exercise>,
}

impl CorpusSnapshot {
    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty() && self.exercises.is_empty()
    }
}
