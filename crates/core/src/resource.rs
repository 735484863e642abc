//! Learning resources: external reading suggested next to remediation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::history::ExperienceLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Article,
    Video,
    Exercise,
    Doc,
}

/// A curated link to learning material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningResource {
    pub id: String,
    pub title: String,
    pub url: String,
    pub kind: ResourceKind,
    /// Lowercase language name, e.g. "python"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default = "default_level")]
    pub level: ExperienceLevel,
    #[serde(default)]
    pub error_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_quality")]
    pub quality_score: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_level() -> ExperienceLevel {
    ExperienceLevel::Beginner
}
fn default_quality() -> f64 {
    1.0
}
fn default_active() -> bool {
    true
}

/// Lookup parameters for the resource matcher.
#[derive(Debug, Clone)]
pub struct ResourceQuery {
    pub error_types: Vec<String>,
    pub languages: Vec<String>,
    pub tags: Vec<String>,
    pub level: ExperienceLevel,
    pub limit: usize,
}

impl Default for ResourceQuery {
    fn default() -> Self {
        Self {
            error_types: Vec::new(),
            languages: Vec::new(),
            tags: Vec::new(),
            level: ExperienceLevel::Beginner,
            limit: 6,
        }
    }
}

/// Suggests learning resources for a user's error profile.
#[async_trait]
pub trait ResourceMatcher: Send + Sync {
    async fn suggest(&self, query: &ResourceQuery) -> Result<Vec<LearningResource>, StoreError>;
}
