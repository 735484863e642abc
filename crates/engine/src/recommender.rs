//! Error-pattern recommender.
//!
//! Mines a user's recent attempts for error frequencies and the
//! categories/tags/languages they have been working on, then highlights the
//! relevant part of the knowledge graph and proposes remediation content.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tutorgraph_config::RecommenderConfig;
use tutorgraph_core::corpus::{CorpusSnapshot, Exemplar, Exercise};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::graph::{EdgeRelation, GraphEdge, GraphNode, KnowledgeGraph, NodeKind, NodePayload};
use tutorgraph_core::history::{Attempt, ErrorEvent, ExperienceLevel, SubmissionStatus};
use tutorgraph_core::resource::{LearningResource, ResourceMatcher, ResourceQuery};
use tutorgraph_core::store::SubmissionStore;

use crate::graph::exercise_node_id;

const ERROR_COLOR: &str = "#EF4444";
const ERROR_EDGE_STRENGTH: f64 = 0.8;
const RECENT_ERRORS: usize = 5;
const GAP_ERROR_TYPES: usize = 3;
const GAP_CATEGORIES: usize = 2;
const GAP_TAGS: usize = 3;

/// What a user's recent attempts say about them.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryProfile {
    /// Error type → occurrences across non-accepted attempts
    pub error_types: BTreeMap<String, usize>,
    /// Distinct lowercased error messages, first-seen order
    pub error_messages: Vec<String>,
    /// Touched categories, first-seen order
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Lowercased languages
    pub languages: Vec<String>,
    pub exercise_ids: HashSet<String>,
    pub accepted: usize,
    pub experience: ExperienceLevel,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl HistoryProfile {
    pub fn analyze(attempts: &[Attempt], config: &RecommenderConfig) -> Self {
        let mut error_types = BTreeMap::new();
        let mut error_messages = Vec::new();
        let mut categories = Vec::new();
        let mut tags = Vec::new();
        let mut languages = Vec::new();
        let mut exercise_ids = HashSet::new();
        let mut accepted = 0;

        for attempt in attempts {
            if attempt.status.is_accepted() {
                accepted += 1;
            } else {
                for error in &attempt.errors {
                    *error_types.entry(error.error_type.clone()).or_insert(0) += 1;
                    push_unique(&mut error_messages, &error.error_message.to_lowercase());
                }
            }

            if let Some(exercise) = &attempt.exercise {
                push_unique(&mut categories, &exercise.category);
                for tag in &exercise.tags {
                    push_unique(&mut tags, tag);
                }
                push_unique(&mut languages, &exercise.language.to_lowercase());
                exercise_ids.insert(exercise.id.clone());
            }
        }

        Self {
            error_types,
            error_messages,
            categories,
            tags,
            languages,
            exercise_ids,
            accepted,
            experience: ExperienceLevel::classify(
                accepted,
                config.intermediate_threshold,
                config.advanced_threshold,
            ),
        }
    }

    /// Whether an item with this category and tags overlaps the touched set.
    pub fn touches(&self, category: &str, tags: &[String]) -> bool {
        self.categories.iter().any(|c| c == category) || tags.iter().any(|t| self.tags.contains(t))
    }

    /// Most frequent error types first; ties in name order.
    pub fn ranked_error_types(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> =
            self.error_types.iter().map(|(t, c)| (t.as_str(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    pub fn knowledge_gaps(&self) -> Vec<String> {
        let mut gaps: Vec<String> = self
            .ranked_error_types()
            .into_iter()
            .take(GAP_ERROR_TYPES)
            .map(|(t, c)| format!("Gap in handling {t} errors (seen {c} times)"))
            .collect();
        gaps.extend(
            self.categories
                .iter()
                .take(GAP_CATEGORIES)
                .map(|c| format!("Review the {c} topic")),
        );
        gaps.extend(
            self.tags
                .iter()
                .take(GAP_TAGS)
                .map(|t| format!("Practice more {t} exercises")),
        );
        gaps
    }
}

/// A non-accepted attempt as shown in the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_id: Option<String>,
    pub exercise_title: String,
    pub status: SubmissionStatus,
    pub errors: Vec<ErrorEvent>,
    pub submitted_at: DateTime<Utc>,
}

impl From<&Attempt> for RecentError {
    fn from(a: &Attempt) -> Self {
        Self {
            exercise_id: a.exercise.as_ref().map(|e| e.id.clone()),
            exercise_title: a
                .exercise
                .as_ref()
                .map(|e| e.title.clone())
                .unwrap_or_else(|| "Unknown".into()),
            status: a.status,
            errors: a.errors.clone(),
            submitted_at: a.submitted_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub error_types: BTreeMap<String, usize>,
    pub recent_errors: Vec<RecentError>,
    /// Distinct recent error messages
    #[serde(default)]
    pub error_messages: Vec<String>,
    pub recommended_topics: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recommendations {
    pub exemplars: Vec<Exemplar>,
    pub exercises: Vec<Exercise>,
}

/// The error-augmented graph with everything derived from the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorGraph {
    #[serde(flatten)]
    pub graph: KnowledgeGraph,
    pub error_summary: ErrorSummary,
    pub recommendations: Recommendations,
    pub learning_resources: Vec<LearningResource>,
    pub knowledge_gaps: Vec<String>,
    pub experience: ExperienceLevel,
}

/// Add error nodes and flag related nodes.
///
/// `error_related` marks exemplars mentioning one of the error types and the
/// exercises the user attempted (which also grow by 5). `recommended` marks
/// exemplars and exercises overlapping the touched categories/tags. The two
/// flags are set independently.
pub fn augment_graph(mut graph: KnowledgeGraph, profile: &HistoryProfile) -> KnowledgeGraph {
    let attempted: HashSet<String> = profile.exercise_ids.iter().map(|id| exercise_node_id(id)).collect();
    let error_types: Vec<(String, String)> = profile
        .error_types
        .keys()
        .map(|t| (t.clone(), t.to_lowercase()))
        .collect();
    let mut error_edges = Vec::new();

    for node in &mut graph.nodes {
        match node.kind {
            NodeKind::Exemplar => {
                if let NodePayload::Exemplar { question, answer, .. } = &node.data {
                    let question = question.to_lowercase();
                    let answer = answer.to_lowercase();
                    for (error_type, needle) in &error_types {
                        if question.contains(needle.as_str()) || answer.contains(needle.as_str()) {
                            node.error_related = true;
                            error_edges.push(GraphEdge::new(
                                error_node_id(error_type),
                                node.id.clone(),
                                EdgeRelation::ErrorRelated,
                                ERROR_EDGE_STRENGTH,
                            ));
                        }
                    }
                }
            }
            NodeKind::Exercise => {
                if attempted.contains(&node.id) {
                    node.error_related = true;
                    node.size += 5.0;
                }
            }
            _ => continue,
        }

        if let Some(category) = node.data.category() {
            if profile.touches(category, node.data.tags()) {
                node.recommended = true;
            }
        }
    }

    graph.nodes.extend(profile.error_types.iter().map(|(t, count)| GraphNode {
        id: error_node_id(t),
        kind: NodeKind::Error,
        label: format!("{t} Error ({count}x)"),
        size: (10.0 + 2.0 * *count as f64).min(20.0),
        color: ERROR_COLOR.to_string(),
        recommended: false,
        error_related: true,
        data: NodePayload::Error {
            error_type: t.clone(),
            count: *count,
        },
    }));
    graph.edges.extend(error_edges);
    graph
}

fn error_node_id(error_type: &str) -> String {
    format!("error:{error_type}")
}

/// Exemplars mentioning the given messages (+2 each) or error types (+3
/// each) in their question or answer, best first. Zero scores are dropped.
pub fn remediation(corpus: &[Exemplar], messages: &[String], error_types: &[String], k: usize) -> Vec<Exemplar> {
    let messages: Vec<String> = messages.iter().map(|m| m.to_lowercase()).collect();
    let error_types: Vec<String> = error_types.iter().map(|t| t.to_lowercase()).collect();

    let mut scored: Vec<(&Exemplar, u32)> = corpus
        .iter()
        .filter_map(|e| {
            let text = e.text_lower();
            let score = messages.iter().filter(|m| text.contains(m.as_str())).count() as u32 * 2
                + error_types.iter().filter(|t| text.contains(t.as_str())).count() as u32 * 3;
            (score > 0).then_some((e, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(k).map(|(e, _)| e.clone()).collect()
}

pub struct ErrorRecommender {
    submissions: Arc<dyn SubmissionStore>,
    resources: Arc<dyn ResourceMatcher>,
    config: RecommenderConfig,
}

impl ErrorRecommender {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        resources: Arc<dyn ResourceMatcher>,
        config: RecommenderConfig,
    ) -> Self {
        Self {
            submissions,
            resources,
            config,
        }
    }

    /// Load the user's recent attempts. Only an unreachable store fails;
    /// other read errors count as an empty history.
    pub async fn history(&self, user_id: &str, exercise_id: Option<&str>) -> Result<Vec<Attempt>, StoreError> {
        match self
            .submissions
            .recent_attempts(user_id, exercise_id, self.config.history_window)
            .await
        {
            Ok(attempts) => Ok(attempts),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(user_id, error = %e, "Submission history unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Augment `graph` (built over `corpus`) with the user's error profile.
    pub async fn error_graph(
        &self,
        graph: KnowledgeGraph,
        corpus: &CorpusSnapshot,
        user_id: &str,
        exercise_id: Option<&str>,
    ) -> Result<ErrorGraph, StoreError> {
        let attempts = self.history(user_id, exercise_id).await?;
        let profile = HistoryProfile::analyze(&attempts, &self.config);
        debug!(
            user_id,
            attempts = attempts.len(),
            error_types = profile.error_types.len(),
            experience = profile.experience.as_str(),
            "History analyzed"
        );

        let band = profile.experience.target_band();
        let exemplars: Vec<Exemplar> = corpus
            .exemplars
            .iter()
            .filter(|e| profile.touches(&e.category, &e.tags))
            .take(self.config.exemplar_limit)
            .cloned()
            .collect();
        let exercises: Vec<Exercise> = corpus
            .exercises
            .iter()
            .filter(|x| band.contains(&x.difficulty) && profile.touches(&x.category, &x.tags))
            .take(self.config.exercise_limit)
            .cloned()
            .collect();

        let query = ResourceQuery {
            error_types: profile.error_types.keys().cloned().collect(),
            languages: profile.languages.clone(),
            tags: profile.tags.clone(),
            level: profile.experience,
            limit: self.config.resource_limit,
        };
        let learning_resources = match self.resources.suggest(&query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Learning resource lookup failed");
                Vec::new()
            }
        };

        let summary = ErrorSummary {
            error_types: profile.error_types.clone(),
            recent_errors: attempts
                .iter()
                .filter(|a| !a.status.is_accepted())
                .take(RECENT_ERRORS)
                .map(RecentError::from)
                .collect(),
            error_messages: profile.error_messages.iter().take(RECENT_ERRORS).cloned().collect(),
            recommended_topics: profile.categories.clone(),
        };

        let graph = augment_graph(graph, &profile);
        info!(
            user_id,
            nodes = graph.nodes.len(),
            recommended_exemplars = exemplars.len(),
            recommended_exercises = exercises.len(),
            "Error graph built"
        );

        Ok(ErrorGraph {
            graph,
            knowledge_gaps: profile.knowledge_gaps(),
            error_summary: summary,
            recommendations: Recommendations { exemplars, exercises },
            learning_resources,
            experience: profile.experience,
        })
    }
}
