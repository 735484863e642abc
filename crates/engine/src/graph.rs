//! Knowledge graph construction and filtering.
//!
//! One node per exemplar, exercise, distinct category and distinct tag,
//! with structural edges to categories and tags and, when the embedding
//! backend is trained, similarity edges between exemplars.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use tutorgraph_config::GraphConfig;
use tutorgraph_core::corpus::{CorpusSnapshot, Difficulty, Exemplar, Exercise};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::graph::{EdgeRelation, GraphEdge, GraphNode, KnowledgeGraph, NodeKind, NodePayload};
use tutorgraph_core::store::KnowledgeStore;
use tutorgraph_embedding::{cosine_similarity, truncate_chars, EmbeddingGateway};

pub const TAG_COLOR: &str = "#9CA3AF";
const DEFAULT_COLOR: &str = "#6B7280";

const EXEMPLAR_CATEGORY_STRENGTH: f64 = 0.5;
const EXERCISE_CATEGORY_STRENGTH: f64 = 0.6;
const EXEMPLAR_TAG_STRENGTH: f64 = 0.3;
const EXERCISE_TAG_STRENGTH: f64 = 0.4;

const LABEL_CHARS: usize = 50;

pub fn category_color(category: &str) -> &'static str {
    match category.to_lowercase().as_str() {
        "debugging" => "#EF4444",
        "react" => "#61DAFB",
        "javascript" => "#F7DF1E",
        "python" => "#3776AB",
        "java" => "#ED8B00",
        "general" => "#6B7280",
        "bughunter" => "#8B5CF6",
        _ => DEFAULT_COLOR,
    }
}

pub fn difficulty_color(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "#22C55E",
        Difficulty::Medium => "#F59E0B",
        Difficulty::Hard => "#EF4444",
    }
}

pub fn exemplar_node_id(id: &str) -> String {
    format!("exemplar:{id}")
}

pub fn exercise_node_id(id: &str) -> String {
    format!("exercise:{id}")
}

fn category_node_id(category: &str) -> String {
    format!("category:{category}")
}

fn tag_node_id(tag: &str) -> String {
    format!("tag:{tag}")
}

/// Lowercased, trimmed tags with blanks and repeats dropped.
fn normalized_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn exemplar_label(question: &str) -> String {
    if question.chars().count() > LABEL_CHARS {
        format!("{}...", truncate_chars(question, LABEL_CHARS))
    } else {
        question.to_string()
    }
}

/// Node and edge accumulator that keeps category and tag nodes unique.
#[derive(Default)]
struct GraphAccumulator {
    graph: KnowledgeGraph,
    seen: HashSet<String>,
}

impl GraphAccumulator {
    fn push_node(&mut self, node: GraphNode) {
        if self.seen.insert(node.id.clone()) {
            self.graph.nodes.push(node);
        }
    }

    fn category(&mut self, category: &str) -> String {
        let id = category_node_id(category);
        if !self.seen.contains(&id) {
            self.push_node(GraphNode {
                id: id.clone(),
                kind: NodeKind::Category,
                label: category.to_string(),
                size: 15.0,
                color: category_color(category).to_string(),
                recommended: false,
                error_related: false,
                data: NodePayload::Category {
                    category: category.to_string(),
                },
            });
        }
        id
    }

    fn tag(&mut self, tag: &str) -> String {
        let id = tag_node_id(tag);
        if !self.seen.contains(&id) {
            self.push_node(GraphNode {
                id: id.clone(),
                kind: NodeKind::Tag,
                label: tag.to_string(),
                size: 10.0,
                color: TAG_COLOR.to_string(),
                recommended: false,
                error_related: false,
                data: NodePayload::Tag { tag: tag.to_string() },
            });
        }
        id
    }

    fn link(&mut self, source: &str, target: &str, relation: EdgeRelation, strength: f64) {
        self.graph.edges.push(GraphEdge::new(source, target, relation, strength));
    }

    fn exemplar(&mut self, e: &Exemplar) {
        let id = exemplar_node_id(&e.id);
        let category = if e.category.is_empty() { "general" } else { e.category.as_str() };
        self.push_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Exemplar,
            label: exemplar_label(&e.question),
            size: (e.usage_count as f64 / 10.0 + 5.0).clamp(5.0, 20.0),
            color: category_color(category).to_string(),
            recommended: false,
            error_related: false,
            data: NodePayload::Exemplar {
                exemplar_id: e.id.clone(),
                question: e.question.clone(),
                answer: e.answer.clone(),
                category: e.category.clone(),
                tags: e.tags.clone(),
                priority: e.priority,
                usage_count: e.usage_count,
            },
        });

        if !e.category.is_empty() {
            let cat = self.category(&e.category);
            self.link(&id, &cat, EdgeRelation::Category, EXEMPLAR_CATEGORY_STRENGTH);
        }
        for tag in normalized_tags(&e.tags) {
            let t = self.tag(&tag);
            self.link(&id, &t, EdgeRelation::Tag, EXEMPLAR_TAG_STRENGTH);
        }
    }

    fn exercise(&mut self, x: &Exercise) {
        let id = exercise_node_id(&x.id);
        self.push_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Exercise,
            label: x.title.clone(),
            size: 12.0,
            color: difficulty_color(x.difficulty).to_string(),
            recommended: false,
            error_related: false,
            data: NodePayload::Exercise {
                exercise_id: x.id.clone(),
                title: x.title.clone(),
                language: x.language.clone(),
                difficulty: x.difficulty,
                category: x.category.clone(),
                tags: x.tags.clone(),
            },
        });

        if !x.category.is_empty() {
            let cat = self.category(&x.category);
            self.link(&id, &cat, EdgeRelation::Category, EXERCISE_CATEGORY_STRENGTH);
        }
        for tag in normalized_tags(&x.tags) {
            let t = self.tag(&tag);
            self.link(&id, &t, EdgeRelation::Tag, EXERCISE_TAG_STRENGTH);
        }
    }
}

pub struct GraphBuilder {
    gateway: EmbeddingGateway,
    threshold: f64,
    neighbors: usize,
}

impl GraphBuilder {
    pub fn new(gateway: EmbeddingGateway, config: &GraphConfig) -> Self {
        Self {
            gateway,
            threshold: config.similarity_threshold,
            neighbors: config.neighbors_per_node,
        }
    }

    /// Build the full graph over a corpus snapshot.
    pub async fn build(&self, corpus: &CorpusSnapshot) -> KnowledgeGraph {
        let mut acc = GraphAccumulator::default();
        for e in &corpus.exemplars {
            acc.exemplar(e);
        }
        for x in &corpus.exercises {
            acc.exercise(x);
        }

        if self.gateway.is_trained() && corpus.exemplars.len() > 1 {
            let similar = self.similarity_edges(&corpus.exemplars).await;
            acc.graph.edges.extend(similar);
        }

        let graph = acc.graph;
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Knowledge graph built"
        );
        graph
    }

    /// Read a fresh snapshot and build. A non-fatal read failure yields an
    /// empty graph; an unreachable store propagates.
    pub async fn build_from_store(&self, store: &dyn KnowledgeStore) -> Result<KnowledgeGraph, StoreError> {
        match store.snapshot().await {
            Ok(snapshot) => Ok(self.build(&snapshot).await),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, store = store.name(), "Corpus read failed, returning empty graph");
                Ok(KnowledgeGraph::default())
            }
        }
    }

    /// Similarity edges between exemplars.
    ///
    /// Each question is embedded at most once, then compared pairwise in
    /// memory. A node links to at most `neighbors` others at or above the
    /// threshold, and each unordered pair yields at most one edge.
    async fn similarity_edges(&self, exemplars: &[Exemplar]) -> Vec<GraphEdge> {
        let mut vectors: HashMap<&str, Vec<f32>> = HashMap::new();
        for e in exemplars {
            if let Some(v) = self.gateway.vector_for_text(&e.question).await {
                vectors.insert(e.id.as_str(), v);
            }
        }
        debug!(embedded = vectors.len(), total = exemplars.len(), "Exemplar vectors computed");

        let mut edges = Vec::new();
        let mut pairs: HashSet<(String, String)> = HashSet::new();

        for source in exemplars {
            let Some(sv) = vectors.get(source.id.as_str()) else {
                continue;
            };

            let mut neighbors: Vec<(&Exemplar, f64)> = exemplars
                .iter()
                .filter(|t| t.id != source.id)
                .filter_map(|t| {
                    let tv = vectors.get(t.id.as_str())?;
                    let sim = cosine_similarity(sv, tv);
                    (sim >= self.threshold).then_some((t, sim))
                })
                .collect();
            neighbors.sort_by(|a, b| b.1.total_cmp(&a.1));
            neighbors.truncate(self.neighbors);

            for (target, sim) in neighbors {
                let a = exemplar_node_id(&source.id);
                let b = exemplar_node_id(&target.id);
                let key = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
                if !pairs.insert(key.clone()) {
                    continue;
                }
                let mut edge = GraphEdge::new(a, b, EdgeRelation::Similar, sim);
                edge.id = format!("similar:{}|{}", key.0, key.1);
                edge.distance = Some(1.0 - edge.strength);
                edges.push(edge);
            }
        }
        edges
    }
}

/// Sub-view selection. Empty dimensions are inactive.
#[derive(Debug, Clone, Default)]
pub struct GraphFilter {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub search: Option<String>,
}

impl GraphFilter {
    pub fn is_active(&self) -> bool {
        !self.categories.is_empty()
            || !self.tags.is_empty()
            || self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    fn keeps(&self, node: &GraphNode) -> bool {
        if !self.categories.is_empty() {
            let category = match (&node.kind, &node.data) {
                (NodeKind::Category, NodePayload::Category { category }) => Some(category.as_str()),
                (NodeKind::Exemplar | NodeKind::Exercise, data) => data.category(),
                _ => None,
            };
            if !category.is_some_and(|c| contains_ci(&self.categories, c)) {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let hit = match (&node.kind, &node.data) {
                (NodeKind::Tag, NodePayload::Tag { tag }) => contains_ci(&self.tags, tag),
                (NodeKind::Exemplar | NodeKind::Exercise, data) => {
                    data.tags().iter().any(|t| contains_ci(&self.tags, t))
                }
                _ => false,
            };
            if !hit {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let in_label = node.label.to_lowercase().contains(&needle);
            let in_text = match &node.data {
                NodePayload::Exemplar { question, answer, .. } => {
                    question.to_lowercase().contains(&needle) || answer.to_lowercase().contains(&needle)
                }
                _ => false,
            };
            if !in_label && !in_text {
                return false;
            }
        }

        true
    }
}

fn contains_ci(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|h| h.eq_ignore_ascii_case(needle))
}

/// Keep nodes matching every active filter dimension and edges whose
/// endpoints both survive. An inactive filter returns the graph unchanged.
pub fn filter_graph(graph: KnowledgeGraph, filter: &GraphFilter) -> KnowledgeGraph {
    if !filter.is_active() {
        return graph;
    }

    let nodes: Vec<GraphNode> = graph.nodes.into_iter().filter(|n| filter.keeps(n)).collect();
    let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges = graph
        .edges
        .into_iter()
        .filter(|e| kept.contains(e.source.as_str()) && kept.contains(e.target.as_str()))
        .collect();

    KnowledgeGraph { nodes, edges }
}
