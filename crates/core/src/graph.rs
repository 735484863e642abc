//! Knowledge graph types: typed nodes and weighted edges over the corpus.
//!
//! Graphs are rebuilt from a fresh snapshot on every request and are never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::corpus::Difficulty;

/// Kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Exemplar,
    Exercise,
    Category,
    Tag,
    Error,
    Concept,
}

/// Relation carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    Category,
    Tag,
    Similar,
    ErrorRelated,
}

/// Kind-specific node data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodePayload {
    Exemplar {
        exemplar_id: String,
        question: String,
        answer: String,
        category: String,
        tags: Vec<String>,
        priority: i32,
        usage_count: u64,
    },
    Exercise {
        exercise_id: String,
        title: String,
        language: String,
        difficulty: Difficulty,
        category: String,
        tags: Vec<String>,
    },
    Error {
        error_type: String,
        count: usize,
    },
    Category {
        category: String,
    },
    Tag {
        tag: String,
    },
}

impl NodePayload {
    /// Category carried by exemplar and exercise payloads.
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Exemplar { category, .. } | Self::Exercise { category, .. } => {
                Some(category.as_str())
            }
            _ => None,
        }
    }

    /// Tags carried by exemplar and exercise payloads.
    pub fn tags(&self) -> &[String] {
        match self {
            Self::Exemplar { tags, .. } | Self::Exercise { tags, .. } => tags,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub size: f64,
    /// Display color as a hex string
    pub color: String,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub error_related: bool,
    pub data: NodePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relation: EdgeRelation,
    /// Always within `[0, 1]`
    pub strength: f64,
    /// `1 - strength`, similarity edges only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: EdgeRelation,
        strength: f64,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("link:{source}->{target}"),
            source,
            target,
            relation,
            strength: strength.clamp(0.0, 1.0),
            distance: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_of(&self, relation: EdgeRelation) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.relation == relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_strength_is_clamped() {
        let e = GraphEdge::new("a", "b", EdgeRelation::Tag, 1.7);
        assert_eq!(e.strength, 1.0);
        let e = GraphEdge::new("a", "b", EdgeRelation::Tag, -0.2);
        assert_eq!(e.strength, 0.0);
    }

    #[test]
    fn empty_graph_serializes_to_empty_arrays() {
        let json = serde_json::to_value(KnowledgeGraph::default()).unwrap();
        assert_eq!(json, serde_json::json!({"nodes": [], "edges": []}));
    }

    #[test]
    fn node_kind_serializes_as_type() {
        let node = GraphNode {
            id: "tag:python".into(),
            kind: NodeKind::Tag,
            label: "python".into(),
            size: 10.0,
            color: "#9CA3AF".into(),
            recommended: false,
            error_related: false,
            data: NodePayload::Tag { tag: "python".into() },
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "tag");
        assert_eq!(json["data"]["tag"], "python");
    }
}
