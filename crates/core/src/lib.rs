//! # tutorgraph Core
//!
//! Domain types, traits, and error definitions for the tutorgraph adaptive
//! context retrieval engine. This crate has **no framework dependencies**: it
//! defines the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator (knowledge store, submission history, embedding
//! worker, resource matcher) is a trait here. Implementations live in their
//! respective crates, so tests swap in in-memory stores and scripted embedders.

pub mod corpus;
pub mod embedding;
pub mod error;
pub mod event;
pub mod graph;
pub mod history;
pub mod keywords;
pub mod resource;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use corpus::{
    CorpusSnapshot, Difficulty, Exemplar, Exercise, ExportedExemplar, NewExemplar, fallback_order,
};
pub use embedding::Embedder;
pub use error::{EmbeddingError, Error, Result, StoreError, SyncError};
pub use event::{DomainEvent, EventBus};
pub use graph::{EdgeRelation, GraphEdge, GraphNode, KnowledgeGraph, NodeKind, NodePayload};
pub use history::{Attempt, ErrorEvent, ExperienceLevel, SubmissionStatus};
pub use keywords::{ExtractedKeywords, Intent};
pub use resource::{LearningResource, ResourceKind, ResourceMatcher, ResourceQuery};
pub use store::{KnowledgeStore, SubmissionStore};
