//! The retrieval engine: everything between a learner's utterance and the
//! context handed to the text generator.
//!
//! For each utterance the engine:
//!
//! 1. **Extracts** concepts, languages, error types, topics, intent and difficulty
//! 2. **Ranks** exemplars by vector similarity, or keyword overlap when no vector is available
//! 3. **Matches** exercises and error remediation where the intent calls for them
//! 4. **Renders** a deterministic instruction preamble
//!
//! Off the hot path it builds the knowledge graph, augments it with a
//! learner's error profile, promotes well-rated turns to exemplars and keeps
//! the on-disk corpus export in step with the store.

pub mod context;
pub mod exercises;
pub mod graph;
pub mod keywords;
pub mod promotion;
pub mod ranker;
pub mod recommender;
pub mod resources;
pub mod service;
pub mod sync;
pub mod token;

pub use context::{AssembledContext, ContextAssembler, ContextMetadata, ResponseContext, render_preamble};
pub use exercises::match_exercises;
pub use graph::{GraphBuilder, GraphFilter, filter_graph};
pub use keywords::extract_keywords;
pub use promotion::{PromotionOutcome, Promoter, RatedTurn, Rating, draft_exemplar};
pub use ranker::{RankPath, ScoredExemplar, SimilarityRanker, keyword_fallback};
pub use recommender::{ErrorGraph, ErrorRecommender, ErrorSummary, HistoryProfile, Recommendations};
pub use resources::CatalogResourceMatcher;
pub use service::TutorEngine;
pub use sync::{CorpusSync, SyncReport};
pub use token::estimate_tokens;
