//! Embedding backends for tutorgraph.
//!
//! Every backend runs the model out of process. The [`EmbeddingGateway`]
//! enforces the timeout and turns failures into "no vector".

pub mod disabled;
pub mod gateway;
pub mod process;
pub mod scripted;
pub mod sidecar;
pub mod tokenize;
pub mod trainer;
pub mod vector;

pub use disabled::DisabledEmbedder;
pub use gateway::EmbeddingGateway;
pub use process::ProcessEmbedder;
pub use scripted::ScriptedEmbedder;
pub use sidecar::SidecarEmbedder;
pub use tokenize::{normalize_tokens, truncate_chars};
pub use trainer::{TrainReport, Trainer};
pub use vector::cosine_similarity;
