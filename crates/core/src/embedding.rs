//! Embedder trait: text-to-vector conversion backed by an external worker.
//!
//! Implementations live in `tutorgraph-embedding`. Callers never treat an
//! embedding failure as fatal; it only switches retrieval to the keyword path.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EmbeddingError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend name (e.g. "sidecar", "process", "disabled").
    fn name(&self) -> &str;

    /// Whether a trained model is available. Untrained backends are never called.
    fn is_trained(&self) -> bool;

    /// Convert normalized tokens into one vector.
    ///
    /// `timeout` bounds this call's own exchange with the worker. Time spent
    /// waiting for a worker that is busy with another call is not counted,
    /// and a timeout only tears down the exchange that overran.
    async fn embed(&self, tokens: &[String], timeout: Duration) -> Result<Vec<f32>, EmbeddingError>;
}
