//! Disabled embedder: no model configured, retrieval stays on the keyword path.

use async_trait::async_trait;
use std::time::Duration;
use tutorgraph_core::embedding::Embedder;
use tutorgraph_core::error::EmbeddingError;

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_trained(&self) -> bool {
        false
    }

    async fn embed(&self, _tokens: &[String], _timeout: Duration) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::NotTrained("embedding backend disabled".into()))
    }
}
