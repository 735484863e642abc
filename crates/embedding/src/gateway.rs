//! Embedding gateway: the only out-of-process call on the retrieval path.
//!
//! Hands every call a hard wall-clock timeout, enforced by the backend on
//! the call's own exchange with the worker. Every failure mode (untrained
//! model, spawn failure, non-zero exit, malformed output, timeout) collapses
//! to `None`, which sends callers to the keyword path. There are no retries
//! and no caching; the caller's own deadline bounds any queueing.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tutorgraph_config::AppConfig;
use tutorgraph_core::embedding::Embedder;
use tutorgraph_core::error::EmbeddingError;

use crate::disabled::DisabledEmbedder;
use crate::process::ProcessEmbedder;
use crate::sidecar::SidecarEmbedder;
use crate::tokenize::normalize_tokens;

#[derive(Clone)]
pub struct EmbeddingGateway {
    backend: Arc<dyn Embedder>,
    timeout: Duration,
}

impl EmbeddingGateway {
    pub fn new(backend: Arc<dyn Embedder>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// A gateway that never produces vectors.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledEmbedder), Duration::from_secs(5))
    }

    /// Build the configured backend.
    pub fn from_config(config: &AppConfig) -> Self {
        let embedding = &config.embedding;
        let model = config.model_path();
        let backend: Arc<dyn Embedder> = match embedding.backend.as_str() {
            "sidecar" => Arc::new(SidecarEmbedder::new(
                embedding.program.clone(),
                embedding.args.clone(),
                model,
            )),
            "process" => Arc::new(ProcessEmbedder::new(
                embedding.program.clone(),
                embedding.args.clone(),
                model,
            )),
            _ => Arc::new(DisabledEmbedder),
        };
        Self::new(backend, embedding.timeout())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_trained(&self) -> bool {
        self.backend.is_trained()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Vector for already-normalized tokens, or `None` on any failure.
    pub async fn vector(&self, tokens: &[String]) -> Option<Vec<f32>> {
        if !self.backend.is_trained() {
            debug!(backend = self.backend.name(), "Embedding model not trained, skipping call");
            return None;
        }
        if tokens.is_empty() {
            return None;
        }

        match self.backend.embed(tokens, self.timeout).await {
            Ok(vector) => Some(vector),
            Err(EmbeddingError::Timeout { timeout_ms }) => {
                warn!(backend = self.backend.name(), timeout_ms, "Embedding timed out");
                None
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Embedding failed");
                None
            }
        }
    }

    /// Normalize `text` and embed it.
    pub async fn vector_for_text(&self, text: &str) -> Option<Vec<f32>> {
        let tokens = normalize_tokens(text);
        self.vector(&tokens).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedEmbedder;

    #[tokio::test]
    async fn untrained_backend_is_never_called() {
        let scripted = Arc::new(ScriptedEmbedder::untrained());
        let gw = EmbeddingGateway::new(scripted.clone(), Duration::from_secs(1));
        assert!(gw.vector(&["rust".into()]).await.is_none());
        assert_eq!(scripted.calls(), 0);
    }

    #[tokio::test]
    async fn empty_tokens_skip_the_call() {
        let scripted = Arc::new(ScriptedEmbedder::new().with("rust", vec![1.0]));
        let gw = EmbeddingGateway::new(scripted.clone(), Duration::from_secs(1));
        assert!(gw.vector(&[]).await.is_none());
        assert!(gw.vector_for_text("? !").await.is_none());
        assert_eq!(scripted.calls(), 0);
    }

    #[tokio::test]
    async fn returns_backend_vector() {
        let scripted = Arc::new(ScriptedEmbedder::new().with("rust", vec![1.0, 0.0]));
        let gw = EmbeddingGateway::new(scripted, Duration::from_secs(1));
        assert_eq!(gw.vector_for_text("Rust").await, Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn backend_error_is_none() {
        let scripted = Arc::new(ScriptedEmbedder::new());
        let gw = EmbeddingGateway::new(scripted, Duration::from_secs(1));
        assert!(gw.vector(&["unknown".into()]).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let scripted = Arc::new(
            ScriptedEmbedder::new()
                .with("slow", vec![1.0])
                .with_delay(Duration::from_secs(10)),
        );
        let gw = EmbeddingGateway::new(scripted.clone(), Duration::from_millis(100));
        assert!(gw.vector(&["slow".into()]).await.is_none());
        assert_eq!(scripted.timeouts(), 1);
    }

    #[test]
    fn none_backend_from_config_is_untrained() {
        let mut config = AppConfig::default();
        config.embedding.backend = "none".into();
        let gw = EmbeddingGateway::from_config(&config);
        assert_eq!(gw.backend_name(), "disabled");
        assert!(!gw.is_trained());
    }
}
