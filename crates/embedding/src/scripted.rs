//! Scripted embedder: a fixed token-to-vector table.
//!
//! The vector of a token list is the element-wise sum of the vectors of its
//! known tokens; a list with no known token is an error. Used as a test
//! double and for offline demos.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tutorgraph_core::embedding::Embedder;
use tutorgraph_core::error::EmbeddingError;

pub struct ScriptedEmbedder {
    table: HashMap<String, Vec<f32>>,
    trained: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    timeouts: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            trained: true,
            delay: None,
            calls: AtomicUsize::new(0),
            timeouts: AtomicUsize::new(0),
        }
    }

    /// A backend that reports no trained model.
    pub fn untrained() -> Self {
        Self {
            trained: false,
            ..Self::new()
        }
    }

    pub fn with(mut self, token: &str, vector: Vec<f32>) -> Self {
        self.table.insert(token.to_lowercase(), vector);
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls whose delay overran their timeout.
    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    async fn embed(&self, tokens: &[String], timeout: Duration) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                self.timeouts.fetch_add(1, Ordering::SeqCst);
                return Err(EmbeddingError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(delay).await;
        }

        let mut sum: Option<Vec<f32>> = None;
        for v in tokens.iter().filter_map(|t| self.table.get(t)) {
            match sum.as_mut() {
                Some(acc) if acc.len() == v.len() => {
                    acc.iter_mut().zip(v).for_each(|(a, b)| *a += b);
                }
                Some(_) => {
                    return Err(EmbeddingError::MalformedOutput("dimension mismatch".into()));
                }
                None => sum = Some(v.clone()),
            }
        }
        sum.ok_or_else(|| EmbeddingError::Rejected("no known tokens".into()))
    }
}
