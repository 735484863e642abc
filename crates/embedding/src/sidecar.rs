//! Persistent sidecar embedder.
//!
//! One long-lived worker started as `<program> <args...> --model <path> --serve`
//! and spoken to in newline-delimited JSON:
//!
//! ```text
//! -> {"id": 7, "tokens": ["closure", "rust"]}
//! <- {"id": 7, "vector": [0.12, -0.4, ...]}
//! <- {"id": 7, "error": "model not loaded"}
//! ```
//!
//! Calls take turns on the worker. A call's timeout starts once it holds the
//! worker, so queued callers never kill an exchange they are not part of.
//! An exchange that overruns kills the worker; the next call respawns it.
//! Responses for any other id are stale (left over from a dropped call) and
//! are discarded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tutorgraph_core::embedding::Embedder;
use tutorgraph_core::error::EmbeddingError;

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    tokens: &'a [String],
}

#[derive(Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

pub struct SidecarEmbedder {
    program: String,
    args: Vec<String>,
    model_path: PathBuf,
    worker: Mutex<Option<Worker>>,
    next_id: AtomicU64,
}

impl SidecarEmbedder {
    pub fn new(program: impl Into<String>, args: Vec<String>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            model_path: model_path.into(),
            worker: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn spawn(&self) -> Result<Worker, EmbeddingError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--serve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EmbeddingError::Spawn(format!("{}: {e}", self.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EmbeddingError::Spawn("worker stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EmbeddingError::Spawn("worker stdout not captured".into()))?;

        info!(program = %self.program, pid = ?child.id(), "Embedding sidecar started");
        Ok(Worker {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn exchange(worker: &mut Worker, id: u64, tokens: &[String]) -> Result<Vec<f32>, EmbeddingError> {
        let mut line = serde_json::to_string(&Request { id, tokens })
            .map_err(|e| EmbeddingError::Io(format!("encode request: {e}")))?;
        line.push('\n');

        worker
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EmbeddingError::Io(format!("write request: {e}")))?;
        worker
            .stdin
            .flush()
            .await
            .map_err(|e| EmbeddingError::Io(format!("flush request: {e}")))?;

        loop {
            let Some(reply) = worker
                .stdout
                .next_line()
                .await
                .map_err(|e| EmbeddingError::Io(format!("read response: {e}")))?
            else {
                return Err(EmbeddingError::Io("worker closed stdout".into()));
            };

            if reply.trim().is_empty() {
                continue;
            }

            let response: Response = serde_json::from_str(&reply)
                .map_err(|e| EmbeddingError::MalformedOutput(format!("{e}: {reply}")))?;

            if response.id != id {
                debug!(expected = id, got = response.id, "Discarding stale sidecar response");
                continue;
            }

            return match (response.vector, response.error) {
                (_, Some(error)) => Err(EmbeddingError::Rejected(error)),
                (Some(v), None) if !v.is_empty() => Ok(v),
                _ => Err(EmbeddingError::MalformedOutput("response without vector".into())),
            };
        }
    }
}

#[async_trait]
impl Embedder for SidecarEmbedder {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn is_trained(&self) -> bool {
        self.model_path.exists()
    }

    async fn embed(&self, tokens: &[String], timeout: Duration) -> Result<Vec<f32>, EmbeddingError> {
        let mut guard = self.worker.lock().await;
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(worker) = guard.as_mut() else {
            return Err(EmbeddingError::Spawn("worker missing after spawn".into()));
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let result = match tokio::time::timeout(timeout, Self::exchange(worker, id, tokens)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        // A lost or stalled worker is replaced on the next call
        if let Err(e @ (EmbeddingError::Io(_) | EmbeddingError::Timeout { .. })) = &result {
            if let Some(mut dead) = guard.take() {
                warn!(pid = ?dead.child.id(), id, error = %e, "Dropping embedding sidecar");
                let _ = dead.child.kill().await;
            }
        }
        result
    }
}
