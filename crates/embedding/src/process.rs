//! Per-call process embedder.
//!
//! Spawns `<program> <args...> --model <path> --words <json>` for every
//! request and reads one JSON float array from stdout. Every call owns its
//! child, which is killed when the call times out or is dropped.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use tutorgraph_core::embedding::Embedder;
use tutorgraph_core::error::EmbeddingError;

pub struct ProcessEmbedder {
    program: String,
    args: Vec<String>,
    model_path: PathBuf,
}

impl ProcessEmbedder {
    pub fn new(program: impl Into<String>, args: Vec<String>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            model_path: model_path.into(),
        }
    }
}

/// Parse a worker's stdout into a vector.
pub(crate) fn parse_vector(stdout: &str) -> Result<Vec<f32>, EmbeddingError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(EmbeddingError::MalformedOutput("empty output".into()));
    }
    if !trimmed.starts_with('[') {
        return Err(EmbeddingError::MalformedOutput(format!(
            "expected a JSON array, got '{}'",
            trimmed.chars().take(80).collect::<String>()
        )));
    }
    let vector: Vec<f32> = serde_json::from_str(trimmed)
        .map_err(|e| EmbeddingError::MalformedOutput(e.to_string()))?;
    if vector.is_empty() {
        return Err(EmbeddingError::MalformedOutput("empty vector".into()));
    }
    Ok(vector)
}

#[async_trait]
impl Embedder for ProcessEmbedder {
    fn name(&self) -> &str {
        "process"
    }

    fn is_trained(&self) -> bool {
        self.model_path.exists()
    }

    async fn embed(&self, tokens: &[String], timeout: Duration) -> Result<Vec<f32>, EmbeddingError> {
        let words = serde_json::to_string(tokens)
            .map_err(|e| EmbeddingError::Io(format!("encode tokens: {e}")))?;

        debug!(program = %self.program, tokens = tokens.len(), "Spawning embedding process");

        let run = Command::new(&self.program)
            .args(&self.args)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--words")
            .arg(&words)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| EmbeddingError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| EmbeddingError::Spawn(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(EmbeddingError::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_vector(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_non_arrays() {
        assert!(matches!(
            parse_vector("Traceback (most recent call last)"),
            Err(EmbeddingError::MalformedOutput(_))
        ));
        assert!(matches!(parse_vector("  "), Err(EmbeddingError::MalformedOutput(_))));
        assert!(matches!(parse_vector("[]"), Err(EmbeddingError::MalformedOutput(_))));
        assert_eq!(parse_vector("[0.5, -1.0]\n").unwrap(), vec![0.5, -1.0]);
    }

    #[test]
    fn missing_model_is_untrained() {
        let e = ProcessEmbedder::new("true", vec![], "/nonexistent/model.bin");
        assert!(!e.is_trained());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_vector_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.bin");
        std::fs::write(&model, b"model").unwrap();

        let e = ProcessEmbedder::new(
            "sh",
            vec!["-c".into(), "echo '[0.25, 0.75]'".into(), "sh".into()],
            &model,
        );
        assert!(e.is_trained());
        let v = e.embed(&["hello".into()], Duration::from_secs(5)).await.unwrap();
        assert_eq!(v, vec![0.25, 0.75]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let e = ProcessEmbedder::new(
            "sh",
            vec!["-c".into(), "echo boom >&2; exit 3".into(), "sh".into()],
            "/tmp",
        );
        match e.embed(&["x".into()], Duration::from_secs(5)).await {
            Err(EmbeddingError::ExitStatus { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected ExitStatus, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let e = ProcessEmbedder::new(
            "sh",
            vec!["-c".into(), "sleep 5; echo '[1.0]'".into(), "sh".into()],
            "/tmp",
        );
        assert!(matches!(
            e.embed(&["x".into()], Duration::from_millis(100)).await,
            Err(EmbeddingError::Timeout { timeout_ms: 100 })
        ));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let e = ProcessEmbedder::new("/nonexistent/embedder", vec![], "/tmp");
        assert!(matches!(
            e.embed(&["x".into()], Duration::from_secs(5)).await,
            Err(EmbeddingError::Spawn(_))
        ));
    }
}
