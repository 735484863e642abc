//! Model trainer: runs the external training program over the token export.
//!
//! Invoked as `<program> <args...> --data <tokens.json> --output <model>`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};
use tutorgraph_config::AppConfig;
use tutorgraph_core::error::SyncError;

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub model_path: PathBuf,
    pub elapsed: Duration,
    /// Trimmed stdout of the trainer
    pub log: String,
}

pub struct Trainer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Trainer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.embedding.trainer_program.clone(),
            config.embedding.trainer_args.clone(),
            Duration::from_millis(config.embedding.trainer_timeout_ms),
        )
    }

    pub async fn train(&self, data: &Path, output: &Path) -> Result<TrainReport, SyncError> {
        if !data.exists() {
            return Err(SyncError::Read {
                path: data.display().to_string(),
                reason: "token export missing; run sync first".into(),
            });
        }

        info!(program = %self.program, data = %data.display(), "Training embedding model");
        let started = Instant::now();

        let run = Command::new(&self.program)
            .args(&self.args)
            .arg("--data")
            .arg(data)
            .arg("--output")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let out = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                SyncError::Trainer(format!("timed out after {}ms", self.timeout.as_millis()))
            })?
            .map_err(|e| SyncError::Trainer(format!("{}: {e}", self.program)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            warn!(status = %out.status, "Trainer failed");
            return Err(SyncError::Trainer(format!("exit {}: {stderr}", out.status)));
        }

        let elapsed = started.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, model = %output.display(), "Model trained");
        Ok(TrainReport {
            model_path: output.to_path_buf(),
            elapsed,
            log: String::from_utf8_lossy(&out.stdout).trim().to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_data_is_a_read_error() {
        let t = Trainer::new("true", vec![], Duration::from_secs(1));
        let err = t
            .train(Path::new("/nonexistent/tokens.json"), Path::new("/tmp/model"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Read { .. }));
    }

    #[tokio::test]
    async fn passes_data_and_output_flags() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("tokens.json");
        std::fs::write(&data, "[]").unwrap();
        let model = dir.path().join("model.bin");

        // $1=--data $2=<data> $3=--output $4=<model>
        let t = Trainer::new(
            "sh",
            vec!["-c".into(), "echo trained > \"$4\"; echo ok".into(), "sh".into()],
            Duration::from_secs(5),
        );
        let report = t.train(&data, &model).await.unwrap();
        assert!(model.exists());
        assert_eq!(report.log, "ok");
    }

    #[tokio::test]
    async fn slow_trainer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("tokens.json");
        std::fs::write(&data, "[]").unwrap();

        let t = Trainer::new(
            "sh",
            vec!["-c".into(), "sleep 5".into(), "sh".into()],
            Duration::from_millis(100),
        );
        let err = t.train(&data, &dir.path().join("m")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
