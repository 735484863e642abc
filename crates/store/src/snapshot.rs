//! Read-only store over an exported `exemplars.json`.
//!
//! Lets the engine run against the last corpus export when the primary
//! database is not configured. Usage increments are accepted and kept in
//! memory only; every other write is rejected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use tutorgraph_core::corpus::{Exemplar, Exercise, ExportedExemplar, NewExemplar};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::store::KnowledgeStore;

pub struct SnapshotStore {
    path: PathBuf,
    exemplars: Vec<Exemplar>,
    usage: Vec<AtomicU64>,
}

impl SnapshotStore {
    /// Load the export at `path`. A missing or unreadable file makes the
    /// store unavailable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            StoreError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let records: Vec<ExportedExemplar> = serde_json::from_str(&content).map_err(|e| {
            StoreError::QueryFailed(format!("malformed {}: {e}", path.display()))
        })?;

        let created_at: DateTime<Utc> = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let exemplars: Vec<Exemplar> = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| Exemplar {
                id: format!("snapshot-{i}"),
                question: r.question,
                answer: r.answer,
                category: r.category,
                tags: r.tags,
                priority: r.priority,
                usage_count: 0,
                is_active: true,
                created_at,
            })
            .collect();

        debug!(path = %path.display(), count = exemplars.len(), "Snapshot store loaded");
        let usage = exemplars.iter().map(|_| AtomicU64::new(0)).collect();
        Ok(Self {
            path,
            exemplars,
            usage,
        })
    }

    fn read_only(&self) -> StoreError {
        StoreError::Conflict(format!("{} is a read-only snapshot", self.path.display()))
    }
}

#[async_trait]
impl KnowledgeStore for SnapshotStore {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn active_exemplars(&self) -> Result<Vec<Exemplar>, StoreError> {
        Ok(self
            .exemplars
            .iter()
            .zip(&self.usage)
            .map(|(e, u)| Exemplar {
                usage_count: u.load(Ordering::Relaxed),
                ..e.clone()
            })
            .collect())
    }

    async fn active_exercises(&self) -> Result<Vec<Exercise>, StoreError> {
        Ok(Vec::new())
    }

    async fn increment_usage(&self, ids: &[String]) -> Result<(), StoreError> {
        for (e, u) in self.exemplars.iter().zip(&self.usage) {
            if ids.contains(&e.id) {
                u.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn find_by_question(&self, question: &str) -> Result<Option<Exemplar>, StoreError> {
        Ok(self.exemplars.iter().find(|e| e.question == question).cloned())
    }

    async fn insert_exemplar(&self, _exemplar: NewExemplar) -> Result<Exemplar, StoreError> {
        Err(self.read_only())
    }

    async fn update_exemplar(&self, _exemplar: Exemplar) -> Result<Exemplar, StoreError> {
        Err(self.read_only())
    }

    async fn delete_exemplar(&self, _id: &str) -> Result<bool, StoreError> {
        Err(self.read_only())
    }

    async fn import_exemplars(&self, _exemplars: Vec<NewExemplar>) -> Result<usize, StoreError> {
        Err(self.read_only())
    }
}
