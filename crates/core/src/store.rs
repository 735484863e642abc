//! Store traits: the knowledge corpus and the submission history.
//!
//! The retrieval engine only ever writes usage counters and promoted
//! exemplars. Everything else is curated elsewhere.

use async_trait::async_trait;

use crate::corpus::{CorpusSnapshot, Exemplar, Exercise, NewExemplar};
use crate::error::StoreError;
use crate::history::Attempt;

/// Exemplar and exercise storage.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Backend name, for logs and `doctor` output.
    fn name(&self) -> &str;

    /// Every active exemplar, in insertion order.
    async fn active_exemplars(&self) -> Result<Vec<Exemplar>, StoreError>;

    /// Every active exercise, in insertion order.
    async fn active_exercises(&self) -> Result<Vec<Exercise>, StoreError>;

    /// Increment the usage counter of each listed exemplar once.
    ///
    /// Unknown ids are ignored. Concurrent increments may be lost.
    async fn increment_usage(&self, ids: &[String]) -> Result<(), StoreError>;

    /// Look up an exemplar (active or not) by exact question text.
    async fn find_by_question(&self, question: &str) -> Result<Option<Exemplar>, StoreError>;

    async fn insert_exemplar(&self, exemplar: NewExemplar) -> Result<Exemplar, StoreError>;

    async fn update_exemplar(&self, exemplar: Exemplar) -> Result<Exemplar, StoreError>;

    async fn delete_exemplar(&self, id: &str) -> Result<bool, StoreError>;

    /// Insert many exemplars; returns how many were created.
    async fn import_exemplars(&self, exemplars: Vec<NewExemplar>) -> Result<usize, StoreError>;

    /// Number of active exemplars.
    async fn count_active(&self) -> Result<usize, StoreError> {
        Ok(self.active_exemplars().await?.len())
    }

    /// Read the active corpus in one go.
    async fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        Ok(CorpusSnapshot {
            exemplars: self.active_exemplars().await?,
            exercises: self.active_exercises().await?,
        })
    }

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<bool, StoreError> {
        self.count_active().await.map(|_| true)
    }
}

/// Read-only submission history.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// The `limit` most recent attempts by `user_id`, newest first,
    /// optionally scoped to one exercise.
    async fn recent_attempts(
        &self,
        user_id: &str,
        exercise_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Attempt>, StoreError>;
}
