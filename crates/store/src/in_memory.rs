//! In-memory store: useful for testing and ephemeral deployments.
//!
//! Usage counters are relaxed atomics so concurrent retrievals only need a
//! read lock; lost updates under contention are acceptable.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tutorgraph_core::corpus::{Exemplar, Exercise, NewExemplar};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::history::Attempt;
use tutorgraph_core::store::{KnowledgeStore, SubmissionStore};
use uuid::Uuid;

struct Slot {
    exemplar: Exemplar,
    usage: AtomicU64,
}

impl Slot {
    fn new(exemplar: Exemplar) -> Self {
        let usage = AtomicU64::new(exemplar.usage_count);
        Self { exemplar, usage }
    }

    fn read(&self) -> Exemplar {
        let mut e = self.exemplar.clone();
        e.usage_count = self.usage.load(Ordering::Relaxed);
        e
    }
}

/// Keeps exemplars, exercises and attempts in process memory.
pub struct InMemoryStore {
    exemplars: Arc<RwLock<Vec<Slot>>>,
    exercises: Arc<RwLock<Vec<Exercise>>>,
    attempts: Arc<RwLock<Vec<Attempt>>>,
    available: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            exemplars: Arc::new(RwLock::new(Vec::new())),
            exercises: Arc::new(RwLock::new(Vec::new())),
            attempts: Arc::new(RwLock::new(Vec::new())),
            available: AtomicBool::new(true),
        }
    }

    /// Add a fully formed exemplar, keeping its id and timestamps.
    pub async fn put_exemplar(&self, exemplar: Exemplar) {
        self.exemplars.write().await.push(Slot::new(exemplar));
    }

    pub async fn add_exercise(&self, exercise: Exercise) {
        self.exercises.write().await.push(exercise);
    }

    pub async fn add_attempt(&self, attempt: Attempt) {
        self.attempts.write().await.push(attempt);
    }

    /// Every exemplar regardless of `is_active`.
    pub async fn all_exemplars(&self) -> Vec<Exemplar> {
        self.exemplars.read().await.iter().map(Slot::read).collect()
    }

    /// Simulate losing the connection: every call fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked offline".into()))
        }
    }

    fn materialize(new: NewExemplar) -> Exemplar {
        Exemplar {
            id: Uuid::new_v4().to_string(),
            question: new.question,
            answer: new.answer,
            category: new.category,
            tags: new.tags,
            priority: new.priority,
            usage_count: 0,
            is_active: new.is_active,
            created_at: Utc::now(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn active_exemplars(&self) -> Result<Vec<Exemplar>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .exemplars
            .read()
            .await
            .iter()
            .filter(|s| s.exemplar.is_active)
            .map(Slot::read)
            .collect())
    }

    async fn active_exercises(&self) -> Result<Vec<Exercise>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .exercises
            .read()
            .await
            .iter()
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }

    async fn increment_usage(&self, ids: &[String]) -> Result<(), StoreError> {
        self.ensure_available()?;
        let slots = self.exemplars.read().await;
        for slot in slots.iter().filter(|s| ids.contains(&s.exemplar.id)) {
            slot.usage.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn find_by_question(&self, question: &str) -> Result<Option<Exemplar>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .exemplars
            .read()
            .await
            .iter()
            .find(|s| s.exemplar.question == question)
            .map(Slot::read))
    }

    async fn insert_exemplar(&self, exemplar: NewExemplar) -> Result<Exemplar, StoreError> {
        self.ensure_available()?;
        let exemplar = Self::materialize(exemplar);
        self.exemplars.write().await.push(Slot::new(exemplar.clone()));
        Ok(exemplar)
    }

    async fn update_exemplar(&self, exemplar: Exemplar) -> Result<Exemplar, StoreError> {
        self.ensure_available()?;
        let mut slots = self.exemplars.write().await;
        let slot = slots
            .iter_mut()
            .find(|s| s.exemplar.id == exemplar.id)
            .ok_or_else(|| StoreError::NotFound(exemplar.id.clone()))?;

        // Counters never go backwards
        let usage = slot.usage.load(Ordering::Relaxed).max(exemplar.usage_count);
        *slot = Slot::new(Exemplar {
            usage_count: usage,
            ..exemplar
        });
        Ok(slot.read())
    }

    async fn delete_exemplar(&self, id: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut slots = self.exemplars.write().await;
        let before = slots.len();
        slots.retain(|s| s.exemplar.id != id);
        Ok(slots.len() < before)
    }

    async fn import_exemplars(&self, exemplars: Vec<NewExemplar>) -> Result<usize, StoreError> {
        self.ensure_available()?;
        let mut slots = self.exemplars.write().await;
        let count = exemplars.len();
        slots.extend(exemplars.into_iter().map(|e| Slot::new(Self::materialize(e))));
        Ok(count)
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn recent_attempts(
        &self,
        user_id: &str,
        exercise_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Attempt>, StoreError> {
        self.ensure_available()?;
        let attempts = self.attempts.read().await;
        let mut matching: Vec<Attempt> = attempts
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter(|a| match exercise_id {
                Some(id) => a.exercise.as_ref().is_some_and(|e| e.id == id),
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        matching.truncate(limit);
        Ok(matching)
    }
}
