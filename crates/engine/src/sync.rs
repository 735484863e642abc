//! Corpus sync: export the active exemplars for the trainer and the
//! offline keyword fallback.
//!
//! Writes `exemplars.json` (the exported records) and
//! `exemplars_tokens.json` (one token array per question, answer prefix and
//! tag). Both files go through a temporary path and a rename, so readers
//! never see a partial file. Concurrent syncs are last-writer-wins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tutorgraph_core::corpus::ExportedExemplar;
use tutorgraph_core::error::SyncError;
use tutorgraph_core::event::{DomainEvent, EventBus};
use tutorgraph_core::store::KnowledgeStore;
use tutorgraph_embedding::{normalize_tokens, truncate_chars};

pub const EXEMPLARS_FILE: &str = "exemplars.json";
pub const TOKENS_FILE: &str = "exemplars_tokens.json";
const ANSWER_PREFIX_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub exemplars: usize,
    pub token_groups: usize,
    pub exemplars_path: PathBuf,
    pub tokens_path: PathBuf,
    /// True when `sync_if_needed` found the export current
    #[serde(default)]
    pub skipped: bool,
}

/// Token groups for the trainer: question tokens, tokens of the answer's
/// first 500 characters and one group per tag. Empty groups are dropped.
pub fn token_groups(exported: &[ExportedExemplar]) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    for item in exported {
        let candidates = std::iter::once(normalize_tokens(&item.question))
            .chain(std::iter::once(normalize_tokens(truncate_chars(
                &item.answer,
                ANSWER_PREFIX_CHARS,
            ))))
            .chain(item.tags.iter().map(|t| normalize_tokens(t)));
        groups.extend(candidates.filter(|g| !g.is_empty()));
    }
    groups
}

pub struct CorpusSync {
    store: Arc<dyn KnowledgeStore>,
    output_dir: PathBuf,
    events: Option<Arc<EventBus>>,
}

impl CorpusSync {
    pub fn new(store: Arc<dyn KnowledgeStore>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
            events: None,
        }
    }

    /// Publish `CorpusSynced` after each export.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn exemplars_path(&self) -> PathBuf {
        self.output_dir.join(EXEMPLARS_FILE)
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.output_dir.join(TOKENS_FILE)
    }

    /// Export the active exemplars and their token groups.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let exemplars = self.store.active_exemplars().await?;
        let exported: Vec<ExportedExemplar> = exemplars.iter().map(ExportedExemplar::from).collect();
        let groups = token_groups(&exported);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| SyncError::Write {
                path: self.output_dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let exemplars_path = self.exemplars_path();
        let tokens_path = self.tokens_path();
        write_json_atomic(&exemplars_path, &exported).await?;
        write_json_atomic(&tokens_path, &groups).await?;

        info!(
            exemplars = exported.len(),
            token_groups = groups.len(),
            dir = %self.output_dir.display(),
            "Corpus exported"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::CorpusSynced {
                exemplars: exported.len(),
                token_groups: groups.len(),
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(SyncReport {
            exemplars: exported.len(),
            token_groups: groups.len(),
            exemplars_path,
            tokens_path,
            skipped: false,
        })
    }

    /// Whether the export is missing, unreadable or out of step with the
    /// active exemplar count.
    pub async fn needs_sync(&self) -> Result<bool, SyncError> {
        let active = self.store.count_active().await?;
        let path = self.exemplars_path();
        let exported = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<serde_json::Value>>(&bytes) {
                Ok(items) => items.len(),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Export unreadable");
                    return Ok(true);
                }
            },
            Err(_) => return Ok(true),
        };
        Ok(exported != active)
    }

    pub async fn sync_if_needed(&self) -> Result<SyncReport, SyncError> {
        if self.needs_sync().await? {
            return self.sync().await;
        }
        debug!("Corpus export is current");
        Ok(SyncReport {
            exemplars: self.store.count_active().await?,
            token_groups: 0,
            exemplars_path: self.exemplars_path(),
            tokens_path: self.tokens_path(),
            skipped: true,
        })
    }

    /// Run a sync after every `ExemplarsChanged` event until the bus closes.
    pub fn spawn_listener(self: Arc<Self>, events: &EventBus) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let DomainEvent::ExemplarsChanged { reason, count, .. } = &*event {
                            debug!(reason = %reason, count, "Exemplars changed, syncing corpus");
                            if let Err(e) = self.sync().await {
                                warn!(error = %e, "Corpus sync after change failed");
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Sync listener lagged, syncing once");
                        if let Err(e) = self.sync().await {
                            warn!(error = %e, "Corpus sync failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SyncError> {
    let write_err = |e: &dyn std::fmt::Display| SyncError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let bytes = serde_json::to_vec_pretty(value).map_err(|e| write_err(&e))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await.map_err(|e| write_err(&e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| write_err(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tutorgraph_core::corpus::NewExemplar;
    use tutorgraph_store::InMemoryStore;

    async fn seeded() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_exemplar(
                NewExemplar::new("What is a closure?", "A closure captures its environment.")
                    .with_tags(["closure", "javascript"]),
            )
            .await
            .unwrap();
        store
            .insert_exemplar(NewExemplar::new("Hidden", "inactive answer").inactive())
            .await
            .unwrap();
        store
    }

    #[test]
    fn token_groups_skip_empty_entries() {
        let exported = vec![ExportedExemplar {
            question: "What is recursion?".into(),
            answer: "```py\nf()\n```".into(),
            category: "general".into(),
            tags: vec!["recursion".into(), "?".into()],
            priority: 1,
        }];
        let groups = token_groups(&exported);
        assert_eq!(groups.len(), 2);
        assert!(groups[0].contains(&"recursion".to_string()));
        assert_eq!(groups[1], vec!["recursion"]);
    }

    #[tokio::test]
    async fn sync_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded().await;
        let sync = CorpusSync::new(store, dir.path().join("models"));

        let report = sync.sync().await.unwrap();
        assert_eq!(report.exemplars, 1);
        assert!(!report.skipped);

        let exported: Vec<ExportedExemplar> =
            serde_json::from_slice(&std::fs::read(sync.exemplars_path()).unwrap()).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].tags, vec!["closure", "javascript"]);

        let groups: Vec<Vec<String>> =
            serde_json::from_slice(&std::fs::read(sync.tokens_path()).unwrap()).unwrap();
        assert_eq!(groups.len(), report.token_groups);
        assert!(!dir.path().join("models/exemplars.json.tmp").exists());
    }

    #[tokio::test]
    async fn needs_sync_tracks_the_active_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded().await;
        let sync = CorpusSync::new(store.clone(), dir.path());

        assert!(sync.needs_sync().await.unwrap());
        sync.sync().await.unwrap();
        assert!(!sync.needs_sync().await.unwrap());
        assert!(sync.sync_if_needed().await.unwrap().skipped);

        store
            .insert_exemplar(NewExemplar::new("Another question", "Another answer"))
            .await
            .unwrap();
        assert!(sync.needs_sync().await.unwrap());
        let report = sync.sync_if_needed().await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.exemplars, 2);
    }

    #[tokio::test]
    async fn garbage_export_needs_sync() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(EXEMPLARS_FILE), "not json").unwrap();
        let sync = CorpusSync::new(seeded().await, dir.path());
        assert!(sync.needs_sync().await.unwrap());
    }

    #[tokio::test]
    async fn listener_syncs_after_change_events() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::default();
        let sync = Arc::new(CorpusSync::new(seeded().await, dir.path()));
        let handle = sync.clone().spawn_listener(&bus);

        bus.publish(DomainEvent::exemplars_changed("import", 1));
        for _ in 0..50 {
            if sync.exemplars_path().exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(sync.exemplars_path().exists());
        handle.abort();
    }
}
