//! Wiring shared by every command: open the stores, build the embedding
//! gateway and hand both to a [`TutorEngine`].

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tutorgraph_config::AppConfig;
use tutorgraph_core::resource::ResourceMatcher;
use tutorgraph_core::store::{KnowledgeStore, SubmissionStore};
use tutorgraph_embedding::EmbeddingGateway;
use tutorgraph_engine::{CatalogResourceMatcher, TutorEngine};
use tutorgraph_store::{InMemoryStore, SnapshotStore, SqliteStore};

type Stores = (
    Arc<dyn KnowledgeStore>,
    Arc<dyn SubmissionStore>,
    Arc<dyn ResourceMatcher>,
);

/// Open the configured stores.
///
/// `sqlite` opens (and migrates) the database. `memory` serves the last
/// corpus export read-only when one exists, otherwise an empty in-memory
/// corpus; submission history is always empty in that mode.
pub async fn open_stores(config: &AppConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    match config.store.backend.as_str() {
        "sqlite" => {
            if let Some(parent) = sqlite_file(&config.store.database_url)
                .as_deref()
                .and_then(|p| p.parent())
                .filter(|p| !p.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent)?;
            }
            let store = Arc::new(SqliteStore::new(&config.store.database_url).await?);
            let resources = match store.active_resources().await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "Learning resources unavailable");
                    Vec::new()
                }
            };
            let knowledge: Arc<dyn KnowledgeStore> = store.clone();
            let submissions: Arc<dyn SubmissionStore> = store;
            let matcher: Arc<dyn ResourceMatcher> = Arc::new(CatalogResourceMatcher::new(resources));
            Ok((knowledge, submissions, matcher))
        }
        _ => {
            let export = config.exemplars_path();
            let memory = Arc::new(InMemoryStore::new());
            let knowledge: Arc<dyn KnowledgeStore> = if export.exists() {
                info!(path = %export.display(), "Serving the corpus export read-only");
                Arc::new(SnapshotStore::open(&export)?)
            } else {
                memory.clone()
            };
            let submissions: Arc<dyn SubmissionStore> = memory;
            let matcher: Arc<dyn ResourceMatcher> = Arc::new(CatalogResourceMatcher::new(Vec::new()));
            Ok((knowledge, submissions, matcher))
        }
    }
}

/// Build the engine for `config`.
pub async fn engine(config: AppConfig) -> Result<Arc<TutorEngine>, Box<dyn std::error::Error>> {
    let (store, submissions, resources) = open_stores(&config).await?;
    let gateway = EmbeddingGateway::from_config(&config);
    Ok(Arc::new(TutorEngine::new(
        config,
        store,
        submissions,
        gateway,
        resources,
    )))
}

/// Filesystem path behind a `sqlite://` url, if any.
fn sqlite_file(url: &str) -> Option<PathBuf> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    Some(PathBuf::from(path))
}
