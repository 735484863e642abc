//! `TutorEngine`: one handle over every retrieval operation.
//!
//! Owns the event bus and wires the assembler, graph builder, recommender,
//! promoter and corpus sync to the same stores and embedding gateway. The
//! gateway and the CLI only talk to this type.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tutorgraph_config::AppConfig;
use tutorgraph_core::corpus::CorpusSnapshot;
use tutorgraph_core::error::{StoreError, SyncError};
use tutorgraph_core::event::{DomainEvent, EventBus};
use tutorgraph_core::graph::{EdgeRelation, KnowledgeGraph};
use tutorgraph_core::resource::ResourceMatcher;
use tutorgraph_core::store::{KnowledgeStore, SubmissionStore};
use tutorgraph_embedding::EmbeddingGateway;

use crate::context::{AssembledContext, ContextAssembler};
use crate::graph::{filter_graph, GraphBuilder, GraphFilter};
use crate::promotion::{PromotionOutcome, Promoter, RatedTurn};
use crate::ranker::SimilarityRanker;
use crate::recommender::{ErrorGraph, ErrorRecommender};
use crate::sync::{CorpusSync, SyncReport};

pub struct TutorEngine {
    config: AppConfig,
    store: Arc<dyn KnowledgeStore>,
    gateway: EmbeddingGateway,
    events: Arc<EventBus>,
    assembler: ContextAssembler,
    graphs: GraphBuilder,
    recommender: ErrorRecommender,
    promoter: Promoter,
    corpus_sync: Arc<CorpusSync>,
}

impl TutorEngine {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KnowledgeStore>,
        submissions: Arc<dyn SubmissionStore>,
        gateway: EmbeddingGateway,
        resources: Arc<dyn ResourceMatcher>,
    ) -> Self {
        let events = Arc::new(EventBus::default());

        let ranker = SimilarityRanker::new(gateway.clone(), &config.retrieval);
        let assembler = ContextAssembler::new(
            store.clone(),
            ranker,
            config.retrieval.clone(),
            &config.assistant,
        )
        .with_events(events.clone());
        let graphs = GraphBuilder::new(gateway.clone(), &config.graph);
        let recommender = ErrorRecommender::new(submissions, resources, config.recommender.clone());
        let promoter = Promoter::new(store.clone(), events.clone());
        let corpus_sync = Arc::new(
            CorpusSync::new(store.clone(), config.sync.output_dir.clone()).with_events(events.clone()),
        );

        info!(
            store = store.name(),
            embedding = gateway.backend_name(),
            trained = gateway.is_trained(),
            "Tutor engine ready"
        );

        Self {
            config,
            store,
            gateway,
            events,
            assembler,
            graphs,
            recommender,
            promoter,
            corpus_sync,
        }
    }

    /// Assemble the response context for one utterance.
    pub async fn context(&self, message: &str, user_id: Option<&str>) -> Result<AssembledContext, StoreError> {
        self.assembler.assemble(message, user_id).await
    }

    /// Build the knowledge graph from a fresh snapshot and apply `filter`.
    pub async fn graph(&self, filter: &GraphFilter) -> Result<KnowledgeGraph, StoreError> {
        let graph = self.graphs.build_from_store(self.store.as_ref()).await?;
        self.announce_graph(&graph);
        Ok(filter_graph(graph, filter))
    }

    /// The knowledge graph augmented with one user's error profile.
    pub async fn error_graph(&self, user_id: &str, exercise_id: Option<&str>) -> Result<ErrorGraph, StoreError> {
        let snapshot = self.snapshot().await?;
        let graph = self.graphs.build(&snapshot).await;
        self.announce_graph(&graph);
        self.recommender
            .error_graph(graph, &snapshot, user_id, exercise_id)
            .await
    }

    pub async fn promote(&self, turn: &RatedTurn) -> Result<PromotionOutcome, StoreError> {
        self.promoter.promote(turn).await
    }

    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        self.corpus_sync.sync().await
    }

    pub async fn sync_if_needed(&self) -> Result<SyncReport, SyncError> {
        self.corpus_sync.sync_if_needed().await
    }

    /// Re-export the corpus whenever exemplars change.
    pub fn start_sync_listener(&self) -> JoinHandle<()> {
        self.corpus_sync.clone().spawn_listener(&self.events)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    pub fn corpus_sync(&self) -> &CorpusSync {
        &self.corpus_sync
    }

    /// A snapshot for graph building; non-fatal read failures give an
    /// empty corpus.
    async fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        match self.store.snapshot().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Corpus read failed, using empty snapshot");
                Ok(CorpusSnapshot::default())
            }
        }
    }

    fn announce_graph(&self, graph: &KnowledgeGraph) {
        self.events.publish(DomainEvent::GraphBuilt {
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
            similarity_edges: graph.edges_of(EdgeRelation::Similar).count(),
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tutorgraph_core::corpus::{Difficulty, Exercise, NewExemplar};
    use tutorgraph_core::history::{Attempt, ErrorEvent, SubmissionStatus};
    use tutorgraph_embedding::ScriptedEmbedder;
    use tutorgraph_store::InMemoryStore;

    use crate::promotion::Rating;
    use crate::resources::CatalogResourceMatcher;

    fn engine(store: Arc<InMemoryStore>, dir: &std::path::Path) -> TutorEngine {
        let mut config = AppConfig::default();
        config.sync.output_dir = dir.to_path_buf();
        let gateway = EmbeddingGateway::new(Arc::new(ScriptedEmbedder::untrained()), Duration::from_secs(1));
        TutorEngine::new(
            config,
            store.clone(),
            store,
            gateway,
            Arc::new(CatalogResourceMatcher::new(vec![])),
        )
    }

    #[tokio::test]
    async fn promotion_triggers_listener_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store.clone(), dir.path());
        let handle = engine.start_sync_listener();

        let outcome = engine
            .promote(&RatedTurn {
                question: "What is a closure in JavaScript?".into(),
                answer: "A function bundled with the variables it captured.".into(),
                rating: Rating::Good,
                user_id: None,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, PromotionOutcome::Created(_)));

        let path = engine.corpus_sync().exemplars_path();
        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(path.exists());
        assert!(!engine.corpus_sync().needs_sync().await.unwrap());
        handle.abort();
    }

    #[tokio::test]
    async fn error_graph_marks_user_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_exemplar(
                NewExemplar::new("Fix a syntax error in a loop", "Check the colon after for.")
                    .with_category("loops")
                    .with_tags(["loop"]),
            )
            .await
            .unwrap();
        let exercise = Exercise {
            id: "x1".into(),
            title: "Broken loop".into(),
            description: String::new(),
            language: "Python".into(),
            difficulty: Difficulty::Easy,
            category: "loops".into(),
            tags: vec!["loop".into()],
            points: 10,
            is_active: true,
            created_at: Utc::now(),
        };
        store.add_exercise(exercise.clone()).await;
        store
            .add_attempt(Attempt {
                id: "a1".into(),
                user_id: "u1".into(),
                exercise: Some(exercise),
                status: SubmissionStatus::WrongAnswer,
                errors: vec![ErrorEvent {
                    error_type: "syntax".into(),
                    error_message: "invalid syntax".into(),
                    timestamp: Utc::now(),
                }],
                submitted_at: Utc::now(),
            })
            .await;

        let engine = engine(store, dir.path());
        let graph = engine.error_graph("u1", None).await.unwrap();
        assert!(graph.graph.node("error:syntax").is_some());
        assert_eq!(graph.error_summary.error_types.get("syntax"), Some(&1));
    }

    #[tokio::test]
    async fn graph_publishes_build_event() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_exemplar(NewExemplar::new("What is a stack?", "LIFO container."))
            .await
            .unwrap();
        let engine = engine(store, dir.path());
        let mut rx = engine.events().subscribe();

        let graph = engine.graph(&GraphFilter::default()).await.unwrap();
        assert!(!graph.is_empty());
        let event = rx.recv().await.unwrap();
        assert!(matches!(&*event, DomainEvent::GraphBuilt { similarity_edges: 0, .. }));
    }
}
