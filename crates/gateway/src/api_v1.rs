//! HTTP API v1: the retrieval engine over REST.
//!
//! Endpoints:
//!
//! - `POST /v1/context`                    : Assemble the response context for a message
//! - `GET  /v1/graph`                      : Knowledge graph, optionally filtered
//! - `GET  /v1/users/{user_id}/error-graph`: Graph augmented with a user's error profile
//! - `POST /v1/exemplars/promote`          : Promote a rated conversation turn
//! - `POST /v1/sync`                       : Export the corpus for the trainer
//!
//! The two graph routes are rate limited; see [`crate::RateLimiter`].

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use tutorgraph_core::error::{StoreError, SyncError};
use tutorgraph_engine::{
    AssembledContext, ErrorGraph, GraphFilter, PromotionOutcome, RatedTurn, SyncReport, TutorEngine,
};
use tutorgraph_core::graph::KnowledgeGraph;

use crate::{RateLimiter, rate_limit_middleware};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub engine: Arc<TutorEngine>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState, graph_limiter: Arc<RateLimiter>) -> Router {
    let graphs = Router::new()
        .route("/graph", get(graph_handler))
        .route("/users/{user_id}/error-graph", get(error_graph_handler))
        .route_layer(middleware::from_fn_with_state(graph_limiter, rate_limit_middleware));

    Router::new()
        .route("/context", post(context_handler))
        .route("/exemplars/promote", post(promote_handler))
        .route("/sync", post(sync_handler))
        .route("/status", get(status_handler))
        .merge(graphs)
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Engine failures mapped to HTTP: an unreachable store is 503, anything
/// else 500. Both carry a JSON body.
pub enum ApiError {
    Store(StoreError),
    Sync(SyncError),
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Store(e) if e.is_fatal() => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            Self::Sync(SyncError::Store(e)) if e.is_fatal() => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Sync(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextRequest {
    message: String,
    #[serde(default)]
    user_id: Option<String>,
}

/// Comma-separated filter lists, as sent by the graph view.
#[derive(Deserialize, Default)]
struct GraphQuery {
    #[serde(default)]
    categories: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

impl GraphQuery {
    fn into_filter(self) -> GraphFilter {
        GraphFilter {
            categories: split_list(self.categories.as_deref()),
            tags: split_list(self.tags.as_deref()),
            search: self.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorGraphQuery {
    #[serde(default)]
    exercise_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct StatusResponse {
    store: String,
    embedding: String,
    trained: bool,
    active_exemplars: Option<usize>,
    uptime_secs: i64,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn context_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ContextRequest>,
) -> Result<Json<AssembledContext>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    let assembled = state
        .engine
        .context(&payload.message, payload.user_id.as_deref())
        .await?;
    Ok(Json(assembled))
}

async fn graph_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<KnowledgeGraph>, ApiError> {
    let filter = query.into_filter();
    let graph = state.engine.graph(&filter).await?;
    Ok(Json(graph))
}

async fn error_graph_handler(
    State(state): State<SharedApiState>,
    Path(user_id): Path<String>,
    Query(query): Query<ErrorGraphQuery>,
) -> Result<Json<ErrorGraph>, ApiError> {
    let graph = state
        .engine
        .error_graph(&user_id, query.exercise_id.as_deref())
        .await?;
    Ok(Json(graph))
}

async fn promote_handler(
    State(state): State<SharedApiState>,
    Json(turn): Json<RatedTurn>,
) -> Result<(StatusCode, Json<PromotionOutcome>), ApiError> {
    let outcome = state.engine.promote(&turn).await?;
    let status = match outcome {
        PromotionOutcome::Created(_) => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

async fn sync_handler(State(state): State<SharedApiState>) -> Result<Json<SyncReport>, ApiError> {
    let report = state.engine.sync().await?;
    info!(exemplars = report.exemplars, "Corpus sync requested over HTTP");
    Ok(Json(report))
}

async fn status_handler(State(state): State<SharedApiState>) -> Json<StatusResponse> {
    let engine = &state.engine;
    let active_exemplars = match engine.store().count_active().await {
        Ok(n) => Some(n),
        Err(e) => {
            warn!(error = %e, "Status probe could not count exemplars");
            None
        }
    };
    Json(StatusResponse {
        store: engine.store().name().to_string(),
        embedding: engine.gateway().backend_name().to_string(),
        trained: engine.gateway().is_trained(),
        active_exemplars,
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    use tutorgraph_config::AppConfig;
    use tutorgraph_core::corpus::NewExemplar;
    use tutorgraph_core::store::KnowledgeStore;
    use tutorgraph_embedding::{EmbeddingGateway, ScriptedEmbedder};
    use tutorgraph_engine::CatalogResourceMatcher;
    use tutorgraph_store::InMemoryStore;

    async fn test_state(store: Arc<InMemoryStore>) -> (SharedApiState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.sync.output_dir = dir.path().to_path_buf();
        let gateway = EmbeddingGateway::new(Arc::new(ScriptedEmbedder::untrained()), Duration::from_secs(1));
        let engine = TutorEngine::new(
            config,
            store.clone(),
            store,
            gateway,
            Arc::new(CatalogResourceMatcher::new(vec![])),
        );
        let state = Arc::new(ApiV1State {
            engine: Arc::new(engine),
            start_time: chrono::Utc::now(),
        });
        (state, dir)
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_exemplar(
                NewExemplar::new("How does recursion work?", "A function calls itself until a base case.")
                    .with_category("algorithms")
                    .with_tags(["recursion"]),
            )
            .await
            .unwrap();
        store
    }

    fn limiter(max: usize) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(max, Duration::from_secs(60)))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn context_endpoint_returns_preamble() {
        let (state, _dir) = test_state(seeded_store().await).await;
        let app = v1_router(state, limiter(10));

        let response = app
            .oneshot(post_json("/context", serde_json::json!({"message": "what is recursion in python"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["context"]["keywords"]["intent"], "question");
        assert!(json["preamble"].as_str().unwrap().contains("recursion"));
        assert_eq!(json["metadata"]["degraded"], false);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (state, _dir) = test_state(seeded_store().await).await;
        let app = v1_router(state, limiter(10));
        let response = app
            .oneshot(post_json("/context", serde_json::json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unavailable_store_is_503() {
        let store = seeded_store().await;
        let (state, _dir) = test_state(store.clone()).await;
        store.set_available(false);
        let app = v1_router(state, limiter(10));

        let response = app
            .oneshot(post_json("/context", serde_json::json!({"message": "recursion"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn graph_filter_from_query_string() {
        let (state, _dir) = test_state(seeded_store().await).await;
        let app = v1_router(state, limiter(10));

        let req = Request::builder()
            .uri("/graph?categories=algorithms&tags=")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let nodes = json["nodes"].as_array().unwrap();
        assert!(nodes.iter().any(|n| n["id"] == "category:algorithms"));
    }

    #[tokio::test]
    async fn graph_routes_are_rate_limited() {
        let (state, _dir) = test_state(seeded_store().await).await;
        let app = v1_router(state, limiter(1));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/graph").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users/u1/error-graph")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let context = app
            .oneshot(post_json("/context", serde_json::json!({"message": "recursion"})))
            .await
            .unwrap();
        assert_eq!(context.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn promote_creates_then_reports_duplicate() {
        let store = seeded_store().await;
        let (state, _dir) = test_state(store.clone()).await;
        let turn = serde_json::json!({
            "question": "What is a closure in JavaScript?",
            "answer": "A function bundled with the variables it captured.",
            "rating": "good",
            "userId": "u1"
        });

        let app = v1_router(state.clone(), limiter(10));
        let response = app
            .oneshot(post_json("/exemplars/promote", turn.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["outcome"], "created");

        let app = v1_router(state, limiter(10));
        let response = app.oneshot(post_json("/exemplars/promote", turn)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["outcome"], "skipped_duplicate");
        assert_eq!(store.count_active().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sync_endpoint_writes_export() {
        let (state, dir) = test_state(seeded_store().await).await;
        let app = v1_router(state, limiter(10));

        let req = Request::builder()
            .method("POST")
            .uri("/sync")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["exemplars"], 1);
        assert!(dir.path().join("exemplars.json").exists());
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list(Some("a, b,,c ")), vec!["a", "b", "c"]);
        assert!(split_list(None).is_empty());
    }
}
