//! HTTP API gateway for tutorgraph.
//!
//! Exposes a health check and the v1 retrieval API: context assembly,
//! knowledge graphs, exemplar promotion and corpus sync.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use tutorgraph_engine::TutorEngine;

/// Request body size limit for every route.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Build the full router: `/health` plus the v1 API nested under `/v1`.
///
/// Layers applied:
/// - Request body size limit (1 MB)
/// - CORS for browser clients of the graph view
/// - Sliding-window rate limit on the graph routes, keyed per client address
/// - HTTP trace logging
pub fn build_router(engine: Arc<TutorEngine>) -> Router {
    let rpm = engine.config().gateway.graph_requests_per_minute as usize;
    let graph_limiter = Arc::new(
        RateLimiter::new(rpm, Duration::from_secs(60))
            .with_trusted_proxies(engine.config().gateway.trusted_proxies.clone()),
    );

    let api_state = Arc::new(api_v1::ApiV1State {
        engine,
        start_time: chrono::Utc::now(),
    });
    let v1 = api_v1::v1_router(api_state, graph_limiter);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server on the configured host and port.
pub async fn start(engine: Arc<TutorEngine>) -> Result<(), Box<dyn std::error::Error>> {
    let host = engine.config().gateway.host.clone();
    let port = engine.config().gateway.port;
    let addr = format!("{host}:{port}");

    let app = build_router(engine);

    info!(addr = %addr, "Gateway starting with v1 API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    trusted_proxies: Vec<IpAddr>,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            trusted_proxies: Vec::new(),
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Peers allowed to name the real client in `X-Forwarded-For`.
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = proxies;
        self
    }

    /// The key a request is counted under: the peer address, or the first
    /// `X-Forwarded-For` entry when the peer is a trusted proxy. Requests
    /// without connection info share the "unknown" key.
    pub fn client_key(&self, req: &axum::extract::Request) -> String {
        let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() else {
            return "unknown".to_string();
        };
        let peer = peer.ip();
        if !self.trusted_proxies.contains(&peer) {
            return peer.to_string();
        }
        req.headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .and_then(|s| s.parse::<IpAddr>().ok())
            .unwrap_or(peer)
            .to_string()
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    pub fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict stale clients once the map grows large
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rate limiting middleware for the graph routes, keyed by
/// [`RateLimiter::client_key`]. Returns 429 Too Many Requests when exceeded.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    let client_key = limiter.client_key(&req);

    if !limiter.check(&client_key) {
        warn!(client = %client_key, path = req.uri().path(), "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use tutorgraph_config::AppConfig;
    use tutorgraph_embedding::EmbeddingGateway;
    use tutorgraph_engine::CatalogResourceMatcher;
    use tutorgraph_store::InMemoryStore;

    fn test_engine() -> Arc<TutorEngine> {
        let store = Arc::new(InMemoryStore::new());
        Arc::new(TutorEngine::new(
            AppConfig::default(),
            store.clone(),
            store,
            EmbeddingGateway::disabled(),
            Arc::new(CatalogResourceMatcher::new(vec![])),
        ))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_engine());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = build_router(test_engine());
        let message = "a".repeat(BODY_LIMIT_BYTES + 1);
        let body = serde_json::json!({ "message": message }).to_string();

        let req = Request::builder()
            .method("POST")
            .uri("/v1/context")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    fn graph_request(peer: [u8; 4], forwarded_for: &str) -> Request<Body> {
        Request::builder()
            .uri("/v1/graph")
            .header("X-Forwarded-For", forwarded_for)
            .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_escape_the_limit() {
        let app = build_router(test_engine());
        let rpm = AppConfig::default().gateway.graph_requests_per_minute as usize;

        let mut allowed = 0;
        for i in 0..rpm + 5 {
            let req = graph_request([192, 168, 1, 7], &format!("10.0.0.{i}"));
            if app.clone().oneshot(req).await.unwrap().status() == StatusCode::OK {
                allowed += 1;
            }
        }
        assert_eq!(allowed, rpm);

        // Another peer has its own budget
        let other = graph_request([192, 168, 1, 8], "10.0.0.1");
        assert_eq!(app.oneshot(other).await.unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn trusted_proxy_forwards_the_client_address() {
        let proxy: IpAddr = "10.1.1.1".parse().unwrap();
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).with_trusted_proxies(vec![proxy]);

        let via_proxy = Request::builder()
            .header("X-Forwarded-For", "203.0.113.9, 10.1.1.1")
            .extension(ConnectInfo(SocketAddr::new(proxy, 443)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(limiter.client_key(&via_proxy), "203.0.113.9");

        let direct = Request::builder()
            .header("X-Forwarded-For", "203.0.113.9")
            .extension(ConnectInfo(SocketAddr::from(([198, 51, 100, 2], 443))))
            .body(Body::empty())
            .unwrap();
        assert_eq!(limiter.client_key(&direct), "198.51.100.2");

        let unknown = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(limiter.client_key(&unknown), "unknown");
    }

    #[test]
    fn limiter_allows_up_to_max_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }
}
