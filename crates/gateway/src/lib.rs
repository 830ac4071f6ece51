//! HTTP gateway for factchat.
//!
//! A single command endpoint (`POST /`) shared by the CLI and the web
//! front end, plus `GET /health`. Built on Axum.

pub mod commands;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use factchat_agent::{ContextProvider, ConversationOrchestrator, SessionManager};
use factchat_config::AppConfig;
use factchat_memory::{DirectoryBlobStore, EmbeddingIndex, FactStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub sessions: SessionManager,
    pub facts: FactStore,
    /// Where `create-training-file` writes its export
    pub training_dir: PathBuf,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(sessions: SessionManager, facts: FactStore, training_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions,
            facts,
            training_dir: training_dir.into(),
        }
    }

    /// Wire provider, tools, background index and fact store from config.
    pub fn from_config(config: &AppConfig) -> factchat_core::Result<Self> {
        let provider = factchat_providers::router::build_from_config(config)?;
        let tools = Arc::new(factchat_tools::default_registry(config)?);

        let index = EmbeddingIndex::open(
            config.retrieval.index_path.clone(),
            provider.clone(),
            config.completion.embedding_model.clone(),
        )
        .with_min_score(config.retrieval.min_score);
        let context = ContextProvider::new(Arc::new(index)).with_timeout(config.timeouts.retrieval());

        let orchestrator = ConversationOrchestrator::from_config(config, provider, tools, context);

        let facts = FactStore::new(Arc::new(DirectoryBlobStore::new(config.storage.blob_dir.clone())))
            .with_kill_all(config.storage.allow_kill_all_facts)
            .with_timeout(config.timeouts.storage());
        if facts.kill_all_enabled() {
            warn!("kill-all-facts is enabled; every stored fact can be deleted in one request");
        }

        Ok(Self::new(
            SessionManager::new(Arc::new(orchestrator)),
            facts,
            config.storage.training_dir.clone(),
        ))
    }
}

/// Build the Axum router.
///
/// Layers: CORS for the configured origins, a 1 MB body limit, and HTTP
/// trace logging.
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", post(commands::command_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(GatewayState::from_config(&config)?);
    let app = build_router(state, &config.gateway.allowed_origins);

    info!(addr = %addr, model = %config.completion.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use factchat_core::error::ProviderError;
    use factchat_core::provider::{ImageRequest, ImageResponse, Provider, ProviderRequest, ProviderResponse};
    use factchat_core::tool::ToolRegistry;
    use factchat_memory::InMemoryBlobStore;

    /// Answers every completion with a fixed text.
    pub struct FixedProvider(pub &'static str);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                content: self.0.to_string(),
                usage: None,
                model: "fixed-model".into(),
            })
        }

        async fn image(&self, request: ImageRequest) -> Result<ImageResponse, ProviderError> {
            Ok(ImageResponse {
                url: format!("https://images.example/{}.png", request.prompt.replace(' ', "-")),
            })
        }
    }

    pub fn state_with(answer: &'static str, blobs: InMemoryBlobStore, training_dir: &std::path::Path) -> SharedState {
        let orchestrator = ConversationOrchestrator::new(
            Arc::new(FixedProvider(answer)),
            Arc::new(ToolRegistry::new()),
            ContextProvider::without_background(),
        );
        Arc::new(GatewayState::new(
            SessionManager::new(Arc::new(orchestrator)),
            FactStore::new(Arc::new(blobs)),
            training_dir,
        ))
    }

    pub fn origins() -> Vec<String> {
        vec!["http://localhost:3000".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use factchat_memory::InMemoryBlobStore;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state_with("ok", InMemoryBlobStore::new(), dir.path());
        let app = build_router(state, &test_support::origins());

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state_with("ok", InMemoryBlobStore::new(), dir.path());
        let app = build_router(state, &test_support::origins());

        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/")
                .header("Origin", origin)
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app.clone().oneshot(preflight("http://localhost:3000")).await.unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let denied = app.oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_support::state_with("ok", InMemoryBlobStore::new(), dir.path());
        let app = build_router(state, &test_support::origins());

        let big = "x".repeat(1024 * 1024 + 1);
        let body = serde_json::json!({"text": big, "command": "get-response"}).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn state_from_config_requires_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.api_key = None;
        config.provider = "openai".into();
        config.storage.blob_dir = dir.path().join("blobs");
        config.retrieval.index_path = dir.path().join("index.jsonl");

        assert!(GatewayState::from_config(&config).is_err());

        config.api_key = Some("sk-test".into());
        let state = GatewayState::from_config(&config).unwrap();
        assert!(!state.facts.kill_all_enabled());
    }
}
