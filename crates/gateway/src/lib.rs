//! HTTP API gateway for Sage.
//!
//! Exposes the chat endpoint, liveness and health checks, and session
//! inspection. Error bodies use the `{"detail": "..."}` shape so existing
//! clients of the assistant keep working.
//!
//! Built on Axum; everything the handlers need is constructed once at
//! startup and shared through [`AppState`].

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::Json;
use axum::routing::{get, post};
use sage_agent::{ChatPipeline, InMemorySessionStore, KnowledgeBase, PipelineSettings};
use sage_config::{AppConfig, GatewayConfig};
use sage_core::error::{Error, ValidationError};
use sage_core::{CompletionService, Exchange};
use sage_search::WebSearch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub completion: Arc<dyn CompletionService>,
    pub assistant_name: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(pipeline: Arc<ChatPipeline>, assistant_name: impl Into<String>) -> Self {
        Self {
            completion: pipeline.completion().clone(),
            pipeline,
            assistant_name: assistant_name.into(),
        }
    }
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS from `gateway.cors_allow_origins` (`"*"` allows everything)
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions/{id}", get(session_handler).delete(evict_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(cors_layer(&gateway.cors_allow_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Construct the chat pipeline from configuration: knowledge base, completion
/// backend, web search, and session store.
pub async fn build_pipeline(
    config: &AppConfig,
) -> Result<ChatPipeline, Box<dyn std::error::Error>> {
    let knowledge = KnowledgeBase::load(&config.knowledge.dir, &config.knowledge.extensions);
    info!(
        dir = %config.knowledge.dir.display(),
        files = knowledge.sources.len(),
        chars = knowledge.text.len(),
        "Knowledge base loaded"
    );

    let completion = sage_providers::build_from_config(config).await?;
    let search = WebSearch::from_config(config)?;
    let sessions = Arc::new(InMemorySessionStore::new(config.session.max_history));

    Ok(ChatPipeline::new(
        completion,
        search,
        knowledge,
        sessions,
        PipelineSettings::from_config(config),
    ))
}

/// Start the gateway HTTP server. Returns after Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let pipeline = Arc::new(build_pipeline(&config).await?);
    let state = Arc::new(AppState::new(pipeline, config.assistant.name.clone()));
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// --- Errors ---

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

impl From<ValidationError> for ErrorResponse {
    fn from(e: ValidationError) -> Self {
        Self {
            detail: e.to_string(),
        }
    }
}

fn map_error(err: Error) -> ApiError {
    match err {
        Error::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, Json(e.into())),
        Error::Completion(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    message: String,
}

async fn root_handler(State(state): State<SharedState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        message: format!("{} API is running", state.assistant_name),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    version: &'static str,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.completion.is_ready().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    /// Inline history from older clients; rejected when present.
    #[serde(default)]
    conversation_history: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload
        .map_err(|rejection| map_error(ValidationError::Malformed(rejection.body_text()).into()))?;

    if payload.conversation_history.is_some() {
        return Err(map_error(
            ValidationError::Deprecated {
                field: "conversation_history",
                replacement: "session_id",
            }
            .into(),
        ));
    }

    let session_id = payload
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(
        session_id = %session_id,
        message_len = payload.message.len(),
        "Chat request received"
    );

    let turn = state
        .pipeline
        .respond(&session_id, &payload.message)
        .await
        .map_err(map_error)?;

    Ok(Json(ChatResponse {
        response: turn.reply,
        session_id: turn.session_id,
    }))
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
    history: Vec<Exchange>,
}

async fn session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let history = state
        .pipeline
        .sessions()
        .snapshot(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))?;

    Ok(Json(SessionResponse {
        session_id: id,
        history,
    }))
}

async fn evict_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.pipeline.sessions().evict(&id).await {
        info!(session_id = %id, "Session evicted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "Session not found"))
    }
}
