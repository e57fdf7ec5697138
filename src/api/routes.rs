//! HTTP route handlers.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use super::error::ApiError;
use super::types::*;
use crate::agents::{panic_message, AgentHandle, ReactAgent};
use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The agent every run request is dispatched to; `None` if it was never constructed
    pub agent: Option<AgentHandle>,
}

impl AppState {
    pub fn new(agent: AgentHandle) -> Self {
        Self { agent: Some(agent) }
    }

    /// State with no agent, answering run requests with `AgentNotInitialized`.
    pub fn uninitialized() -> Self {
        Self { agent: None }
    }
}

/// Start the HTTP server.
///
/// Constructs the agent first; if that fails no listener is bound.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Initializing agent with config: {}",
        serde_json::to_string_pretty(&config.llm)?
    );
    let agent = ReactAgent::new(config.llm.clone(), &config.tools).map_err(|e| {
        tracing::error!("Failed to initialize agent: {:?}", e);
        e
    })?;
    let handle = AgentHandle::new(Arc::new(agent), &config.invocation);
    tracing::info!("Agent initialized successfully: {}", handle.description());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    serve_on(listener, AppState::new(handle)).await
}

/// Serve `state` on an already bound listener until a shutdown signal arrives.
pub async fn serve_on(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/agent/run", post(run_agent))
        .fallback(not_found)
        .with_state(Arc::new(state));
    with_middleware(routes)
}

fn with_middleware(routes: Router) -> Router {
    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Any panic escaping a handler ends up here.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(
        "Unhandled panic in request handler: {}\n{}",
        panic_message(&*payload),
        std::backtrace::Backtrace::force_capture()
    );
    ApiError::Internal.into_response()
}

/// API information.
async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

/// Liveness probe: reports only whether the agent exists.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_initialized: state.agent.is_some(),
    })
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Run the agent on one task.
async fn run_agent(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!("Rejected run request: {}", rejection.body_text());
        ApiError::from(rejection)
    })?;

    let Some(agent) = state.agent.as_ref() else {
        tracing::error!("Agent not initialized");
        return Err(ApiError::AgentNotInitialized);
    };

    let span = tracing::info_span!("agent_run", request_id = %Uuid::new_v4());
    async move {
        tracing::info!(
            "Processing request for question: {}",
            request.question().unwrap_or("N/A")
        );
        tracing::debug!(
            "Request data: {}",
            serde_json::to_string_pretty(&request).unwrap_or_default()
        );

        match agent.invoke(request).await {
            Ok(result) => {
                tracing::info!("Agent run completed for question: {}", result.question);
                tracing::debug!(
                    "Result: {}",
                    serde_json::to_string_pretty(&result).unwrap_or_default()
                );
                Ok(Json(result))
            }
            Err(e) => {
                tracing::error!("Error running agent [{}]: {}", e.kind(), e);
                tracing::error!("{:?}", e);
                Err(ApiError::Agent(e))
            }
        }
    }
    .instrument(span)
    .await
}
