//! # Grafter HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! Every mutation is enqueued on the command engine and answered with
//! `202 Accepted`; clients poll `/status` for progress and the outcome.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Engine state, progress and session counts
//! - `GET /history` - Undoable and redoable command descriptions
//! - `GET /graph` - Derived graph summary, last delta, alerts, attributes
//! - `POST /transforms` - Replace the transform chain (undoable)
//! - `POST /nodes/remove` - Remove source nodes (undoable unless `"undoable": false`)
//! - `POST /undo` - Undo the last command
//! - `POST /redo` - Redo the next command
//! - `POST /cancel` - Cancel the running command
//!
//! ## CORS
//!
//! Allowed origins come from `[server] cors_origins` or `GRAFTER_CORS_ORIGINS`:
//! `*` allows all, an empty list allows localhost only.

mod handlers;
mod types;

pub use handlers::{
    cancel_handler, graph_handler, health_handler, history_handler, redo_handler,
    remove_nodes_handler, status_handler, transforms_handler, undo_handler,
};
pub use types::{
    AcceptedResponse, AlertJson, AttributeJson, CancelResponse, CompletionJson, DeltaJson,
    ErrorResponse, GraphResponse, HealthResponse, HistoryResponse, MetricsJson,
    RemoveNodesRequest, StatusResponse,
};

use crate::actions::{CompletionLog, SharedSession, shared};
use crate::settings::Settings;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use grafter_core::{
    CancellationToken, CommandListener, CommandManager, CommandManagerConfig, GrafterError,
    NullProgress, Session,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the session and the engine that mutates it.
#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
    pub manager: Arc<CommandManager>,
    pub log: Arc<CompletionLog>,
}

impl AppState {
    /// Build the derived graph once, then start the command engine over `session`.
    pub fn new(mut session: Session, config: CommandManagerConfig) -> Result<Self, GrafterError> {
        session.rebuild(&NullProgress, &CancellationToken::new())?;

        let log = Arc::new(CompletionLog::new());
        let manager = CommandManager::with_listener(
            config,
            Arc::clone(&log) as Arc<dyn CommandListener>,
        )?;
        session.add_source_observer(Arc::new(manager.graph_change_flag()));

        Ok(Self {
            session: shared(session),
            manager: Arc::new(manager),
            log,
        })
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/history", get(handlers::history_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/transforms", post(handlers::transforms_handler))
        .route("/nodes/remove", post(handlers::remove_nodes_handler))
        .route("/undo", post(handlers::undo_handler))
        .route("/redo", post(handlers::redo_handler))
        .route("/cancel", post(handlers::cancel_handler))
        .layer(middleware)
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(settings: &Settings, session: Session) -> Result<(), GrafterError> {
    let state = AppState::new(session, settings.command_config())?;
    let router = create_router(state, &settings.server.cors_origins);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GrafterError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Grafter HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GrafterError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
