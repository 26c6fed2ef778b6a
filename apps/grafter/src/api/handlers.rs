//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Handlers never wait for the command worker: reads use `try_lock` or a
//! blocking task, writes enqueue a command and return immediately.

use super::{
    AppState,
    types::{
        AcceptedResponse, AlertJson, AttributeJson, CancelResponse, CompletionJson, DeltaJson,
        ErrorResponse, GraphResponse, HealthResponse, HistoryResponse, MetricsJson,
        RemoveNodesRequest, StatusResponse,
    },
};
use crate::actions::{ApplyTransformsCommand, RemoveNodesCommand, remove_nodes_once};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grafter_core::{Command, Session, TransformChain};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Engine state and session counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let manager = &state.manager;
    let metrics = state
        .session
        .try_lock()
        .map(|session| MetricsJson::from(session.metrics()));

    let response = StatusResponse {
        busy: manager.busy(),
        progress: manager.command_progress(),
        verb: manager.command_verb(),
        phase: manager.command_phase(),
        cancellable: manager.command_is_cancellable(),
        cancelling: manager.command_is_cancelling(),
        can_undo: manager.can_undo(),
        can_redo: manager.can_redo(),
        next_undo: manager.next_undo_action(),
        next_redo: manager.next_redo_action(),
        metrics,
        last_completion: state.log.last().as_ref().map(CompletionJson::from),
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// HISTORY HANDLER
// =============================================================================

pub async fn history_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HistoryResponse {
        undo: state.manager.undoable_command_descriptions(),
        redo: state.manager.redoable_command_descriptions(),
    })
}

// =============================================================================
// GRAPH HANDLER
// =============================================================================

fn graph_summary(session: &Session) -> GraphResponse {
    GraphResponse {
        metrics: session.metrics().into(),
        transforms: session.transforms().to_vec(),
        delta: DeltaJson::from(session.transformed().delta()),
        alerts: session.alerts().iter().map(AlertJson::from).collect(),
        attributes: session
            .attributes()
            .iter()
            .map(AttributeJson::from)
            .collect(),
    }
}

/// Derived graph summary. Waits (off the async runtime) for any running command.
pub async fn graph_handler(State(state): State<AppState>) -> Response {
    let session = state.session.clone();
    match tokio::task::spawn_blocking(move || graph_summary(&session.lock())).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Graph summary failed: {}", e))),
        )
            .into_response(),
    }
}

// =============================================================================
// COMMAND HANDLERS
// =============================================================================

/// Replace the transform chain.
pub async fn transforms_handler(
    State(state): State<AppState>,
    Json(chain): Json<TransformChain>,
) -> Response {
    let errors = chain.validate();
    if !errors.is_empty() {
        let details = errors
            .iter()
            .map(|(index, error)| format!("transform {}: {}", index, error))
            .collect();
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid transform chain".to_string(),
                details,
            }),
        )
            .into_response();
    }

    let command = ApplyTransformsCommand::new(state.session.clone(), chain.transforms);
    let action = command.description();
    state.manager.execute(command);
    (StatusCode::ACCEPTED, Json(AcceptedResponse::new(action))).into_response()
}

/// Remove source nodes.
pub async fn remove_nodes_handler(
    State(state): State<AppState>,
    Json(request): Json<RemoveNodesRequest>,
) -> Response {
    if request.nodes.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No nodes given")),
        )
            .into_response();
    }

    let action = if request.undoable {
        let command = RemoveNodesCommand::new(state.session.clone(), request.nodes);
        let action = command.description();
        state.manager.execute(command);
        action
    } else {
        let command = remove_nodes_once(state.session.clone(), request.nodes);
        let action = command.description();
        state.manager.execute_once(command);
        action
    };
    (StatusCode::ACCEPTED, Json(AcceptedResponse::new(action))).into_response()
}

pub async fn undo_handler(State(state): State<AppState>) -> impl IntoResponse {
    let action = state.manager.next_undo_action();
    state.manager.undo();
    (StatusCode::ACCEPTED, Json(AcceptedResponse::new(action)))
}

pub async fn redo_handler(State(state): State<AppState>) -> impl IntoResponse {
    let action = state.manager.next_redo_action();
    state.manager.redo();
    (StatusCode::ACCEPTED, Json(AcceptedResponse::new(action)))
}

/// Request cancellation of the running command. A no-op when idle.
pub async fn cancel_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.cancel();
    Json(CancelResponse {
        cancelling: state.manager.command_is_cancelling(),
    })
}
