//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use grafter_core::{
    ActionKind, AlertType, Attribute, CommandCompletion, EdgeId, ElementKind, NodeId,
    SessionMetrics, TransformAlert, TransformConfig, TransformDelta, ValueType,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Session size counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsJson {
    pub source_nodes: usize,
    pub source_edges: usize,
    pub nodes: usize,
    pub edges: usize,
    pub components: usize,
    pub attributes: usize,
    pub transforms: usize,
    pub alerts: usize,
}

impl From<SessionMetrics> for MetricsJson {
    fn from(m: SessionMetrics) -> Self {
        Self {
            source_nodes: m.source_nodes,
            source_edges: m.source_edges,
            nodes: m.nodes,
            edges: m.edges,
            components: m.components,
            attributes: m.attributes,
            transforms: m.transforms,
            alerts: m.alerts,
        }
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionJson {
    /// `execute`, `execute_once`, `undo` or `redo`.
    pub action: String,
    pub success: bool,
    pub cancelled: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CommandCompletion> for CompletionJson {
    fn from(c: &CommandCompletion) -> Self {
        let action = match c.action {
            ActionKind::Execute => "execute",
            ActionKind::ExecuteOnce => "execute_once",
            ActionKind::Undo => "undo",
            ActionKind::Redo => "redo",
        };
        Self {
            action: action.to_string(),
            success: c.success,
            cancelled: c.was_cancelled(),
            description: c.description.clone(),
            error: c.error.clone(),
        }
    }
}

/// Engine and session status.
///
/// `metrics` is absent while a command holds the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub busy: bool,
    pub progress: Option<i32>,
    pub verb: Option<String>,
    pub phase: Option<String>,
    pub cancellable: bool,
    pub cancelling: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub next_undo: String,
    pub next_redo: String,
    pub metrics: Option<MetricsJson>,
    pub last_completion: Option<CompletionJson>,
}

// =============================================================================
// HISTORY RESPONSE
// =============================================================================

/// Undo/redo history, most recent first in both lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub undo: Vec<String>,
    pub redo: Vec<String>,
}

// =============================================================================
// GRAPH RESPONSE
// =============================================================================

/// Elements added/removed by the last rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaJson {
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub added_edges: Vec<EdgeId>,
    pub removed_edges: Vec<EdgeId>,
}

impl From<&TransformDelta> for DeltaJson {
    fn from(d: &TransformDelta) -> Self {
        Self {
            added_nodes: d.added_nodes.clone(),
            removed_nodes: d.removed_nodes.clone(),
            added_edges: d.added_edges.clone(),
            removed_edges: d.removed_edges.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertJson {
    pub index: usize,
    pub transform: String,
    pub alert_type: AlertType,
    pub text: String,
}

impl From<&TransformAlert> for AlertJson {
    fn from(a: &TransformAlert) -> Self {
        Self {
            index: a.index,
            transform: a.transform.clone(),
            alert_type: a.alert.alert_type,
            text: a.alert.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeJson {
    pub name: String,
    pub element: ElementKind,
    pub value_type: ValueType,
    pub derived: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl From<&Attribute> for AttributeJson {
    fn from(a: &Attribute) -> Self {
        Self {
            name: a.name().to_string(),
            element: a.element_kind(),
            value_type: a.values().value_type(),
            derived: a.is_derived(),
            description: a.description().to_string(),
        }
    }
}

/// Derived graph summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    pub metrics: MetricsJson,
    pub transforms: Vec<TransformConfig>,
    pub delta: DeltaJson,
    pub alerts: Vec<AlertJson>,
    pub attributes: Vec<AttributeJson>,
}

// =============================================================================
// COMMAND REQUESTS/RESPONSES
// =============================================================================

fn default_undoable() -> bool {
    true
}

/// Source node removal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveNodesRequest {
    pub nodes: Vec<NodeId>,
    #[serde(default = "default_undoable")]
    pub undoable: bool,
}

/// A command was queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub action: String,
}

impl AcceptedResponse {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            accepted: true,
            action: action.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelling: bool,
}

/// Request rejected before reaching the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Vec::new(),
        }
    }
}
