//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Grafter core:
//! - Element identifiers (`NodeId`, `EdgeId`, `ComponentId`) and the `ElementId` trait
//! - Element kinds and multi-element (merged head/tail) classification
//! - User-facing alerts raised by transforms
//! - Error types (`GrafterError`)
//!
//! ## Identity Guarantees
//!
//! Identifiers are dense, non-negative integers allocated by the owning graph.
//! Each kind reserves `u32::MAX` as its "null" sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ELEMENT IDENTIFIERS
// =============================================================================

/// Common behaviour of the three identity domains an element array can be keyed by.
pub trait ElementId: Copy + Eq + Ord + std::hash::Hash + fmt::Debug + Send + Sync + 'static {
    /// The element kind this identifier belongs to.
    const KIND: ElementKind;

    /// The distinguished "no element" value.
    const NULL: Self;

    /// Build an identifier from a dense index.
    fn from_index(index: usize) -> Self;

    /// The dense index backing this identifier.
    fn index(self) -> usize;

    /// Check whether this is the null sentinel.
    fn is_null(self) -> bool {
        self == Self::NULL
    }
}

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl ElementId for $name {
            const KIND: ElementKind = $kind;
            const NULL: Self = Self(u32::MAX);

            fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, "null")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }
    };
}

element_id!(
    /// Identifier of a node in a graph.
    NodeId,
    ElementKind::Node
);

element_id!(
    /// Identifier of an edge in a graph.
    EdgeId,
    ElementKind::Edge
);

element_id!(
    /// Identifier of a connected component, assigned by a `ComponentManager`.
    ComponentId,
    ElementKind::Component
);

/// The three identity domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Edge,
    Component,
}

impl ElementKind {
    /// Human readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Edge => "edge",
            ElementKind::Component => "component",
        }
    }
}

/// Classification of an element with respect to merging.
///
/// Merged elements form a set with one `Head` and any number of `Tail`s.
/// Unmerged elements are `Not`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultiElementType {
    #[default]
    Not,
    Head,
    Tail,
}

// =============================================================================
// ALERTS
// =============================================================================

/// Severity of a user-facing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Warning,
    Error,
}

/// A user-facing message raised when a transform's configuration cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub text: String,
}

impl Alert {
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            alert_type: AlertType::Error,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            alert_type: AlertType::Warning,
            text: text.into(),
        }
    }
}

impl From<&GrafterError> for Alert {
    fn from(error: &GrafterError) -> Self {
        Alert::error(error.to_string())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Grafter core.
///
/// - Configuration errors are local to one transform and surface as alerts
/// - Execution failures and cancellation are recovered by the command engine
/// - Fallible operations return `Result<T, GrafterError>`
#[derive(Debug, Error)]
pub enum GrafterError {
    /// The requested node does not exist in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The requested edge does not exist in the graph.
    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// A configuration references attributes the registry does not know.
    #[error("Unknown attribute(s): {}", .0.join(", "))]
    UnknownAttribute(Vec<String>),

    /// A condition expression cannot be evaluated.
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    /// A transform parameter is missing or out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Work was abandoned because cancellation was requested.
    #[error("Cancelled")]
    Cancelled,

    /// A command reported failure.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Settings or transform configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl GrafterError {
    /// Whether this error is a configuration error local to one transform.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GrafterError::UnknownAttribute(_)
                | GrafterError::InvalidCondition(_)
                | GrafterError::InvalidParameter(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
