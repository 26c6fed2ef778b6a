//! # grafter-core
//!
//! The graph-analysis engine for Grafter.
//!
//! Two subsystems share one typed-array foundation:
//! - **Command engine** (`command`): serialises graph operations onto a dedicated
//!   worker thread with cooperative cancellation, progress reporting and a bounded
//!   undo/redo history.
//! - **Transform pipeline** (`transform`): derives a working graph from a source
//!   graph through a chain of filter and ranking transforms, tracking exactly which
//!   elements each rebuild added or removed.
//!
//! ## Architectural Constraints
//!
//! - No async, no network: the only thread is the command worker
//! - Element identities are dense and never reused
//! - Arrays keyed by element identity grow with their graph, never shrink

// =============================================================================
// MODULES
// =============================================================================

pub mod array;
pub mod attributes;
pub mod command;
pub mod components;
pub mod condition;
pub mod graph;
pub mod primitives;
pub mod progress;
pub mod session;
pub mod transform;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Alert, AlertType, ComponentId, EdgeId, ElementId, ElementKind, GrafterError,
    MultiElementType, NodeId,
};

// =============================================================================
// RE-EXPORTS: Element Arrays and Graph
// =============================================================================

pub use array::{
    ArrayHost, ArrayReadGuard, ArrayRegistry, ArrayWriteGuard, ComponentArray, EdgeArray,
    ElementArray, NodeArray, ResizableArray,
};
pub use components::{Component, ComponentManager};
pub use graph::{Graph, GraphChange, GraphObserver};

// =============================================================================
// RE-EXPORTS: Attributes and Conditions
// =============================================================================

pub use attributes::{
    Attribute, AttributeElement, AttributeFlags, AttributeRegistry, AttributeValues, ValueFn,
    ValueType,
};
pub use condition::{Condition, ConditionFn, ConditionOp, ConditionValue, UnaryOp};

// =============================================================================
// RE-EXPORTS: Command Engine
// =============================================================================

pub use command::{
    ActionKind, CancellationToken, Command, CommandCompletion, CommandContext, CommandHistory,
    CommandListener, CommandManager, CommandManagerConfig, FnCommand, GraphChangeFlag,
};
pub use progress::{NullProgress, ProgressSink, ProgressState};

// =============================================================================
// RE-EXPORTS: Transform Pipeline
// =============================================================================

pub use session::{Session, SessionMetrics};
pub use transform::{
    ElementState, FilterConfig, FilterTransform, GraphTransform, PercentNnConfig,
    PercentNnTransform, SortOrder, TransformAlert, TransformChain, TransformConfig,
    TransformContext, TransformDelta, TransformedGraph,
};
