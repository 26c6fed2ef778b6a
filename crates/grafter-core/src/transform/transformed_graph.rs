//! The derived graph and its per-generation element states.

use super::{TransformConfig, TransformContext};
use crate::array::{EdgeArray, ElementArray, NodeArray};
use crate::attributes::AttributeRegistry;
use crate::command::CancellationToken;
use crate::graph::{Graph, GraphChange};
use crate::primitives::PROGRESS_INDETERMINATE;
use crate::progress::ProgressSink;
use crate::types::{Alert, EdgeId, ElementId, GrafterError, NodeId};
use serde::Serialize;

/// How an element changed in the most recent rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    #[default]
    Unchanged,
    Added,
    Removed,
}

impl ElementState {
    /// The element appeared. Cancels a pending removal.
    #[must_use]
    pub fn add(self) -> Self {
        match self {
            ElementState::Removed => ElementState::Unchanged,
            _ => ElementState::Added,
        }
    }

    /// The element disappeared. Cancels a pending addition.
    #[must_use]
    pub fn remove(self) -> Self {
        match self {
            ElementState::Added => ElementState::Unchanged,
            _ => ElementState::Removed,
        }
    }
}

/// Elements added and removed by the most recent rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformDelta {
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub added_edges: Vec<EdgeId>,
    pub removed_edges: Vec<EdgeId>,
}

impl TransformDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}

/// An alert raised by the transform at `index` in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformAlert {
    pub index: usize,
    pub transform: String,
    #[serde(flatten)]
    pub alert: Alert,
}

/// A graph derived from a source graph by a chain of transforms.
#[derive(Debug)]
pub struct TransformedGraph {
    target: Graph,
    transforms: Vec<TransformConfig>,

    node_states: NodeArray<ElementState>,
    edge_states: EdgeArray<ElementState>,
    previous_node_states: NodeArray<ElementState>,
    previous_edge_states: EdgeArray<ElementState>,

    delta: TransformDelta,
    alerts: Vec<TransformAlert>,
}

impl Default for TransformedGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformedGraph {
    /// An empty target; the first rebuild reports every source element as added.
    #[must_use]
    pub fn new() -> Self {
        let target = Graph::new();
        Self {
            node_states: NodeArray::new(&target),
            edge_states: EdgeArray::new(&target),
            previous_node_states: NodeArray::new(&target),
            previous_edge_states: EdgeArray::new(&target),
            target,
            transforms: Vec::new(),
            delta: TransformDelta::default(),
            alerts: Vec::new(),
        }
    }

    /// The derived graph.
    pub fn target(&self) -> &Graph {
        &self.target
    }

    pub fn transforms(&self) -> &[TransformConfig] {
        &self.transforms
    }

    /// Replace the chain. Takes effect on the next [`TransformedGraph::rebuild`].
    pub fn set_transforms(&mut self, transforms: Vec<TransformConfig>) -> Vec<TransformConfig> {
        std::mem::replace(&mut self.transforms, transforms)
    }

    /// Clone `source` into the target, apply the chain and classify every element.
    ///
    /// Configuration errors become alerts and that transform contributes nothing.
    /// Cancellation stops the chain; states still describe the target as it is left.
    pub fn rebuild(
        &mut self,
        source: &Graph,
        attributes: &mut AttributeRegistry,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<&TransformDelta, GrafterError> {
        let span = tracing::debug_span!("rebuild", transforms = self.transforms.len());
        let _enter = span.enter();

        roll_generation(&self.node_states, &self.previous_node_states);
        roll_generation(&self.edge_states, &self.previous_edge_states);
        self.alerts.clear();
        attributes.clear_derived();

        self.target.begin_recording();
        self.target.clone_from_graph(source);

        let outcome = self.apply_chain(attributes, progress, cancel);

        let changes = self.target.take_changes();
        self.record_changes(&changes);
        self.delta = self.compute_delta();
        progress.set_progress(PROGRESS_INDETERMINATE);
        progress.clear_phase();

        outcome?;
        tracing::debug!(
            added_nodes = self.delta.added_nodes.len(),
            removed_nodes = self.delta.removed_nodes.len(),
            added_edges = self.delta.added_edges.len(),
            removed_edges = self.delta.removed_edges.len(),
            alerts = self.alerts.len(),
            "rebuild complete"
        );
        Ok(&self.delta)
    }

    fn apply_chain(
        &mut self,
        attributes: &mut AttributeRegistry,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), GrafterError> {
        for (index, config) in self.transforms.iter().enumerate() {
            cancel.check()?;
            let transform = config.create();
            let mut ctx = TransformContext::new(&mut self.target, attributes, progress, cancel);
            match transform.apply(&mut ctx) {
                Ok(changed) => {
                    tracing::debug!(index, transform = transform.name(), changed, "transform applied");
                }
                Err(e) if e.is_configuration() => {
                    tracing::warn!(index, transform = transform.name(), error = %e, "transform skipped");
                    self.alerts.push(TransformAlert {
                        index,
                        transform: transform.name().to_string(),
                        alert: Alert::from(&e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn record_changes(&self, changes: &[GraphChange]) {
        let mut nodes = self.node_states.write();
        let mut edges = self.edge_states.write();
        for change in changes {
            match *change {
                GraphChange::NodeAdded(id) => nodes[id] = nodes[id].add(),
                GraphChange::NodeRemoved(id) => nodes[id] = nodes[id].remove(),
                GraphChange::EdgeAdded(id) => edges[id] = edges[id].add(),
                GraphChange::EdgeRemoved(id) => edges[id] = edges[id].remove(),
            }
        }
    }

    fn compute_delta(&self) -> TransformDelta {
        let nodes = self.node_states.read();
        let edges = self.edge_states.read();
        TransformDelta {
            added_nodes: ids_in_state(nodes.iter(), ElementState::Added),
            removed_nodes: ids_in_state(nodes.iter(), ElementState::Removed),
            added_edges: ids_in_state(edges.iter(), ElementState::Added),
            removed_edges: ids_in_state(edges.iter(), ElementState::Removed),
        }
    }

    pub fn node_state(&self, id: NodeId) -> ElementState {
        self.node_states.get(id)
    }

    pub fn edge_state(&self, id: EdgeId) -> ElementState {
        self.edge_states.get(id)
    }

    /// State of `id` after the rebuild before last.
    pub fn previous_node_state(&self, id: NodeId) -> ElementState {
        self.previous_node_states.get(id)
    }

    pub fn previous_edge_state(&self, id: EdgeId) -> ElementState {
        self.previous_edge_states.get(id)
    }

    pub fn delta(&self) -> &TransformDelta {
        &self.delta
    }

    pub fn added_node_ids(&self) -> &[NodeId] {
        &self.delta.added_nodes
    }

    pub fn removed_node_ids(&self) -> &[NodeId] {
        &self.delta.removed_nodes
    }

    pub fn added_edge_ids(&self) -> &[EdgeId] {
        &self.delta.added_edges
    }

    pub fn removed_edge_ids(&self) -> &[EdgeId] {
        &self.delta.removed_edges
    }

    pub fn alerts(&self) -> &[TransformAlert] {
        &self.alerts
    }
}

fn roll_generation<I: ElementId>(
    current: &ElementArray<I, ElementState>,
    previous: &ElementArray<I, ElementState>,
) {
    let states = current.to_vec();
    let mut older = previous.write();
    for (slot, state) in older.as_mut_slice().iter_mut().zip(states) {
        *slot = state;
    }
    drop(older);
    current.fill(ElementState::Unchanged);
}

fn ids_in_state<'a, I: ElementId>(
    states: impl Iterator<Item = (I, &'a ElementState)>,
    wanted: ElementState,
) -> Vec<I> {
    states
        .filter(|(_, state)| **state == wanted)
        .map(|(id, _)| id)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
