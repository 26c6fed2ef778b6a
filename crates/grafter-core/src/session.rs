//! # Session Module
//!
//! A source graph, its attributes and the graph derived from it by the current
//! transform chain.
//!
//! The session is plain data: it does no locking and runs nothing in the
//! background. Applications share it with commands behind a mutex and drive
//! rebuilds from the command worker.

use crate::attributes::AttributeRegistry;
use crate::command::CancellationToken;
use crate::components::ComponentManager;
use crate::graph::{Graph, GraphObserver};
use crate::progress::ProgressSink;
use crate::transform::{TransformAlert, TransformConfig, TransformDelta, TransformedGraph};
use crate::types::{GrafterError, NodeId};
use serde::Serialize;
use std::sync::Arc;

/// Size summary of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionMetrics {
    pub source_nodes: usize,
    pub source_edges: usize,
    pub nodes: usize,
    pub edges: usize,
    pub components: usize,
    pub attributes: usize,
    pub transforms: usize,
    pub alerts: usize,
}

/// Source graph + attributes + transformed graph.
#[derive(Debug)]
pub struct Session {
    source: Graph,
    attributes: AttributeRegistry,
    transformed: TransformedGraph,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Graph::new(), AttributeRegistry::new())
    }
}

impl Session {
    /// Create a session. Call [`Session::rebuild`] to populate the derived graph.
    #[must_use]
    pub fn new(source: Graph, attributes: AttributeRegistry) -> Self {
        Self {
            source,
            attributes,
            transformed: TransformedGraph::new(),
        }
    }

    pub fn source(&self) -> &Graph {
        &self.source
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeRegistry {
        &mut self.attributes
    }

    pub fn transformed(&self) -> &TransformedGraph {
        &self.transformed
    }

    /// The derived graph.
    pub fn target(&self) -> &Graph {
        self.transformed.target()
    }

    pub fn transforms(&self) -> &[TransformConfig] {
        self.transformed.transforms()
    }

    pub fn alerts(&self) -> &[TransformAlert] {
        self.transformed.alerts()
    }

    /// Observe structural changes of the source graph.
    pub fn add_source_observer(&mut self, observer: Arc<dyn GraphObserver>) {
        self.source.add_observer(observer);
    }

    /// Replace the transform chain, returning the previous one. Does not rebuild.
    pub fn set_transforms(&mut self, transforms: Vec<TransformConfig>) -> Vec<TransformConfig> {
        self.transformed.set_transforms(transforms)
    }

    /// Re-derive the target graph from the source.
    pub fn rebuild(
        &mut self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TransformDelta, GrafterError> {
        self.transformed
            .rebuild(&self.source, &mut self.attributes, progress, cancel)
            .cloned()
    }

    /// Remove nodes from the source graph. Merged sets are removed whole.
    ///
    /// Returns the number of nodes removed. The derived graph is stale until the
    /// next rebuild.
    pub fn remove_source_nodes(&mut self, ids: &[NodeId]) -> usize {
        let ids = self.source.merged_node_ids_for_node_ids(ids);
        let removed = self.source.remove_nodes(&ids);
        tracing::debug!(requested = ids.len(), removed, "source nodes removed");
        removed
    }

    /// A structural copy of the source graph, for restoring later.
    pub fn source_snapshot(&self) -> Graph {
        self.source.clone()
    }

    /// Make the source graph structurally identical to `snapshot`.
    pub fn restore_source(&mut self, snapshot: &Graph) {
        self.source.clone_from_graph(snapshot);
    }

    pub fn metrics(&self) -> SessionMetrics {
        let target = self.target();
        SessionMetrics {
            source_nodes: self.source.node_count(),
            source_edges: self.source.edge_count(),
            nodes: target.node_count(),
            edges: target.edge_count(),
            components: ComponentManager::new(target).num_components(),
            attributes: self.attributes.len(),
            transforms: self.transforms().len(),
            alerts: self.alerts().len(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{Attribute, ValueFn};
    use crate::condition::{Condition, ConditionOp};
    use crate::progress::NullProgress;
    use crate::transform::FilterConfig;
    use crate::types::ElementKind;

    fn session() -> Session {
        let mut graph = Graph::new();
        let nodes: Vec<NodeId> = (0..4).map(|_| graph.add_node()).collect();
        graph.add_edge(nodes[0], nodes[1]).expect("edge");
        graph.add_edge(nodes[2], nodes[3]).expect("edge");
        let mut attributes = AttributeRegistry::new();
        attributes.insert(Attribute::node(
            "index",
            ValueFn::int(|id: &NodeId| i64::from(id.0)),
        ));
        Session::new(graph, attributes)
    }

    fn rebuild(session: &mut Session) -> TransformDelta {
        session
            .rebuild(&NullProgress, &CancellationToken::new())
            .expect("rebuild")
    }

    #[test]
    fn rebuild_derives_target_from_source() {
        let mut session = session();
        session.set_transforms(vec![TransformConfig::Filter(FilterConfig {
            element: ElementKind::Node,
            condition: Condition::number("index", ConditionOp::Less, 2.0),
            invert: false,
        })]);

        let delta = rebuild(&mut session);
        assert_eq!(delta.added_nodes, vec![NodeId(2), NodeId(3)]);

        let metrics = session.metrics();
        assert_eq!(metrics.source_nodes, 4);
        assert_eq!(metrics.nodes, 2);
        assert_eq!(metrics.edges, 1);
        assert_eq!(metrics.components, 1);
        assert_eq!(metrics.transforms, 1);
    }

    #[test]
    fn source_removal_and_restore() {
        let mut session = session();
        rebuild(&mut session);
        let snapshot = session.source_snapshot();

        assert_eq!(session.remove_source_nodes(&[NodeId(0)]), 1);
        let delta = rebuild(&mut session);
        assert_eq!(delta.removed_nodes, vec![NodeId(0)]);

        session.restore_source(&snapshot);
        let delta = rebuild(&mut session);
        assert_eq!(delta.added_nodes, vec![NodeId(0)]);
        assert_eq!(session.target().edge_count(), 2);
    }

    #[test]
    fn set_transforms_returns_previous_chain() {
        let mut session = session();
        let chain = vec![TransformConfig::Filter(FilterConfig {
            element: ElementKind::Component,
            condition: Condition::number("Component Size", ConditionOp::Equal, 1.0),
            invert: false,
        })];
        assert!(session.set_transforms(chain.clone()).is_empty());
        assert_eq!(session.set_transforms(Vec::new()), chain);
    }
}
