//! # Components
//!
//! Connected components of a [`Graph`], ignoring edge direction. Nodes in the same
//! merge set always share a component.
//!
//! Component ids are reassigned on every [`ComponentManager::update`]; arrays keyed
//! by component hosted on the manager keep growing with the highest id handed out.

use crate::array::{ArrayHost, ArrayRegistry};
use crate::graph::Graph;
use crate::types::{ComponentId, EdgeId, ElementId, ElementKind, NodeId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The nodes and edges of one connected component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Component {
    node_ids: Vec<NodeId>,
    edge_ids: Vec<EdgeId>,
}

impl Component {
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edge_ids.len()
    }
}

/// Computes and hosts the connected components of a graph.
#[derive(Debug)]
pub struct ComponentManager {
    components: Vec<Component>,
    node_component: BTreeMap<NodeId, ComponentId>,
    registry: Arc<ArrayRegistry>,
}

impl ArrayHost<ComponentId> for ComponentManager {
    fn array_registry(&self) -> &Arc<ArrayRegistry> {
        &self.registry
    }
}

impl ComponentManager {
    /// Compute the components of `graph`.
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        let mut manager = Self {
            components: Vec::new(),
            node_component: BTreeMap::new(),
            registry: ArrayRegistry::new(ElementKind::Component),
        };
        manager.update(graph);
        manager
    }

    /// Recompute components after `graph` changed.
    ///
    /// Components are numbered in order of their lowest node id.
    pub fn update(&mut self, graph: &Graph) {
        let capacity = graph.node_capacity();
        let mut parent: Vec<usize> = (0..capacity).collect();

        for edge_id in graph.edge_ids() {
            if let Some((source, target)) = graph.edge(edge_id) {
                union(&mut parent, source.index(), target.index());
            }
        }
        for node_id in graph.node_ids() {
            for merged in graph.merged_node_ids_for_node_id(node_id) {
                if graph.contains_node(merged) {
                    union(&mut parent, node_id.index(), merged.index());
                }
            }
        }

        let mut root_component: BTreeMap<usize, ComponentId> = BTreeMap::new();
        let mut components: Vec<Component> = Vec::new();
        let mut node_component = BTreeMap::new();

        for node_id in graph.node_ids() {
            let root = find(&mut parent, node_id.index());
            let component_id = *root_component.entry(root).or_insert_with(|| {
                components.push(Component::default());
                ComponentId::from_index(components.len() - 1)
            });
            components[component_id.index()].node_ids.push(node_id);
            node_component.insert(node_id, component_id);
        }

        for edge_id in graph.edge_ids() {
            if let Some((source, _)) = graph.edge(edge_id) {
                if let Some(component_id) = node_component.get(&source) {
                    components[component_id.index()].edge_ids.push(edge_id);
                }
            }
        }

        self.components = components;
        self.node_component = node_component;
        self.registry.grow(self.components.len());
    }

    /// Component ids in ascending order.
    pub fn component_ids(&self) -> Vec<ComponentId> {
        (0..self.components.len())
            .map(ComponentId::from_index)
            .collect()
    }

    pub fn component_by_id(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.index())
    }

    pub fn component_id_of_node(&self, id: NodeId) -> Option<ComponentId> {
        self.node_component.get(&id).copied()
    }

    #[must_use]
    pub fn num_components(&self) -> usize {
        self.components.len()
    }
}

fn find(parent: &mut [usize], mut index: usize) -> usize {
    while parent[index] != index {
        parent[index] = parent[parent[index]];
        index = parent[index];
    }
    index
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let root_a = find(parent, a);
    let root_b = find(parent, b);
    if root_a != root_b {
        let (low, high) = if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        parent[high] = low;
    }
}

// =============================================================================
// TESTS
// =============================================================================
