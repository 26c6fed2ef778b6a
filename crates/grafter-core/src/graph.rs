//! # Graph
//!
//! The mutable graph the transform pipeline operates on.
//!
//! Node and edge identifiers are allocated densely and never reused, so an id seen in
//! one generation of a derived graph means the same element in the next. Each kind
//! has an [`ArrayRegistry`]; adding an element past the current capacity grows every
//! array registered on this graph before the call returns.
//!
//! Structural changes bump [`Graph::version`], notify registered [`GraphObserver`]s and,
//! while recording is enabled, are appended to a [`GraphChange`] log.

use crate::array::{ArrayHost, ArrayRegistry};
use crate::types::{EdgeId, ElementId, ElementKind, GrafterError, MultiElementType, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// CHANGE NOTIFICATION
// =============================================================================

/// A single structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphChange {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    EdgeAdded(EdgeId),
    EdgeRemoved(EdgeId),
}

/// Receives a callback after every structural change of a graph.
pub trait GraphObserver: Send + Sync {
    fn on_graph_changed(&self, version: u64);
}

// =============================================================================
// MERGE SETS
// =============================================================================

/// Groups of merged elements, keyed by the head each group was formed around.
#[derive(Debug, Clone)]
struct MergeSets<I: ElementId> {
    head_of: BTreeMap<I, I>,
    members: BTreeMap<I, BTreeSet<I>>,
}

impl<I: ElementId> Default for MergeSets<I> {
    fn default() -> Self {
        Self {
            head_of: BTreeMap::new(),
            members: BTreeMap::new(),
        }
    }
}

impl<I: ElementId> MergeSets<I> {
    fn merge(&mut self, head: I, tails: &[I]) {
        let tails: Vec<I> = tails.iter().copied().filter(|&tail| tail != head).collect();
        for &tail in &tails {
            self.remove(tail);
        }

        let group = self.head_of.get(&head).copied().unwrap_or(head);
        let members = self.members.entry(group).or_default();
        members.insert(head);
        members.extend(tails.iter().copied());
        self.head_of.insert(head, group);
        for tail in tails {
            self.head_of.insert(tail, group);
        }
    }

    fn type_of(&self, id: I) -> MultiElementType {
        match self.head_of.get(&id) {
            None => MultiElementType::Not,
            Some(head) if *head == id => MultiElementType::Head,
            Some(_) => MultiElementType::Tail,
        }
    }

    fn merged(&self, id: I) -> Vec<I> {
        match self.head_of.get(&id).and_then(|head| self.members.get(head)) {
            Some(members) => members.iter().copied().collect(),
            None => vec![id],
        }
    }

    /// Drop `id` from its set. A set left with one member dissolves; a set that loses
    /// its head is re-keyed around its lowest surviving member.
    fn remove(&mut self, id: I) {
        let Some(group) = self.head_of.remove(&id) else {
            return;
        };
        let Some(mut members) = self.members.remove(&group) else {
            return;
        };
        members.remove(&id);

        let head = match members.first() {
            Some(_) if members.len() == 1 => None,
            Some(&first) if group == id => Some(first),
            Some(_) => Some(group),
            None => None,
        };
        let Some(head) = head else {
            for member in members {
                self.head_of.remove(&member);
            }
            return;
        };

        for &member in &members {
            self.head_of.insert(member, head);
        }
        self.members.insert(head, members);
    }
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

#[derive(Debug, Clone, Default)]
struct NodeData {
    in_edges: BTreeSet<EdgeId>,
    out_edges: BTreeSet<EdgeId>,
}

#[derive(Debug, Clone, Copy)]
struct EdgeData {
    source: NodeId,
    target: NodeId,
}

/// A directed multigraph with dense, stable identifiers.
pub struct Graph {
    nodes: Vec<Option<NodeData>>,
    edges: Vec<Option<EdgeData>>,
    node_count: usize,
    edge_count: usize,

    merged_nodes: MergeSets<NodeId>,
    merged_edges: MergeSets<EdgeId>,

    node_registry: Arc<ArrayRegistry>,
    edge_registry: Arc<ArrayRegistry>,

    version: u64,
    recording: Option<Vec<GraphChange>>,
    observers: Vec<Arc<dyn GraphObserver>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_count: 0,
            edge_count: 0,
            merged_nodes: MergeSets::default(),
            merged_edges: MergeSets::default(),
            node_registry: ArrayRegistry::new(ElementKind::Node),
            edge_registry: ArrayRegistry::new(ElementKind::Edge),
            version: 0,
            recording: None,
            observers: Vec::new(),
        }
    }
}

/// Cloning copies the structure only. The clone gets fresh array registries and no
/// observers; arrays registered on `self` stay with `self`.
impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            node_count: self.node_count,
            edge_count: self.edge_count,
            merged_nodes: self.merged_nodes.clone(),
            merged_edges: self.merged_edges.clone(),
            node_registry: ArrayRegistry::with_capacity(ElementKind::Node, self.nodes.len()),
            edge_registry: ArrayRegistry::with_capacity(ElementKind::Edge, self.edges.len()),
            version: self.version,
            recording: None,
            observers: Vec::new(),
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count)
            .field("edges", &self.edge_count)
            .field("node_capacity", &self.node_capacity())
            .field("edge_capacity", &self.edge_capacity())
            .field("version", &self.version)
            .finish()
    }
}

impl ArrayHost<NodeId> for Graph {
    fn array_registry(&self) -> &Arc<ArrayRegistry> {
        &self.node_registry
    }
}

impl ArrayHost<EdgeId> for Graph {
    fn array_registry(&self) -> &Arc<ArrayRegistry> {
        &self.edge_registry
    }
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Live node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId::from_index(i))
            .collect()
    }

    /// Live edge ids in ascending order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| EdgeId::from_index(i))
            .collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Capacity for node-keyed arrays; at least one past the highest node id ever allocated.
    #[must_use]
    pub fn node_capacity(&self) -> usize {
        self.node_registry.capacity()
    }

    /// Capacity for edge-keyed arrays.
    #[must_use]
    pub fn edge_capacity(&self) -> usize {
        self.edge_registry.capacity()
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.index()), Some(Some(_)))
    }

    #[must_use]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        matches!(self.edges.get(id.index()), Some(Some(_)))
    }

    /// The `(source, target)` endpoints of a live edge.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges
            .get(id.index())?
            .as_ref()
            .map(|e| (e.source, e.target))
    }

    /// Incident edges of a node, outgoing and incoming, in ascending order.
    ///
    /// A self-loop appears once.
    pub fn edge_ids_for_node(&self, id: NodeId) -> Vec<EdgeId> {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node
                .out_edges
                .union(&node.in_edges)
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of incident edge endpoints (a self-loop counts twice).
    #[must_use]
    pub fn degree(&self, id: NodeId) -> usize {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node.in_edges.len() + node.out_edges.len(),
            _ => 0,
        }
    }

    /// Distinct neighbours of a node, ignoring direction.
    pub fn neighbours(&self, id: NodeId) -> Vec<NodeId> {
        let mut neighbours = BTreeSet::new();
        for edge_id in self.edge_ids_for_node(id) {
            if let Some((source, target)) = self.edge(edge_id) {
                neighbours.insert(if source == id { target } else { source });
            }
        }
        neighbours.into_iter().collect()
    }

    #[must_use]
    pub fn type_of_node(&self, id: NodeId) -> MultiElementType {
        self.merged_nodes.type_of(id)
    }

    #[must_use]
    pub fn type_of_edge(&self, id: EdgeId) -> MultiElementType {
        self.merged_edges.type_of(id)
    }

    /// The full merged set containing `id`, or just `id` if it is not merged.
    pub fn merged_node_ids_for_node_id(&self, id: NodeId) -> Vec<NodeId> {
        self.merged_nodes.merged(id)
    }

    pub fn merged_edge_ids_for_edge_id(&self, id: EdgeId) -> Vec<EdgeId> {
        self.merged_edges.merged(id)
    }

    /// Expand every id to its merged set; the result is sorted and deduplicated.
    pub fn merged_node_ids_for_node_ids(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let expanded: BTreeSet<NodeId> = ids
            .iter()
            .flat_map(|&id| self.merged_nodes.merged(id))
            .collect();
        expanded.into_iter().collect()
    }

    /// Structural version; increases on every change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Add a node and return its new id.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.insert_node_at(id);
        self.changed();
        id
    }

    /// Add an edge between two live nodes.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GrafterError> {
        for node in [source, target] {
            if !self.contains_node(node) {
                return Err(GrafterError::NodeNotFound(node));
            }
        }
        let id = EdgeId::from_index(self.edges.len());
        self.insert_edge_at(id, source, target);
        self.changed();
        Ok(id)
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GrafterError> {
        if !self.contains_node(id) {
            return Err(GrafterError::NodeNotFound(id));
        }
        self.erase_node(id);
        self.changed();
        Ok(())
    }

    /// Remove every live node in `ids`; ids that are not live are skipped.
    ///
    /// Returns the number of nodes removed. Observers are notified once.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> usize {
        let mut removed = 0;
        for &id in ids {
            if self.contains_node(id) {
                self.erase_node(id);
                removed += 1;
            }
        }
        if removed > 0 {
            self.changed();
        }
        removed
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(), GrafterError> {
        if !self.contains_edge(id) {
            return Err(GrafterError::EdgeNotFound(id));
        }
        self.erase_edge(id);
        self.changed();
        Ok(())
    }

    /// Remove every live edge in `ids`; returns the number removed.
    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> usize {
        let mut removed = 0;
        for &id in ids {
            if self.contains_edge(id) {
                self.erase_edge(id);
                removed += 1;
            }
        }
        if removed > 0 {
            self.changed();
        }
        removed
    }

    /// Merge `tails` into the set headed by `head`.
    pub fn merge_nodes(&mut self, head: NodeId, tails: &[NodeId]) -> Result<(), GrafterError> {
        for &id in std::iter::once(&head).chain(tails) {
            if !self.contains_node(id) {
                return Err(GrafterError::NodeNotFound(id));
            }
        }
        self.merged_nodes.merge(head, tails);
        self.changed();
        Ok(())
    }

    pub fn merge_edges(&mut self, head: EdgeId, tails: &[EdgeId]) -> Result<(), GrafterError> {
        for &id in std::iter::once(&head).chain(tails) {
            if !self.contains_edge(id) {
                return Err(GrafterError::EdgeNotFound(id));
            }
        }
        self.merged_edges.merge(head, tails);
        self.changed();
        Ok(())
    }

    /// Make `self` structurally identical to `other`, keeping ids and this graph's arrays.
    ///
    /// Only the difference is applied, so a recording graph logs exactly the elements
    /// that appeared or disappeared.
    pub fn clone_from_graph(&mut self, other: &Graph) {
        self.node_registry.grow(other.nodes.len());
        self.edge_registry.grow(other.edges.len());

        let mut changed = false;

        for index in 0..self.edges.len() {
            let id = EdgeId::from_index(index);
            let keep = match (self.edge(id), other.edge(id)) {
                (Some(mine), Some(theirs)) => mine == theirs,
                (Some(_), None) => false,
                (None, _) => true,
            };
            if !keep {
                self.erase_edge(id);
                changed = true;
            }
        }

        for index in 0..self.nodes.len() {
            let id = NodeId::from_index(index);
            if self.contains_node(id) && !other.contains_node(id) {
                self.erase_node(id);
                changed = true;
            }
        }

        for id in other.node_ids() {
            if !self.contains_node(id) {
                self.insert_node_at(id);
                changed = true;
            }
        }

        for id in other.edge_ids() {
            if !self.contains_edge(id) {
                if let Some((source, target)) = other.edge(id) {
                    self.insert_edge_at(id, source, target);
                    changed = true;
                }
            }
        }

        self.merged_nodes = other.merged_nodes.clone();
        self.merged_edges = other.merged_edges.clone();

        if changed {
            self.changed();
        }
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    /// Register an observer called after every structural change.
    pub fn add_observer(&mut self, observer: Arc<dyn GraphObserver>) {
        self.observers.push(observer);
    }

    /// Start (or restart) logging structural changes.
    pub fn begin_recording(&mut self) {
        self.recording = Some(Vec::new());
    }

    /// Stop logging and return everything recorded since `begin_recording`.
    pub fn take_changes(&mut self) -> Vec<GraphChange> {
        self.recording.take().unwrap_or_default()
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn record(&mut self, change: GraphChange) {
        if let Some(log) = self.recording.as_mut() {
            log.push(change);
        }
    }

    fn changed(&mut self) {
        self.version = self.version.saturating_add(1);
        for observer in &self.observers {
            observer.on_graph_changed(self.version);
        }
    }

    fn insert_node_at(&mut self, id: NodeId) {
        let index = id.index();
        if self.nodes.len() <= index {
            self.nodes.resize_with(index + 1, || None);
            self.node_registry.grow(self.nodes.len());
        }
        self.nodes[index] = Some(NodeData::default());
        self.node_count += 1;
        self.record(GraphChange::NodeAdded(id));
    }

    fn insert_edge_at(&mut self, id: EdgeId, source: NodeId, target: NodeId) {
        let index = id.index();
        if self.edges.len() <= index {
            self.edges.resize_with(index + 1, || None);
            self.edge_registry.grow(self.edges.len());
        }
        self.edges[index] = Some(EdgeData { source, target });
        if let Some(Some(node)) = self.nodes.get_mut(source.index()) {
            node.out_edges.insert(id);
        }
        if let Some(Some(node)) = self.nodes.get_mut(target.index()) {
            node.in_edges.insert(id);
        }
        self.edge_count += 1;
        self.record(GraphChange::EdgeAdded(id));
    }

    fn erase_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if let Some(Some(node)) = self.nodes.get_mut(edge.source.index()) {
            node.out_edges.remove(&id);
        }
        if let Some(Some(node)) = self.nodes.get_mut(edge.target.index()) {
            node.in_edges.remove(&id);
        }
        self.merged_edges.remove(id);
        self.edge_count -= 1;
        self.record(GraphChange::EdgeRemoved(id));
    }

    fn erase_node(&mut self, id: NodeId) {
        for edge_id in self.edge_ids_for_node(id) {
            self.erase_edge(edge_id);
        }
        if let Some(slot) = self.nodes.get_mut(id.index()) {
            if slot.take().is_some() {
                self.merged_nodes.remove(id);
                self.node_count -= 1;
                self.record(GraphChange::NodeRemoved(id));
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
