//! # Property-Based Tests
//!
//! Invariants of element arrays, the undo/redo history and the transform pipeline,
//! checked with proptest.

use grafter_core::{
    Attribute, AttributeRegistry, CancellationToken, Command, CommandHistory, Condition,
    ConditionOp, EdgeId, ElementKind, FilterConfig, FnCommand, Graph, GraphTransform, NodeArray,
    NodeId, NullProgress, PercentNnConfig, PercentNnTransform, SortOrder, TransformConfig,
    TransformContext, TransformedGraph, ValueFn,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

fn noop(name: &str) -> Box<dyn Command> {
    Box::new(FnCommand::new(name, |_| Ok(())))
}

/// Build a graph with `n` nodes and the given edges (endpoints taken modulo `n`).
fn graph_from(n: usize, edges: &[(usize, usize)]) -> Graph {
    let mut graph = Graph::new();
    let nodes: Vec<NodeId> = (0..n).map(|_| graph.add_node()).collect();
    for &(s, t) in edges {
        graph
            .add_edge(nodes[s % n], nodes[t % n])
            .expect("endpoints are live");
    }
    graph
}

fn node_values(values: Vec<f64>, ignore_tails: bool) -> AttributeRegistry {
    let values = Arc::new(values);
    let mut registry = AttributeRegistry::new();
    let attribute = Attribute::node(
        "value",
        ValueFn::float(move |id: &NodeId| values.get(id.0 as usize).copied().unwrap_or(0.0)),
    );
    registry.insert(if ignore_tails {
        attribute.ignoring_tails()
    } else {
        attribute
    });
    registry
}

fn edge_weights(weights: Vec<f64>) -> AttributeRegistry {
    let weights = Arc::new(weights);
    let mut registry = AttributeRegistry::new();
    registry.insert(Attribute::edge(
        "weight",
        ValueFn::float(move |id: &EdgeId| weights.get(id.0 as usize).copied().unwrap_or(0.0)),
    ));
    registry
}

fn filtered_out(
    graph: &Graph,
    registry: &AttributeRegistry,
    threshold: f64,
    invert: bool,
) -> BTreeSet<NodeId> {
    let mut target = graph.clone();
    let mut registry = registry.clone();
    let token = CancellationToken::new();
    let mut ctx = TransformContext::new(&mut target, &mut registry, &NullProgress, &token);
    TransformConfig::Filter(FilterConfig {
        element: ElementKind::Node,
        condition: Condition::number("value", ConditionOp::Greater, threshold),
        invert,
    })
    .create()
    .apply(&mut ctx)
    .expect("filter");

    graph
        .node_ids()
        .into_iter()
        .filter(|&id| !target.contains_node(id))
        .collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Arrays track graph capacity and keep previously written values.
    #[test]
    fn arrays_grow_with_graph_and_preserve_values(steps in vec(1usize..20, 1..10)) {
        let mut graph = Graph::new();
        let array: NodeArray<usize> = NodeArray::new(&graph);
        let mut written = Vec::new();

        for step in steps {
            for _ in 0..step {
                let id = graph.add_node();
                array.set(id, id.0 as usize * 7 + 1);
                written.push(id);
            }
            prop_assert!(array.len() >= graph.node_capacity());
            for &id in &written {
                prop_assert_eq!(array.get(id), id.0 as usize * 7 + 1);
            }
        }
    }

    /// The history never holds more than the cap, and can undo iff anything was pushed.
    #[test]
    fn stack_is_bounded(pushes in 0usize..40, cap in 1usize..10) {
        let mut history = CommandHistory::new(cap);
        for i in 0..pushes {
            history.push(noop(&format!("C{i}")));
        }
        prop_assert!(history.len() <= cap);
        prop_assert_eq!(history.can_undo(), pushes > 0);
        prop_assert!(!history.can_redo());
    }

    /// Executing after k undos discards exactly those k redo entries.
    #[test]
    fn execute_after_undo_truncates_redo(pushes in 1usize..20, undos in 0usize..20) {
        let undos = undos.min(pushes);
        let mut history = CommandHistory::new(0);
        for i in 0..pushes {
            history.push(noop(&format!("C{i}")));
        }
        for _ in 0..undos {
            history.step_back();
        }
        prop_assert_eq!(history.redoable_descriptions().len(), undos);

        history.push(noop("fresh"));
        prop_assert!(!history.can_redo());
        prop_assert_eq!(history.len(), pushes - undos + 1);
        prop_assert_eq!(history.next_undo_action(), "Undo fresh".to_string());
    }

    /// Inverted filtering removes exactly the complement, tails excluded from both.
    #[test]
    fn filter_invert_removes_complement(
        values in vec(-10.0f64..10.0, 1..30),
        edges in vec((0usize..30, 0usize..30), 0..40),
        merges in vec((0usize..30, 0usize..30), 0..5),
        threshold in -10.0f64..10.0,
    ) {
        let n = values.len();
        let mut graph = graph_from(n, &edges);
        for (head, tail) in merges {
            let (head, tail) = (NodeId((head % n) as u32), NodeId((tail % n) as u32));
            if head != tail {
                graph.merge_nodes(head, &[tail]).expect("merge");
            }
        }
        let registry = node_values(values, true);

        let tails: BTreeSet<NodeId> = graph
            .node_ids()
            .into_iter()
            .filter(|&id| graph.type_of_node(id) == grafter_core::MultiElementType::Tail)
            .collect();
        let plain = filtered_out(&graph, &registry, threshold, false);
        let inverted = filtered_out(&graph, &registry, threshold, true);

        prop_assert!(plain.is_disjoint(&inverted));
        prop_assert!(plain.is_disjoint(&tails));
        prop_assert!(inverted.is_disjoint(&tails));
        let covered: BTreeSet<NodeId> = plain.union(&inverted).chain(tails.iter()).copied().collect();
        prop_assert_eq!(covered.len(), n);
    }

    /// percent = 100 keeps every edge; percent = 0 removes every edge.
    #[test]
    fn percent_nn_extremes(
        n in 1usize..15,
        edges in vec((0usize..15, 0usize..15), 0..30),
        weights in vec(0.0f64..1.0, 30),
    ) {
        for (percent, expect_all) in [(100u32, true), (0u32, false)] {
            let mut graph = graph_from(n, &edges);
            let mut registry = edge_weights(weights.clone());
            let token = CancellationToken::new();
            let mut ctx = TransformContext::new(&mut graph, &mut registry, &NullProgress, &token);
            PercentNnTransform::new(PercentNnConfig {
                attribute: "weight".to_string(),
                percent,
                minimum: 0,
                order: SortOrder::Descending,
            })
            .apply(&mut ctx)
            .expect("apply");

            let expected = if expect_all { edges.len() } else { 0 };
            prop_assert_eq!(graph.edge_count(), expected);
        }
    }

    /// Rebuilding twice with nothing changed reports no difference.
    #[test]
    fn repeated_rebuild_is_quiet(
        values in vec(-5.0f64..5.0, 1..20),
        edges in vec((0usize..20, 0usize..20), 0..30),
        threshold in -5.0f64..5.0,
    ) {
        let source = graph_from(values.len(), &edges);
        let mut registry = node_values(values, false);
        let mut transformed = TransformedGraph::new();
        transformed.set_transforms(vec![TransformConfig::Filter(FilterConfig {
            element: ElementKind::Node,
            condition: Condition::number("value", ConditionOp::Less, threshold),
            invert: false,
        })]);

        let token = CancellationToken::new();
        transformed
            .rebuild(&source, &mut registry, &NullProgress, &token)
            .expect("first");
        let delta = transformed
            .rebuild(&source, &mut registry, &NullProgress, &token)
            .expect("second");
        prop_assert!(delta.is_empty());
    }
}
