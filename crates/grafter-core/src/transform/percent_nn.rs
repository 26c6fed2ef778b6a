//! Percentile nearest-neighbour edge pruning.
//!
//! Every node keeps its top `percent`% incident edges (at least `minimum`) ranked by a
//! numeric edge attribute. An edge survives if either endpoint keeps it. Surviving
//! edges are ranked from both ends and the ranks are published as derived attributes.

use super::{GraphTransform, TransformContext};
use crate::array::EdgeArray;
use crate::attributes::{Attribute, AttributeValues, ValueFn};
use crate::primitives::{PROGRESS_INDETERMINATE, progress_percent};
use crate::types::{EdgeId, GrafterError, MultiElementType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Phase label reported while ranking.
pub const PERCENT_NN_PHASE: &str = "%-NN";

pub const SOURCE_RANK: &str = "%-NN Source Rank";
pub const TARGET_RANK: &str = "%-NN Target Rank";
pub const MEAN_RANK: &str = "%-NN Mean Rank";

/// Direction edges are ranked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentNnConfig {
    /// Numeric edge attribute to rank by.
    pub attribute: String,
    /// Share of each node's incident edges to keep, `0..=100`.
    pub percent: u32,
    /// Lower bound on the number of edges kept per node.
    #[serde(default)]
    pub minimum: usize,
    #[serde(default)]
    pub order: SortOrder,
}

impl PercentNnConfig {
    pub fn validate(&self) -> Result<(), GrafterError> {
        if self.attribute.is_empty() {
            return Err(GrafterError::InvalidParameter(
                "no attribute selected".to_string(),
            ));
        }
        if self.percent > 100 {
            return Err(GrafterError::InvalidParameter(format!(
                "percent must be between 0 and 100, got {}",
                self.percent
            )));
        }
        Ok(())
    }

    /// Number of edges a node with `count` incident edges keeps.
    #[must_use]
    pub fn k_count(&self, count: usize) -> usize {
        let share = count.saturating_mul(self.percent as usize) / 100;
        share.max(self.minimum).min(count)
    }

    fn compare(&self, a: f64, b: f64) -> Ordering {
        match self.order {
            SortOrder::Ascending => a.total_cmp(&b),
            SortOrder::Descending => b.total_cmp(&a),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PercentNnTransform {
    config: PercentNnConfig,
}

impl PercentNnTransform {
    pub fn new(config: PercentNnConfig) -> Self {
        Self { config }
    }
}

/// Mean of the non-zero ranks; `0.0` if neither endpoint ranked the edge.
#[allow(clippy::float_arithmetic)]
fn mean_rank(source: u32, target: u32) -> f64 {
    match (source, target) {
        (0, 0) => 0.0,
        (rank, 0) | (0, rank) => f64::from(rank),
        (s, t) => (f64::from(s) + f64::from(t)) * 0.5,
    }
}

impl GraphTransform for PercentNnTransform {
    fn name(&self) -> &str {
        "%-NN"
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<bool, GrafterError> {
        ctx.progress().set_phase(PERCENT_NN_PHASE);
        self.config.validate()?;

        let name = self.config.attribute.as_str();
        let attribute = ctx
            .attributes
            .get(name)
            .ok_or_else(|| GrafterError::UnknownAttribute(vec![name.to_string()]))?;
        let values = match attribute.values() {
            AttributeValues::Edge(f) if f.is_numeric() => f.clone(),
            _ => {
                return Err(GrafterError::InvalidParameter(format!(
                    "'{name}' is not a numeric edge attribute"
                )));
            }
        };
        let ignore_tails = attribute.flags().ignore_tails;

        let graph = &*ctx.graph;
        let source_ranks: EdgeArray<u32> = EdgeArray::new(graph);
        let target_ranks: EdgeArray<u32> = EdgeArray::new(graph);
        let kept: EdgeArray<bool> = EdgeArray::new(graph);

        let node_ids = graph.node_ids();
        let total = node_ids.len();
        for (done, node) in node_ids.into_iter().enumerate() {
            ctx.check_cancelled()?;

            let mut edges: Vec<(EdgeId, f64)> = graph
                .edge_ids_for_node(node)
                .into_iter()
                .filter(|&e| !(ignore_tails && graph.type_of_edge(e) == MultiElementType::Tail))
                .map(|e| (e, values.numeric_value_of(&e).unwrap_or(f64::NAN)))
                .collect();

            let k = self.config.k_count(edges.len());
            let by_value = |a: &(EdgeId, f64), b: &(EdgeId, f64)| {
                self.config.compare(a.1, b.1).then(a.0.cmp(&b.0))
            };
            if k < edges.len() {
                edges.select_nth_unstable_by(k, by_value);
                edges.truncate(k);
            }
            edges.sort_unstable_by(by_value);

            for (position, &(edge, _)) in edges.iter().enumerate() {
                let rank = position as u32 + 1;
                if let Some((source, target)) = graph.edge(edge) {
                    // A self-loop is ranked as outgoing only.
                    if source == node {
                        source_ranks.set(edge, rank);
                    } else if target == node {
                        target_ranks.set(edge, rank);
                    }
                }
                kept.set(edge, true);
            }

            ctx.progress().set_progress(progress_percent(done + 1, total));
        }

        let removees: Vec<EdgeId> = graph
            .edge_ids()
            .into_iter()
            .filter(|&e| !kept.get(e))
            .filter(|&e| !(ignore_tails && graph.type_of_edge(e) == MultiElementType::Tail))
            .collect();

        let mean_ranks: EdgeArray<f64> = EdgeArray::new(graph);
        {
            let sources = source_ranks.read();
            let targets = target_ranks.read();
            let mut means = mean_ranks.write();
            for edge in graph.edge_ids() {
                means.set(edge, mean_rank(sources[edge], targets[edge]));
            }
        }

        let removed = ctx.graph.remove_edges(&removees);

        ctx.attributes.create_attribute(
            Attribute::edge(
                SOURCE_RANK,
                ValueFn::int(move |e: &EdgeId| i64::from(source_ranks.get(*e))),
            )
            .with_description("The ranking given by k-NN, relative to its source node."),
        );
        ctx.attributes.create_attribute(
            Attribute::edge(
                TARGET_RANK,
                ValueFn::int(move |e: &EdgeId| i64::from(target_ranks.get(*e))),
            )
            .with_description("The ranking given by k-NN, relative to its target node."),
        );
        ctx.attributes.create_attribute(
            Attribute::edge(MEAN_RANK, ValueFn::float(move |e: &EdgeId| mean_ranks.get(*e)))
                .with_description("The mean ranking given by k-NN."),
        );

        ctx.progress().set_progress(PROGRESS_INDETERMINATE);
        tracing::debug!(
            attribute = name,
            percent = self.config.percent,
            minimum = self.config.minimum,
            removed,
            "%-NN applied"
        );
        Ok(removed > 0)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeRegistry;
    use crate::command::CancellationToken;
    use crate::graph::Graph;
    use crate::progress::NullProgress;
    use crate::types::NodeId;
    use std::sync::Arc;

    /// A star around node 0 with weights `values`, one edge per value.
    fn star(values: &[f64]) -> (Graph, AttributeRegistry) {
        let mut graph = Graph::new();
        let hub = graph.add_node();
        for _ in values {
            let leaf = graph.add_node();
            graph.add_edge(hub, leaf).expect("edge");
        }
        let weights: Arc<Vec<f64>> = Arc::new(values.to_vec());
        let mut registry = AttributeRegistry::new();
        registry.insert(Attribute::edge(
            "weight",
            ValueFn::float(move |e: &EdgeId| weights.get(e.0 as usize).copied().unwrap_or(0.0)),
        ));
        (graph, registry)
    }

    fn config(percent: u32, minimum: usize, order: SortOrder) -> PercentNnConfig {
        PercentNnConfig {
            attribute: "weight".to_string(),
            percent,
            minimum,
            order,
        }
    }

    fn run(
        graph: &mut Graph,
        registry: &mut AttributeRegistry,
        config: PercentNnConfig,
    ) -> Result<bool, GrafterError> {
        let token = CancellationToken::new();
        let mut ctx = TransformContext::new(graph, registry, &NullProgress, &token);
        PercentNnTransform::new(config).apply(&mut ctx)
    }

    fn rank(registry: &AttributeRegistry, name: &str, edge: EdgeId) -> Option<f64> {
        registry
            .get(name)
            .and_then(|a| a.numeric_value_of_edge(edge))
    }

    #[test]
    fn k_count_uses_floor_and_minimum() {
        let c = config(50, 1, SortOrder::Ascending);
        assert_eq!(c.k_count(4), 2);
        assert_eq!(c.k_count(1), 1);
        assert_eq!(config(10, 0, SortOrder::Ascending).k_count(9), 0);
        assert_eq!(config(0, 5, SortOrder::Ascending).k_count(3), 3);
    }

    #[test]
    fn ranks_lowest_values_first_when_ascending() {
        // Leaves have a single edge and keep it, so rank from the hub's side only.
        let (mut graph, mut registry) = star(&[5.0, 1.0, 3.0, 2.0]);
        run(&mut graph, &mut registry, config(50, 1, SortOrder::Ascending)).expect("apply");

        assert_eq!(rank(&registry, SOURCE_RANK, EdgeId(1)), Some(1.0));
        assert_eq!(rank(&registry, SOURCE_RANK, EdgeId(3)), Some(2.0));
        assert_eq!(rank(&registry, SOURCE_RANK, EdgeId(0)), Some(0.0));
        assert_eq!(rank(&registry, TARGET_RANK, EdgeId(0)), Some(1.0));
        assert_eq!(rank(&registry, MEAN_RANK, EdgeId(1)), Some(1.0));
        assert_eq!(rank(&registry, MEAN_RANK, EdgeId(3)), Some(1.5));
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn edges_kept_by_neither_end_are_removed() {
        let mut graph = Graph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        let ab = graph.add_edge(a, b).expect("edge");
        let bc = graph.add_edge(b, c).expect("edge");
        let ca = graph.add_edge(c, a).expect("edge");
        let weights = [3.0, 2.0, 1.0];
        let mut registry = AttributeRegistry::new();
        registry.insert(Attribute::edge(
            "weight",
            ValueFn::float(move |e: &EdgeId| weights[e.0 as usize]),
        ));

        // Each node keeps only its heaviest edge: a and b keep ab, c keeps bc.
        run(&mut graph, &mut registry, config(50, 0, SortOrder::Descending)).expect("apply");

        assert!(graph.contains_edge(ab));
        assert!(graph.contains_edge(bc));
        assert!(!graph.contains_edge(ca));
        assert_eq!(rank(&registry, MEAN_RANK, ab), Some(1.0));
    }

    #[test]
    fn full_percent_keeps_everything_and_zero_removes_everything() {
        let (mut graph, mut registry) = star(&[1.0, 2.0, 3.0]);
        let changed =
            run(&mut graph, &mut registry, config(100, 0, SortOrder::Descending)).expect("apply");
        assert!(!changed);
        assert_eq!(graph.edge_count(), 3);

        let (mut graph, mut registry) = star(&[1.0, 2.0, 3.0]);
        run(&mut graph, &mut registry, config(0, 0, SortOrder::Descending)).expect("apply");
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn tail_edges_are_never_removed_when_ignored() {
        let mut graph = Graph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let head = graph.add_edge(a, b).expect("edge");
        let tail = graph.add_edge(a, b).expect("edge");
        graph.merge_edges(head, &[tail]).expect("merge");
        let mut registry = AttributeRegistry::new();
        registry.insert(Attribute::edge("weight", ValueFn::float(|_| 1.0)).ignoring_tails());

        run(&mut graph, &mut registry, config(0, 0, SortOrder::Descending)).expect("apply");

        assert!(!graph.contains_edge(head));
        assert!(graph.contains_edge(tail));
    }

    #[test]
    fn configuration_errors_leave_graph_untouched() {
        let (mut graph, mut registry) = star(&[1.0, 2.0]);
        registry.insert(Attribute::node("label", ValueFn::string(|n: &NodeId| n.to_string())));
        let version = graph.version();

        let empty = PercentNnConfig {
            attribute: String::new(),
            ..config(10, 0, SortOrder::Ascending)
        };
        assert!(matches!(
            run(&mut graph, &mut registry, empty),
            Err(GrafterError::InvalidParameter(_))
        ));

        let wrong_kind = PercentNnConfig {
            attribute: "label".to_string(),
            ..config(10, 0, SortOrder::Ascending)
        };
        assert!(matches!(
            run(&mut graph, &mut registry, wrong_kind),
            Err(GrafterError::InvalidParameter(_))
        ));

        let missing = PercentNnConfig {
            attribute: "nope".to_string(),
            ..config(10, 0, SortOrder::Ascending)
        };
        assert!(matches!(
            run(&mut graph, &mut registry, missing),
            Err(GrafterError::UnknownAttribute(_))
        ));
        assert_eq!(graph.version(), version);
        assert!(!registry.contains(SOURCE_RANK));
    }

    #[test]
    fn self_loops_get_a_source_rank_only() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let other = graph.add_node();
        let looped = graph.add_edge(node, node).expect("edge");
        graph.add_edge(node, other).expect("edge");
        let mut registry = AttributeRegistry::new();
        registry.insert(Attribute::edge(
            "weight",
            ValueFn::float(|e: &EdgeId| f64::from(e.0)),
        ));

        run(&mut graph, &mut registry, config(100, 0, SortOrder::Ascending)).expect("apply");

        assert_eq!(rank(&registry, SOURCE_RANK, looped), Some(1.0));
        assert_eq!(rank(&registry, TARGET_RANK, looped), Some(0.0));
        assert_eq!(rank(&registry, MEAN_RANK, looped), Some(1.0));
    }

    #[test]
    fn mean_rank_handles_single_and_double_rankings() {
        assert_eq!(mean_rank(0, 0), 0.0);
        assert_eq!(mean_rank(3, 0), 3.0);
        assert_eq!(mean_rank(0, 2), 2.0);
        assert_eq!(mean_rank(1, 4), 2.5);
    }
}
