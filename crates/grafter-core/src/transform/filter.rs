//! Condition-based element removal.

use super::{GraphTransform, TransformContext};
use crate::attributes::AttributeElement;
use crate::components::{Component, ComponentManager};
use crate::condition::{Condition, ConditionFn};
use crate::primitives::{PROGRESS_INDETERMINATE, progress_percent};
use crate::types::{EdgeId, ElementKind, GrafterError, MultiElementType, NodeId};
use serde::{Deserialize, Serialize};

/// Phase label reported while filtering.
pub const FILTER_PHASE: &str = "Filtering";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub element: ElementKind,
    pub condition: Condition,
    /// Remove the elements that do *not* match instead.
    #[serde(default)]
    pub invert: bool,
}

/// Removes every element of one kind matching a condition.
///
/// All elements are evaluated before any is removed. Components expand to their
/// full merged node sets.
#[derive(Debug, Clone)]
pub struct FilterTransform {
    config: FilterConfig,
}

impl FilterTransform {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    fn compile<E: AttributeElement>(
        &self,
        ctx: &TransformContext<'_>,
    ) -> Result<ConditionFn<E>, GrafterError> {
        self.config.condition.compile::<E>(ctx.attributes)
    }

    fn filter_nodes(
        &self,
        ctx: &mut TransformContext<'_>,
        ignore_tails: bool,
    ) -> Result<bool, GrafterError> {
        let matches = self.compile::<NodeId>(ctx)?;
        let ids = ctx.graph.node_ids();
        let total = ids.len();

        let mut removees = Vec::new();
        for (done, id) in ids.into_iter().enumerate() {
            ctx.check_cancelled()?;
            if ignore_tails && ctx.graph.type_of_node(id) == MultiElementType::Tail {
                continue;
            }
            if matches(&id) ^ self.config.invert {
                removees.push(id);
            }
            ctx.progress().set_progress(progress_percent(done + 1, total));
        }

        Ok(ctx.graph.remove_nodes(&removees) > 0)
    }

    fn filter_edges(
        &self,
        ctx: &mut TransformContext<'_>,
        ignore_tails: bool,
    ) -> Result<bool, GrafterError> {
        let matches = self.compile::<EdgeId>(ctx)?;
        let ids = ctx.graph.edge_ids();
        let total = ids.len();

        let mut removees = Vec::new();
        for (done, id) in ids.into_iter().enumerate() {
            ctx.check_cancelled()?;
            if ignore_tails && ctx.graph.type_of_edge(id) == MultiElementType::Tail {
                continue;
            }
            if matches(&id) ^ self.config.invert {
                removees.push(id);
            }
            ctx.progress().set_progress(progress_percent(done + 1, total));
        }

        Ok(ctx.graph.remove_edges(&removees) > 0)
    }

    fn filter_components(&self, ctx: &mut TransformContext<'_>) -> Result<bool, GrafterError> {
        let matches = self.compile::<Component>(ctx)?;
        let components = ComponentManager::new(ctx.graph);
        let ids = components.component_ids();
        let total = ids.len();

        let mut removees = Vec::new();
        for (done, id) in ids.into_iter().enumerate() {
            ctx.check_cancelled()?;
            if let Some(component) = components.component_by_id(id) {
                if matches(component) ^ self.config.invert {
                    removees.extend_from_slice(component.node_ids());
                }
            }
            ctx.progress().set_progress(progress_percent(done + 1, total));
        }

        let removees = ctx.graph.merged_node_ids_for_node_ids(&removees);
        Ok(ctx.graph.remove_nodes(&removees) > 0)
    }
}

impl GraphTransform for FilterTransform {
    fn name(&self) -> &str {
        "Filter"
    }

    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<bool, GrafterError> {
        ctx.progress().set_phase(FILTER_PHASE);

        let names = self.config.condition.attribute_names();
        ctx.attributes.check_known(&names)?;
        let ignore_tails = ctx.attributes.any_ignore_tails(&names);

        let changed = match self.config.element {
            ElementKind::Node => self.filter_nodes(ctx, ignore_tails)?,
            ElementKind::Edge => self.filter_edges(ctx, ignore_tails)?,
            ElementKind::Component => self.filter_components(ctx)?,
        };

        ctx.progress().set_progress(PROGRESS_INDETERMINATE);
        tracing::debug!(
            element = self.config.element.name(),
            invert = self.config.invert,
            changed,
            "filter applied"
        );
        Ok(changed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
