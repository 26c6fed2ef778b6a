//! # Transform Pipeline
//!
//! Derives a working graph from a source graph by applying an ordered chain of
//! transforms. Each rebuild clones the source into the target, runs every transform
//! in turn and classifies each element as Added, Removed or Unchanged relative to the
//! previous generation.
//!
//! ```text
//! source ──clone──► target ──Filter──► target ──%-NN──► target
//!                     │                                   │
//!                     └──────── recorded changes ─────────┘──► node/edge states
//! ```

mod filter;
mod percent_nn;
mod transformed_graph;

pub use filter::{FILTER_PHASE, FilterConfig, FilterTransform};
pub use percent_nn::{
    MEAN_RANK, PERCENT_NN_PHASE, PercentNnConfig, PercentNnTransform, SOURCE_RANK, SortOrder,
    TARGET_RANK,
};
pub use transformed_graph::{ElementState, TransformAlert, TransformDelta, TransformedGraph};

use crate::attributes::AttributeRegistry;
use crate::command::CancellationToken;
use crate::graph::Graph;
use crate::progress::ProgressSink;
use crate::types::GrafterError;
use serde::{Deserialize, Serialize};

// =============================================================================
// TRANSFORM TRAIT
// =============================================================================

/// Mutable view a transform works on.
pub struct TransformContext<'a> {
    pub graph: &'a mut Graph,
    pub attributes: &'a mut AttributeRegistry,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        graph: &'a mut Graph,
        attributes: &'a mut AttributeRegistry,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            graph,
            attributes,
            progress,
            cancel,
        }
    }

    pub fn progress(&self) -> &dyn ProgressSink {
        self.progress
    }

    pub fn check_cancelled(&self) -> Result<(), GrafterError> {
        self.cancel.check()
    }
}

/// One step of the pipeline.
///
/// Implementations validate their configuration before touching the graph, so a
/// configuration error leaves the target exactly as it was.
pub trait GraphTransform: Send + Sync {
    fn name(&self) -> &str;

    /// Apply to `ctx.graph`; returns whether anything changed.
    fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<bool, GrafterError>;
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Serializable description of one transform in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    Filter(FilterConfig),
    PercentNn(PercentNnConfig),
}

impl TransformConfig {
    /// Short label used in logs, alerts and command descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            TransformConfig::Filter(_) => "Filter",
            TransformConfig::PercentNn(_) => "%-NN",
        }
    }

    /// Checks that need no graph or attribute registry.
    pub fn validate(&self) -> Result<(), GrafterError> {
        match self {
            TransformConfig::Filter(config) => config.condition.validate(),
            TransformConfig::PercentNn(config) => config.validate(),
        }
    }

    pub fn create(&self) -> Box<dyn GraphTransform> {
        match self {
            TransformConfig::Filter(config) => Box::new(FilterTransform::new(config.clone())),
            TransformConfig::PercentNn(config) => {
                Box::new(PercentNnTransform::new(config.clone()))
            }
        }
    }
}

/// A chain file: `[[transform]]` tables in TOML, or `{ "transform": [...] }` in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformChain {
    #[serde(default, rename = "transform")]
    pub transforms: Vec<TransformConfig>,
}

impl TransformChain {
    /// Validate every entry; returns `(index, error)` for each failure.
    pub fn validate(&self) -> Vec<(usize, GrafterError)> {
        self.transforms
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.validate().err().map(|e| (i, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionOp};
    use crate::types::ElementKind;

    #[test]
    fn configs_deserialize_from_json() {
        let json = r#"{ "transform": [
            { "kind": "filter", "element": "edge",
              "condition": { "attribute": "weight", "op": "<", "value": 0.2 } },
            { "kind": "percent_nn", "attribute": "weight", "percent": 10, "minimum": 2,
              "order": "ascending" }
        ] }"#;
        let chain: TransformChain = serde_json::from_str(json).expect("parse");

        assert_eq!(chain.transforms.len(), 2);
        assert_eq!(
            chain.transforms[0],
            TransformConfig::Filter(FilterConfig {
                element: ElementKind::Edge,
                condition: Condition::number("weight", ConditionOp::Less, 0.2),
                invert: false,
            })
        );
        assert_eq!(chain.transforms[1].name(), "%-NN");
        assert!(chain.validate().is_empty());
    }

    #[test]
    fn chain_validation_reports_indices() {
        let chain = TransformChain {
            transforms: vec![
                TransformConfig::PercentNn(PercentNnConfig {
                    attribute: "weight".to_string(),
                    percent: 10,
                    minimum: 0,
                    order: SortOrder::Descending,
                }),
                TransformConfig::PercentNn(PercentNnConfig {
                    attribute: String::new(),
                    percent: 10,
                    minimum: 0,
                    order: SortOrder::Descending,
                }),
            ],
        };
        let errors = chain.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 1);
    }
}
