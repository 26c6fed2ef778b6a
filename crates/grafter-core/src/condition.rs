//! # Conditions
//!
//! Declarative predicates over attribute values, compiled into closures against an
//! [`AttributeRegistry`].
//!
//! ```json
//! { "all": [
//!     { "attribute": "weight", "op": ">=", "value": 0.5 },
//!     { "attribute": "label", "op": "starts", "value": "gene" }
//! ] }
//! ```

use crate::attributes::{AttributeElement, AttributeRegistry, ValueFn};
use crate::types::GrafterError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A compiled condition over elements of type `E`.
pub type ConditionFn<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// Comparison operators for terminal conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "includes")]
    Includes,
    #[serde(rename = "excludes")]
    Excludes,
    #[serde(rename = "starts")]
    Starts,
    #[serde(rename = "ends")]
    Ends,
}

impl ConditionOp {
    fn is_textual(self) -> bool {
        matches!(
            self,
            ConditionOp::Includes | ConditionOp::Excludes | ConditionOp::Starts | ConditionOp::Ends
        )
    }

    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            ConditionOp::Equal => ordering == Some(Ordering::Equal),
            ConditionOp::NotEqual => ordering != Some(Ordering::Equal),
            ConditionOp::Less => ordering == Some(Ordering::Less),
            ConditionOp::Greater => ordering == Some(Ordering::Greater),
            ConditionOp::LessOrEqual => {
                matches!(ordering, Some(Ordering::Less | Ordering::Equal))
            }
            ConditionOp::GreaterOrEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            _ => false,
        }
    }
}

/// Operators taking no operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric values are not NaN; text values are non-empty.
    #[serde(rename = "has_value")]
    HasValue,
}

/// The literal side of a terminal condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

/// A condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All {
        all: Vec<Condition>,
    },
    Any {
        any: Vec<Condition>,
    },
    Not {
        not: Box<Condition>,
    },
    Terminal {
        attribute: String,
        op: ConditionOp,
        value: ConditionValue,
    },
    Unary {
        attribute: String,
        op: UnaryOp,
    },
}

impl Condition {
    pub fn terminal(attribute: impl Into<String>, op: ConditionOp, value: ConditionValue) -> Self {
        Condition::Terminal {
            attribute: attribute.into(),
            op,
            value,
        }
    }

    pub fn number(attribute: impl Into<String>, op: ConditionOp, value: f64) -> Self {
        Self::terminal(attribute, op, ConditionValue::Number(value))
    }

    pub fn text(attribute: impl Into<String>, op: ConditionOp, value: impl Into<String>) -> Self {
        Self::terminal(attribute, op, ConditionValue::Text(value.into()))
    }

    pub fn has_value(attribute: impl Into<String>) -> Self {
        Condition::Unary {
            attribute: attribute.into(),
            op: UnaryOp::HasValue,
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Condition::Not {
            not: Box::new(self),
        }
    }

    /// Every attribute name referenced in the tree, deduplicated, in first-seen order.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            Condition::All { all: children } | Condition::Any { any: children } => {
                for child in children {
                    child.collect_names(names);
                }
            }
            Condition::Not { not } => not.collect_names(names),
            Condition::Terminal { attribute, .. } | Condition::Unary { attribute, .. } => {
                if !names.contains(attribute) {
                    names.push(attribute.clone());
                }
            }
        }
    }

    /// Structural checks that need no attribute registry.
    pub fn validate(&self) -> Result<(), GrafterError> {
        match self {
            Condition::All { all: children } | Condition::Any { any: children } => {
                if children.is_empty() {
                    return Err(GrafterError::InvalidCondition(
                        "compound condition has no children".to_string(),
                    ));
                }
                children.iter().try_for_each(Condition::validate)
            }
            Condition::Not { not } => not.validate(),
            Condition::Terminal {
                attribute,
                op,
                value,
            } => {
                if attribute.is_empty() {
                    return Err(GrafterError::InvalidCondition(
                        "condition names no attribute".to_string(),
                    ));
                }
                if op.is_textual() && matches!(value, ConditionValue::Number(_)) {
                    return Err(GrafterError::InvalidCondition(format!(
                        "operator {op:?} on '{attribute}' needs a text value"
                    )));
                }
                Ok(())
            }
            Condition::Unary { attribute, .. } => {
                if attribute.is_empty() {
                    return Err(GrafterError::InvalidCondition(
                        "condition names no attribute".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Compile the tree against `registry` for elements of type `E`.
    ///
    /// Unknown attributes fail with `UnknownAttribute`; structural or type errors
    /// fail with `InvalidCondition`.
    pub fn compile<E: AttributeElement>(
        &self,
        registry: &AttributeRegistry,
    ) -> Result<ConditionFn<E>, GrafterError> {
        registry.check_known(&self.attribute_names())?;
        self.build(registry)
    }

    fn build<E: AttributeElement>(
        &self,
        registry: &AttributeRegistry,
    ) -> Result<ConditionFn<E>, GrafterError> {
        match self {
            Condition::All { all } => {
                if all.is_empty() {
                    return Err(GrafterError::InvalidCondition(
                        "'all' has no conditions".to_string(),
                    ));
                }
                let parts = all
                    .iter()
                    .map(|c| c.build::<E>(registry))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(move |e: &E| parts.iter().all(|p| p(e))))
            }
            Condition::Any { any } => {
                if any.is_empty() {
                    return Err(GrafterError::InvalidCondition(
                        "'any' has no conditions".to_string(),
                    ));
                }
                let parts = any
                    .iter()
                    .map(|c| c.build::<E>(registry))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(move |e: &E| parts.iter().any(|p| p(e))))
            }
            Condition::Not { not } => {
                let inner = not.build::<E>(registry)?;
                Ok(Box::new(move |e: &E| !inner(e)))
            }
            Condition::Terminal {
                attribute,
                op,
                value,
            } => {
                let values = value_fn_for::<E>(registry, attribute)?;
                terminal(attribute, values, *op, value.clone())
            }
            Condition::Unary { attribute, op } => {
                let values = value_fn_for::<E>(registry, attribute)?;
                match op {
                    UnaryOp::HasValue => Ok(Box::new(move |e: &E| match &values {
                        ValueFn::Str(f) => !f(e).is_empty(),
                        numeric => numeric.numeric_value_of(e).is_some_and(|v| !v.is_nan()),
                    })),
                }
            }
        }
    }
}

fn value_fn_for<E: AttributeElement>(
    registry: &AttributeRegistry,
    name: &str,
) -> Result<ValueFn<E>, GrafterError> {
    let attribute = registry
        .get(name)
        .ok_or_else(|| GrafterError::UnknownAttribute(vec![name.to_string()]))?;
    E::value_fn(attribute).cloned().ok_or_else(|| {
        GrafterError::InvalidCondition(format!(
            "attribute '{}' does not apply to {}s",
            name,
            E::KIND.name()
        ))
    })
}

fn terminal<E: AttributeElement>(
    name: &str,
    values: ValueFn<E>,
    op: ConditionOp,
    operand: ConditionValue,
) -> Result<ConditionFn<E>, GrafterError> {
    match operand {
        ConditionValue::Number(_) if op.is_textual() => Err(GrafterError::InvalidCondition(
            format!("operator {op:?} on '{name}' needs a text value"),
        )),
        ConditionValue::Number(rhs) => {
            if !values.is_numeric() {
                return Err(GrafterError::InvalidCondition(format!(
                    "attribute '{name}' is not numeric"
                )));
            }
            Ok(Box::new(move |e: &E| {
                let lhs = values.numeric_value_of(e).unwrap_or(f64::NAN);
                op.holds(lhs.partial_cmp(&rhs))
            }))
        }
        ConditionValue::Text(rhs) => {
            if !op.is_textual() && values.is_numeric() {
                return Err(GrafterError::InvalidCondition(format!(
                    "attribute '{name}' is numeric; compare it with a number"
                )));
            }
            Ok(Box::new(move |e: &E| {
                let lhs = values.string_value_of(e);
                match op {
                    ConditionOp::Includes => lhs.contains(rhs.as_str()),
                    ConditionOp::Excludes => !lhs.contains(rhs.as_str()),
                    ConditionOp::Starts => lhs.starts_with(rhs.as_str()),
                    ConditionOp::Ends => lhs.ends_with(rhs.as_str()),
                    ordered => ordered.holds(Some(lhs.as_str().cmp(rhs.as_str()))),
                }
            }))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::types::{EdgeId, NodeId};

    fn registry() -> AttributeRegistry {
        let mut registry = AttributeRegistry::new();
        registry.insert(Attribute::node(
            "degree",
            ValueFn::int(|id: &NodeId| i64::from(id.0)),
        ));
        registry.insert(Attribute::node(
            "label",
            ValueFn::string(|id: &NodeId| format!("gene{}", id.0)),
        ));
        registry.insert(Attribute::edge("weight", ValueFn::float(|_| 0.5)));
        registry
    }

    #[test]
    fn numeric_comparisons() {
        let registry = registry();
        let cond = Condition::number("degree", ConditionOp::GreaterOrEqual, 2.0)
            .compile::<NodeId>(&registry)
            .expect("compile");
        assert!(!cond(&NodeId(1)));
        assert!(cond(&NodeId(2)));
        assert!(cond(&NodeId(5)));
    }

    #[test]
    fn text_operators() {
        let registry = registry();
        let starts = Condition::text("label", ConditionOp::Starts, "gene")
            .compile::<NodeId>(&registry)
            .expect("compile");
        let ends = Condition::text("label", ConditionOp::Ends, "7")
            .compile::<NodeId>(&registry)
            .expect("compile");
        assert!(starts(&NodeId(3)));
        assert!(ends(&NodeId(7)));
        assert!(!ends(&NodeId(3)));
    }

    #[test]
    fn compound_and_negation() {
        let registry = registry();
        let cond = Condition::Any {
            any: vec![
                Condition::number("degree", ConditionOp::Less, 1.0),
                Condition::number("degree", ConditionOp::Greater, 8.0),
            ],
        }
        .negate()
        .compile::<NodeId>(&registry)
        .expect("compile");
        assert!(!cond(&NodeId(0)));
        assert!(cond(&NodeId(4)));
        assert!(!cond(&NodeId(9)));
    }

    #[test]
    fn unknown_attribute_is_reported() {
        let registry = registry();
        let result = Condition::number("missing", ConditionOp::Equal, 1.0)
            .compile::<NodeId>(&registry);
        assert!(matches!(result, Err(GrafterError::UnknownAttribute(names)) if names == vec!["missing".to_string()]));
    }

    #[test]
    fn invalid_conditions_are_rejected() {
        let registry = registry();
        assert!(matches!(
            Condition::All { all: vec![] }.compile::<NodeId>(&registry),
            Err(GrafterError::InvalidCondition(_))
        ));
        assert!(matches!(
            Condition::text("degree", ConditionOp::Equal, "x").compile::<NodeId>(&registry),
            Err(GrafterError::InvalidCondition(_))
        ));
        assert!(matches!(
            Condition::number("weight", ConditionOp::Equal, 1.0).compile::<NodeId>(&registry),
            Err(GrafterError::InvalidCondition(_))
        ));
        assert!(
            Condition::number("weight", ConditionOp::Equal, 0.5)
                .compile::<EdgeId>(&registry)
                .is_ok()
        );
    }

    #[test]
    fn validate_needs_no_registry() {
        assert!(
            Condition::number("anything", ConditionOp::Less, 3.0)
                .validate()
                .is_ok()
        );
        assert!(Condition::Any { any: vec![] }.validate().is_err());
        assert!(
            Condition::number("label", ConditionOp::Starts, 1.0)
                .negate()
                .validate()
                .is_err()
        );
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{ "all": [
            { "attribute": "degree", "op": ">", "value": 1 },
            { "attribute": "label", "op": "includes", "value": "ne" },
            { "attribute": "label", "op": "has_value" }
        ] }"#;
        let cond: Condition = serde_json::from_str(json).expect("parse");
        assert_eq!(
            cond.attribute_names(),
            vec!["degree".to_string(), "label".to_string()]
        );
        let compiled = cond.compile::<NodeId>(&registry()).expect("compile");
        assert!(compiled(&NodeId(2)));
        assert!(!compiled(&NodeId(1)));
    }
}
