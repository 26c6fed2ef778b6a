//! # Attributes
//!
//! Named value accessors over nodes, edges and components.
//!
//! An attribute is a tagged accessor ([`ValueFn`]) producing integers, floats or strings
//! from an element. Accessors capture whatever immutable state they need (an element
//! array, a lookup table) so transforms can publish derived values without copying
//! them into the graph.

use crate::components::Component;
use crate::types::{EdgeId, ElementKind, GrafterError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name of the built-in component attribute counting nodes.
pub const COMPONENT_SIZE: &str = "Component Size";

/// Name of the built-in component attribute counting edges.
pub const COMPONENT_EDGES: &str = "Component Edges";

// =============================================================================
// VALUE FUNCTIONS
// =============================================================================

/// The type of value an accessor produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    String,
}

/// A shared accessor producing a value for an element of type `E`.
pub enum ValueFn<E: ?Sized> {
    Int(Arc<dyn Fn(&E) -> i64 + Send + Sync>),
    Float(Arc<dyn Fn(&E) -> f64 + Send + Sync>),
    Str(Arc<dyn Fn(&E) -> String + Send + Sync>),
}

impl<E: ?Sized> Clone for ValueFn<E> {
    fn clone(&self) -> Self {
        match self {
            ValueFn::Int(f) => ValueFn::Int(f.clone()),
            ValueFn::Float(f) => ValueFn::Float(f.clone()),
            ValueFn::Str(f) => ValueFn::Str(f.clone()),
        }
    }
}

impl<E: ?Sized> fmt::Debug for ValueFn<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueFn::{:?}", self.value_type())
    }
}

impl<E: ?Sized> ValueFn<E> {
    pub fn int(f: impl Fn(&E) -> i64 + Send + Sync + 'static) -> Self {
        ValueFn::Int(Arc::new(f))
    }

    pub fn float(f: impl Fn(&E) -> f64 + Send + Sync + 'static) -> Self {
        ValueFn::Float(Arc::new(f))
    }

    pub fn string(f: impl Fn(&E) -> String + Send + Sync + 'static) -> Self {
        ValueFn::Str(Arc::new(f))
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueFn::Int(_) => ValueType::Int,
            ValueFn::Float(_) => ValueType::Float,
            ValueFn::Str(_) => ValueType::String,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueFn::Str(_))
    }

    /// The numeric value of `element`, or `None` for string accessors.
    pub fn numeric_value_of(&self, element: &E) -> Option<f64> {
        match self {
            ValueFn::Int(f) => Some(f(element) as f64),
            ValueFn::Float(f) => Some(f(element)),
            ValueFn::Str(_) => None,
        }
    }

    /// The value of `element` rendered as text.
    pub fn string_value_of(&self, element: &E) -> String {
        match self {
            ValueFn::Int(f) => f(element).to_string(),
            ValueFn::Float(f) => f(element).to_string(),
            ValueFn::Str(f) => f(element),
        }
    }
}

/// Accessors for exactly one element kind.
#[derive(Debug, Clone)]
pub enum AttributeValues {
    Node(ValueFn<NodeId>),
    Edge(ValueFn<EdgeId>),
    Component(ValueFn<Component>),
}

impl AttributeValues {
    #[must_use]
    pub fn element_kind(&self) -> ElementKind {
        match self {
            AttributeValues::Node(_) => ElementKind::Node,
            AttributeValues::Edge(_) => ElementKind::Edge,
            AttributeValues::Component(_) => ElementKind::Component,
        }
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValues::Node(f) => f.value_type(),
            AttributeValues::Edge(f) => f.value_type(),
            AttributeValues::Component(f) => f.value_type(),
        }
    }
}

// =============================================================================
// ATTRIBUTE
// =============================================================================

/// Per-attribute behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeFlags {
    /// Transforms referencing this attribute skip tail (merged) elements.
    pub ignore_tails: bool,
}

/// A named accessor plus its metadata.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    description: String,
    flags: AttributeFlags,
    values: AttributeValues,
    derived: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, values: AttributeValues) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            flags: AttributeFlags::default(),
            values,
            derived: false,
        }
    }

    pub fn node(name: impl Into<String>, values: ValueFn<NodeId>) -> Self {
        Self::new(name, AttributeValues::Node(values))
    }

    pub fn edge(name: impl Into<String>, values: ValueFn<EdgeId>) -> Self {
        Self::new(name, AttributeValues::Edge(values))
    }

    pub fn component(name: impl Into<String>, values: ValueFn<Component>) -> Self {
        Self::new(name, AttributeValues::Component(values))
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn ignoring_tails(self) -> Self {
        self.with_flags(AttributeFlags { ignore_tails: true })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn flags(&self) -> AttributeFlags {
        self.flags
    }

    pub fn values(&self) -> &AttributeValues {
        &self.values
    }

    #[must_use]
    pub fn element_kind(&self) -> ElementKind {
        self.values.element_kind()
    }

    /// Whether a transform created this attribute during the last rebuild.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    /// Numeric value of a node, if this is a numeric node attribute.
    pub fn numeric_value_of_node(&self, id: NodeId) -> Option<f64> {
        match &self.values {
            AttributeValues::Node(f) => f.numeric_value_of(&id),
            _ => None,
        }
    }

    /// Numeric value of an edge, if this is a numeric edge attribute.
    pub fn numeric_value_of_edge(&self, id: EdgeId) -> Option<f64> {
        match &self.values {
            AttributeValues::Edge(f) => f.numeric_value_of(&id),
            _ => None,
        }
    }
}

/// Element types an attribute can be evaluated on.
pub trait AttributeElement: 'static {
    const KIND: ElementKind;

    fn value_fn(attribute: &Attribute) -> Option<&ValueFn<Self>>;
}

impl AttributeElement for NodeId {
    const KIND: ElementKind = ElementKind::Node;

    fn value_fn(attribute: &Attribute) -> Option<&ValueFn<Self>> {
        match &attribute.values {
            AttributeValues::Node(f) => Some(f),
            _ => None,
        }
    }
}

impl AttributeElement for EdgeId {
    const KIND: ElementKind = ElementKind::Edge;

    fn value_fn(attribute: &Attribute) -> Option<&ValueFn<Self>> {
        match &attribute.values {
            AttributeValues::Edge(f) => Some(f),
            _ => None,
        }
    }
}

impl AttributeElement for Component {
    const KIND: ElementKind = ElementKind::Component;

    fn value_fn(attribute: &Attribute) -> Option<&ValueFn<Self>> {
        match &attribute.values {
            AttributeValues::Component(f) => Some(f),
            _ => None,
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Attributes keyed by name.
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    attributes: BTreeMap<String, Attribute>,
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeRegistry {
    /// Create a registry holding the built-in component attributes.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            attributes: BTreeMap::new(),
        };
        registry.insert(
            Attribute::component(COMPONENT_SIZE, ValueFn::int(|c: &Component| c.num_nodes() as i64))
                .with_description("The number of nodes in the component."),
        );
        registry.insert(
            Attribute::component(COMPONENT_EDGES, ValueFn::int(|c: &Component| c.num_edges() as i64))
                .with_description("The number of edges in the component."),
        );
        registry
    }

    /// Add or replace an attribute. Returns the replaced attribute, if any.
    pub fn insert(&mut self, attribute: Attribute) -> Option<Attribute> {
        self.attributes.insert(attribute.name.clone(), attribute)
    }

    /// Register an attribute produced by a transform and return the name it was
    /// registered under.
    ///
    /// A name held by a non-derived attribute is never replaced; the derived attribute
    /// gets a numbered suffix instead. Derived attributes are dropped by
    /// [`AttributeRegistry::clear_derived`].
    pub fn create_attribute(&mut self, mut attribute: Attribute) -> String {
        attribute.derived = true;
        let requested = attribute.name.clone();
        let mut suffix = 2;
        while self
            .attributes
            .get(&attribute.name)
            .is_some_and(|existing| !existing.derived)
        {
            attribute.name = format!("{} ({})", requested, suffix);
            suffix += 1;
        }
        if attribute.name != requested {
            tracing::warn!(
                requested = %requested,
                name = %attribute.name,
                "derived attribute renamed"
            );
        }

        let name = attribute.name.clone();
        tracing::debug!(name = %name, "derived attribute registered");
        self.insert(attribute);
        name
    }

    /// Drop every derived attribute.
    pub fn clear_derived(&mut self) {
        self.attributes.retain(|_, a| !a.derived);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Names in `names` that are not registered.
    pub fn unknown_names(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter(|n| !self.contains(n))
            .cloned()
            .collect()
    }

    /// Fail with `UnknownAttribute` if any name is not registered.
    pub fn check_known(&self, names: &[String]) -> Result<(), GrafterError> {
        let unknown = self.unknown_names(names);
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(GrafterError::UnknownAttribute(unknown))
        }
    }

    /// Whether any of the named attributes asks transforms to skip tails.
    pub fn any_ignore_tails(&self, names: &[String]) -> bool {
        names
            .iter()
            .filter_map(|n| self.get(n))
            .any(|a| a.flags.ignore_tails)
    }
}

// =============================================================================
// TESTS
// =============================================================================
