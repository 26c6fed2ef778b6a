//! # Graph Import
//!
//! Loads a source graph and its attributes from JSON.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "a", "attributes": { "score": 0.9, "label": "alpha" } },
//!     { "id": "a2", "merge_into": "a" }
//!   ],
//!   "edges": [
//!     { "source": "a", "target": "b", "attributes": { "weight": 3 } }
//!   ],
//!   "ignore_tails": ["score"]
//! }
//! ```
//!
//! Attributes whose present values are all numbers become float attributes;
//! anything else becomes a string attribute. Missing values read as `0` or `""`.
//! Elements with `merge_into` become tails of the named head.

use grafter_core::{
    Attribute, AttributeRegistry, AttributeValues, EdgeId, ElementId, GrafterError, Graph, NodeId,
    Session, ValueFn,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Maximum graph file size (256 MB).
const MAX_GRAPH_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Node attribute holding each node's external id.
pub const NODE_ID_ATTRIBUTE: &str = "Id";

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    /// External id of the head this node is merged into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_into: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Only needed when another edge merges into this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_into: Option<String>,
}

/// A graph file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    /// Attributes whose transforms skip tail elements.
    #[serde(default)]
    pub ignore_tails: Vec<String>,
}

impl GraphFile {
    pub fn from_json(text: &str) -> Result<Self, GrafterError> {
        serde_json::from_str(text)
            .map_err(|e| GrafterError::Serialization(format!("Invalid graph file: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, GrafterError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            GrafterError::Io(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_GRAPH_FILE_SIZE {
            return Err(GrafterError::Serialization(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_GRAPH_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            GrafterError::Io(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Build the source graph and attribute registry.
    pub fn into_session(self) -> Result<Session, GrafterError> {
        let mut graph = Graph::new();
        let mut node_ids: HashMap<String, NodeId> = HashMap::with_capacity(self.nodes.len());
        let mut external_ids = Vec::with_capacity(self.nodes.len());

        for record in &self.nodes {
            let id = graph.add_node();
            if node_ids.insert(record.id.clone(), id).is_some() {
                return Err(GrafterError::Serialization(format!(
                    "Duplicate node id '{}'",
                    record.id
                )));
            }
            external_ids.push(record.id.clone());
        }

        let lookup_node = |name: &str| {
            node_ids.get(name).copied().ok_or_else(|| {
                GrafterError::Serialization(format!("Unknown node id '{}'", name))
            })
        };

        let mut edge_ids: HashMap<String, EdgeId> = HashMap::new();
        for record in &self.edges {
            let id = graph.add_edge(lookup_node(&record.source)?, lookup_node(&record.target)?)?;
            if let Some(name) = &record.id {
                if edge_ids.insert(name.clone(), id).is_some() {
                    return Err(GrafterError::Serialization(format!(
                        "Duplicate edge id '{}'",
                        name
                    )));
                }
            }
        }

        for (index, record) in self.nodes.iter().enumerate() {
            if let Some(head) = &record.merge_into {
                graph.merge_nodes(lookup_node(head)?, &[NodeId::from_index(index)])?;
            }
        }
        for (index, record) in self.edges.iter().enumerate() {
            if let Some(head) = &record.merge_into {
                let head = edge_ids.get(head).copied().ok_or_else(|| {
                    GrafterError::Serialization(format!("Unknown edge id '{}'", head))
                })?;
                graph.merge_edges(head, &[EdgeId::from_index(index)])?;
            }
        }

        let mut attributes = AttributeRegistry::new();
        let external_ids = Arc::new(external_ids);
        attributes.insert(
            Attribute::node(
                NODE_ID_ATTRIBUTE,
                ValueFn::string(move |id: &NodeId| {
                    external_ids.get(id.index()).cloned().unwrap_or_default()
                }),
            )
            .with_description("The node's id in the imported file."),
        );

        let node_columns = columns(self.nodes.iter().map(|r| &r.attributes));
        let edge_columns = columns(self.edges.iter().map(|r| &r.attributes));
        for (name, column) in node_columns {
            attributes.insert(column_attribute::<NodeId>(&name, column, AttributeValues::Node));
        }
        for (name, column) in edge_columns {
            attributes.insert(column_attribute::<EdgeId>(&name, column, AttributeValues::Edge));
        }

        for name in &self.ignore_tails {
            match attributes.remove(name) {
                Some(attribute) => {
                    attributes.insert(attribute.ignoring_tails());
                }
                None => tracing::warn!(attribute = %name, "ignore_tails names an unknown attribute"),
            }
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            attributes = attributes.len(),
            "graph imported"
        );
        Ok(Session::new(graph, attributes))
    }
}

// =============================================================================
// ATTRIBUTE COLUMNS
// =============================================================================

/// Per-element values of one attribute, indexed by element position.
type Column = Vec<Option<Value>>;

fn columns<'a>(
    records: impl ExactSizeIterator<Item = &'a Map<String, Value>>,
) -> BTreeMap<String, Column> {
    let len = records.len();
    let mut columns: BTreeMap<String, Column> = BTreeMap::new();
    for (index, attributes) in records.enumerate() {
        for (name, value) in attributes {
            if value.is_null() {
                continue;
            }
            let column = columns
                .entry(name.clone())
                .or_insert_with(|| vec![None; len]);
            column[index] = Some(value.clone());
        }
    }
    columns
}

fn column_attribute<E: ElementId>(
    name: &str,
    column: Column,
    wrap: fn(ValueFn<E>) -> AttributeValues,
) -> Attribute {
    let numeric = column.iter().flatten().all(Value::is_number);
    let values = if numeric {
        let numbers: Arc<Vec<f64>> = Arc::new(
            column
                .iter()
                .map(|v| v.as_ref().and_then(Value::as_f64).unwrap_or(0.0))
                .collect(),
        );
        ValueFn::float(move |id: &E| numbers.get(id.index()).copied().unwrap_or(0.0))
    } else {
        let strings: Arc<Vec<String>> = Arc::new(
            column
                .iter()
                .map(|v| match v {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect(),
        );
        ValueFn::string(move |id: &E| strings.get(id.index()).cloned().unwrap_or_default())
    };
    Attribute::new(name, wrap(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grafter_core::{MultiElementType, ValueType};

    const SAMPLE: &str = r#"{
        "nodes": [
            { "id": "a", "attributes": { "score": 1.5, "label": "alpha" } },
            { "id": "b", "attributes": { "score": 2, "label": 7 } },
            { "id": "c" },
            { "id": "a2", "merge_into": "a" }
        ],
        "edges": [
            { "id": "ab", "source": "a", "target": "b", "attributes": { "weight": 3 } },
            { "source": "b", "target": "c", "attributes": { "weight": 1 } },
            { "source": "a2", "target": "b", "merge_into": "ab" }
        ],
        "ignore_tails": ["score"]
    }"#;

    #[test]
    fn imports_structure_and_merges() {
        let session = GraphFile::from_json(SAMPLE)
            .expect("parse")
            .into_session()
            .expect("import");
        let graph = session.source();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.type_of_node(NodeId(0)), MultiElementType::Head);
        assert_eq!(graph.type_of_node(NodeId(3)), MultiElementType::Tail);
        assert_eq!(graph.type_of_edge(EdgeId(2)), MultiElementType::Tail);
    }

    #[test]
    fn infers_attribute_types() {
        let session = GraphFile::from_json(SAMPLE)
            .expect("parse")
            .into_session()
            .expect("import");
        let attributes = session.attributes();

        let score = attributes.get("score").expect("score");
        assert_eq!(score.values().value_type(), ValueType::Float);
        assert!(score.flags().ignore_tails);
        assert_eq!(score.numeric_value_of_node(NodeId(1)), Some(2.0));
        assert_eq!(score.numeric_value_of_node(NodeId(2)), Some(0.0));

        let label = attributes.get("label").expect("label");
        assert_eq!(label.values().value_type(), ValueType::String);

        let weight = attributes.get("weight").expect("weight");
        assert_eq!(weight.numeric_value_of_edge(EdgeId(0)), Some(3.0));
        assert!(attributes.contains(NODE_ID_ATTRIBUTE));
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let file = GraphFile::from_json(
            r#"{ "nodes": [{ "id": "a" }], "edges": [{ "source": "a", "target": "z" }] }"#,
        )
        .expect("parse");
        assert!(matches!(
            file.into_session(),
            Err(GrafterError::Serialization(_))
        ));
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let file =
            GraphFile::from_json(r#"{ "nodes": [{ "id": "a" }, { "id": "a" }] }"#).expect("parse");
        assert!(file.into_session().is_err());
    }
}
