//! JSON-LD Normalizer
//!
//! Three transformations keep every stored graph in the same shape:
//!
//! ```text
//! input document
//!     |
//! [flatten]    - hoist embedded nodes, generate blank ids,
//!     |          promote scalars to arrays of value objects
//! [compress]   - rewrite IRIs to z:<n> tokens via the dictionary
//!     |
//! [validate]   - array-valued predicate invariant
//!     |
//! store
//! ```
//!
//! Expansion is the inverse transform applied on egress. Two modes exist:
//! deep-query expansion (query bindings, decodes tokens embedded in string
//! values) and deep-graph expansion (graph retrieval, decodes only exact
//! `z:<n>` strings).

mod codec;
mod flatten;

pub use codec::{compress_dataset, compress_node, expand_graph_value, expand_query_value};
pub use flatten::flatten;

use serde_json::{Map, Value};

use crate::error::{UrdfError, UrdfResult};

/// A normalized JSON-LD node: at most one `@id`, `@type` always an array,
/// every predicate an array of value objects.
pub type Node = Map<String, Value>;

/// A flattened dataset: named-graph slices in document order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub graphs: Vec<(String, Vec<Node>)>,
}

impl Dataset {
    /// Total node count across all slices.
    pub fn node_count(&self) -> usize {
        self.graphs.iter().map(|(_, nodes)| nodes.len()).sum()
    }
}

/// True for objects carrying `@value` (literals); these are left alone by
/// flattening and compression of their payload.
pub fn is_value_object(obj: &Map<String, Value>) -> bool {
    obj.contains_key("@value")
}

/// True for reference-only objects (`@id` and nothing else).
pub fn is_reference(obj: &Map<String, Value>) -> bool {
    obj.len() == 1 && obj.contains_key("@id")
}

/// True for embedded objects that must be hoisted to the top of their graph:
/// anything carrying `@type` or at least one non-keyword predicate.
pub fn is_node_like(obj: &Map<String, Value>) -> bool {
    if is_value_object(obj) {
        return false;
    }
    obj.keys().any(|k| k == "@type" || !k.starts_with('@'))
}

/// Wraps a scalar into a literal value object.
pub fn wrap_value(v: Value) -> Value {
    match v {
        Value::Object(_) => v,
        other => {
            let mut obj = Map::new();
            obj.insert("@value".to_string(), other);
            Value::Object(obj)
        }
    }
}

/// The node identifier, when present.
pub fn node_id(node: &Node) -> Option<&str> {
    node.get("@id").and_then(Value::as_str)
}

/// The `@type` members of a node, tolerating the scalar form.
pub fn node_types(node: &Node) -> Vec<&str> {
    match node.get("@type") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => vec![s.as_str()],
        _ => Vec::new(),
    }
}

/// True when the node's `@type` includes the class.
pub fn has_type(node: &Node, class: &str) -> bool {
    node_types(node).iter().any(|t| *t == class)
}

/// First value object under a predicate.
pub fn first_object<'a>(node: &'a Node, predicate: &str) -> Option<&'a Map<String, Value>> {
    match node.get(predicate) {
        Some(Value::Array(items)) => items.first().and_then(Value::as_object),
        Some(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// First literal `@value` string under a predicate.
pub fn first_string<'a>(node: &'a Node, predicate: &str) -> Option<&'a str> {
    first_object(node, predicate)
        .and_then(|obj| obj.get("@value"))
        .and_then(Value::as_str)
}

/// First `@id` reference under a predicate.
pub fn first_reference<'a>(node: &'a Node, predicate: &str) -> Option<&'a str> {
    first_object(node, predicate)
        .and_then(|obj| obj.get("@id"))
        .and_then(Value::as_str)
}

/// Enforces the store-wide contract: in every node, every key other than
/// `@id` maps to an array. Producers violating it are rejected before any
/// load reaches the store.
pub fn validate_array_valued(nodes: &[Node]) -> UrdfResult<()> {
    for node in nodes {
        let id = node_id(node).unwrap_or("<anonymous>");
        for (key, value) in node {
            if key == "@id" {
                continue;
            }
            if !value.is_array() {
                return Err(UrdfError::schema(format!(
                    "predicate {key} of node {id} is not array-valued"
                )));
            }
        }
    }
    Ok(())
}
