//! Lossless JSON-LD flattening.
//!
//! Every node reachable through the document is lifted to the top of its
//! containing `@graph`; references between nodes become `{"@id": ...}`
//! objects. Value objects and reference-only objects are left in place.
//! Nodes without an `@id` receive a generated blank-node id that does not
//! collide with any id already present in the slice.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{UrdfError, UrdfResult};

use super::{is_node_like, is_reference, is_value_object, Dataset, Node};

/// Flattens an input document into named-graph slices.
///
/// Accepted shapes: a single node object, an array of nodes, a graph object
/// `{"@id": gid, "@graph": [...]}`, or an array mixing graph objects and
/// bare nodes. Bare nodes land in `default_gid`.
pub fn flatten(doc: &Value, default_gid: &str) -> UrdfResult<Dataset> {
    let mut slices: Vec<(String, Vec<Value>)> = Vec::new();
    let mut push_slice = |gid: String, nodes: Vec<Value>| {
        if let Some((_, existing)) = slices.iter_mut().find(|(g, _)| *g == gid) {
            existing.extend(nodes);
        } else {
            slices.push((gid, nodes));
        }
    };

    match doc {
        Value::Array(items) => {
            for item in items {
                match item.as_object() {
                    Some(obj) if obj.contains_key("@graph") => {
                        let (gid, nodes) = graph_slice(obj, default_gid)?;
                        push_slice(gid, nodes);
                    }
                    Some(_) => push_slice(default_gid.to_string(), vec![item.clone()]),
                    None => {
                        return Err(UrdfError::schema(
                            "dataset array entries must be objects",
                        ))
                    }
                }
            }
        }
        Value::Object(obj) if obj.contains_key("@graph") => {
            let (gid, nodes) = graph_slice(obj, default_gid)?;
            push_slice(gid, nodes);
        }
        Value::Object(_) => push_slice(default_gid.to_string(), vec![doc.clone()]),
        _ => return Err(UrdfError::schema("document is not a JSON-LD object or array")),
    }

    let mut dataset = Dataset::default();
    for (gid, nodes) in slices {
        dataset.graphs.push((gid.clone(), flatten_slice(&nodes)?));
    }
    Ok(dataset)
}

fn graph_slice(obj: &Map<String, Value>, default_gid: &str) -> UrdfResult<(String, Vec<Value>)> {
    let gid = match obj.get("@id") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(UrdfError::schema("graph @id must be a string")),
        None => default_gid.to_string(),
    };
    let nodes = match obj.get("@graph") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(_)) => vec![obj["@graph"].clone()],
        _ => return Err(UrdfError::schema("@graph must be an array of nodes")),
    };
    Ok((gid, nodes))
}

struct Flattener {
    out: IndexMap<String, Node>,
    used_ids: HashSet<String>,
    blank_counter: usize,
}

impl Flattener {
    fn fresh_blank(&mut self) -> String {
        loop {
            let candidate = format!("_:b{}", self.blank_counter);
            self.blank_counter += 1;
            if !self.used_ids.contains(&candidate) {
                self.used_ids.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

fn flatten_slice(nodes: &[Value]) -> UrdfResult<Vec<Node>> {
    let mut used_ids = HashSet::new();
    for node in nodes {
        collect_ids(node, &mut used_ids);
    }
    let mut fl = Flattener {
        out: IndexMap::new(),
        used_ids,
        blank_counter: 0,
    };
    for node in nodes {
        let obj = node
            .as_object()
            .ok_or_else(|| UrdfError::schema("graph node is not an object"))?;
        hoist(obj, &mut fl)?;
    }
    Ok(fl.out.into_values().collect())
}

fn collect_ids(value: &Value, out: &mut HashSet<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(id)) = obj.get("@id") {
                out.insert(id.clone());
            }
            for v in obj.values() {
                collect_ids(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_ids(v, out);
            }
        }
        _ => {}
    }
}

/// Lifts one node (and recursively every embedded node) into the output
/// index, returning the node's identifier.
fn hoist(obj: &Map<String, Value>, fl: &mut Flattener) -> UrdfResult<String> {
    let id = match obj.get("@id") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(UrdfError::schema("@id must be a string")),
        None => fl.fresh_blank(),
    };

    // Materialize the entry first so cyclic references terminate.
    if !fl.out.contains_key(&id) {
        let mut entry = Node::new();
        entry.insert("@id".to_string(), Value::String(id.clone()));
        fl.out.insert(id.clone(), entry);
    }

    let mut flat = Node::new();
    for (key, value) in obj {
        match key.as_str() {
            "@id" => {}
            // Remote context resolution is out of scope; contexts are
            // dropped on flattening.
            "@context" => {}
            "@type" => {
                let types = match value {
                    Value::Array(items) => items.clone(),
                    Value::String(_) => vec![value.clone()],
                    _ => return Err(UrdfError::schema("@type must be a string or array")),
                };
                for t in &types {
                    if !t.is_string() {
                        return Err(UrdfError::schema("@type members must be strings"));
                    }
                }
                flat.insert("@type".to_string(), Value::Array(types));
            }
            _ => {
                let mut values = Vec::new();
                flatten_values(value, fl, &mut values)?;
                flat.insert(key.clone(), Value::Array(values));
            }
        }
    }

    if let Some(entry) = fl.out.get_mut(&id) {
        merge_entry(entry, flat);
    }
    Ok(id)
}

/// Normalizes one predicate value into an array of value objects,
/// hoisting embedded nodes in situ.
fn flatten_values(value: &Value, fl: &mut Flattener, out: &mut Vec<Value>) -> UrdfResult<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_values(item, fl, out)?;
            }
        }
        Value::Object(obj) => {
            if is_value_object(obj) || is_reference(obj) {
                out.push(value.clone());
            } else if is_node_like(obj) {
                let id = hoist(obj, fl)?;
                let mut reference = Map::new();
                reference.insert("@id".to_string(), Value::String(id));
                out.push(Value::Object(reference));
            } else {
                // An object with only keywords such as a lone @id-less
                // shell; keep its @id form if any, otherwise drop it.
                out.push(value.clone());
            }
        }
        Value::Null => {}
        scalar => out.push(super::wrap_value(scalar.clone())),
    }
    Ok(())
}

/// Union merge for duplicate identifiers within one slice: `@type` arrays
/// union, predicate arrays concatenate with duplicates collapsed.
fn merge_entry(existing: &mut Node, incoming: Node) {
    for (key, value) in incoming {
        match existing.get_mut(&key) {
            None => {
                existing.insert(key, value);
            }
            Some(Value::Array(current)) => {
                if let Value::Array(new_items) = value {
                    for item in new_items {
                        if !current.contains(&item) {
                            current.push(item);
                        }
                    }
                }
            }
            // Existing scalar wins over an overwrite.
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|n| super::super::node_id(n).map(String::from))
            .collect()
    }

    #[test]
    fn test_scalar_promotion() {
        let dataset = flatten(&json!({"@id": "urn:x", "urn:name": "N"}), "").expect("flatten");
        let (_, nodes) = &dataset.graphs[0];
        assert_eq!(nodes[0]["urn:name"], json!([{"@value": "N"}]));
    }

    #[test]
    fn test_embedded_node_hoisting() {
        let doc = json!({
            "@id": "urn:x",
            "urn:knows": {"@id": "urn:y", "urn:name": "Y"}
        });
        let dataset = flatten(&doc, "").expect("flatten");
        let (_, nodes) = &dataset.graphs[0];
        assert_eq!(nodes.len(), 2);
        let x = nodes.iter().find(|n| super::super::node_id(n) == Some("urn:x")).expect("x");
        assert_eq!(x["urn:knows"], json!([{"@id": "urn:y"}]));
        let y = nodes.iter().find(|n| super::super::node_id(n) == Some("urn:y")).expect("y");
        assert_eq!(y["urn:name"], json!([{"@value": "Y"}]));
    }

    #[test]
    fn test_blank_id_generation_avoids_collisions() {
        let doc = json!([
            {"@id": "_:b0", "urn:p": "first"},
            {"urn:p": {"urn:q": "nested"}}
        ]);
        let dataset = flatten(&doc, "").expect("flatten");
        let (_, nodes) = &dataset.graphs[0];
        let all = ids(nodes);
        assert_eq!(all.len(), 3);
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 3, "generated blank ids must not collide: {all:?}");
    }

    #[test]
    fn test_value_objects_left_alone() {
        let doc = json!({
            "@id": "urn:x",
            "urn:label": [{"@value": "v", "@language": "en"}]
        });
        let dataset = flatten(&doc, "").expect("flatten");
        let (_, nodes) = &dataset.graphs[0];
        assert_eq!(nodes[0]["urn:label"], json!([{"@value": "v", "@language": "en"}]));
    }

    #[test]
    fn test_graph_object_keeps_gid() {
        let doc = json!({"@id": "urn:g:a", "@graph": [{"@id": "urn:x", "urn:p": 1}]});
        let dataset = flatten(&doc, "urn:g:default").expect("flatten");
        assert_eq!(dataset.graphs[0].0, "urn:g:a");
    }

    #[test]
    fn test_bare_nodes_use_default_gid() {
        let doc = json!([{"@id": "urn:x", "urn:p": 1}]);
        let dataset = flatten(&doc, "urn:g:default").expect("flatten");
        assert_eq!(dataset.graphs[0].0, "urn:g:default");
    }

    #[test]
    fn test_duplicate_id_merge_unions() {
        let doc = json!([
            {"@id": "urn:x", "@type": "urn:A", "urn:p": "a"},
            {"@id": "urn:x", "@type": ["urn:B"], "urn:p": "b"}
        ]);
        let dataset = flatten(&doc, "").expect("flatten");
        let (_, nodes) = &dataset.graphs[0];
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["@type"], json!(["urn:A", "urn:B"]));
        assert_eq!(nodes[0]["urn:p"], json!([{"@value": "a"}, {"@value": "b"}]));
    }

    #[test]
    fn test_type_scalar_becomes_array() {
        let dataset = flatten(&json!({"@id": "urn:x", "@type": "urn:C"}), "").expect("flatten");
        let (_, nodes) = &dataset.graphs[0];
        assert_eq!(nodes[0]["@type"], json!(["urn:C"]));
    }
}
