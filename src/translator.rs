//! Flow -> Graph Translator
//!
//! Converts the host's flow configuration into a stable application
//! knowledge graph. The mapping is deterministic: every generated id
//! depends only on its parent id and the key/index path, object keys are
//! visited in sorted order, and re-running over byte-identical input
//! produces an identical set of quads.
//!
//! Entities emitted per configuration:
//! - one `Application` root (`urn:nrua:a<instance>`);
//! - one `Flow` per tab (`urn:nrua:f<tabId>`), linked back to the
//!   application, aggregating a sorted comma-joined keyword string from the
//!   types of its nodes;
//! - one `Node` per non-tab node (`urn:nrua:n<nodeId>`), linked to its
//!   containing flow (`schema:isPartOf`) or directly to the application
//!   (`schema:memberOf`);
//! - one `NodeOutput` per wired output gate (`urn:nrua:o<nodeId><gate>`)
//!   carrying the gate index and its target references;
//! - recursive `PropertyValue` / `ItemList` / `StructuredValue` auxiliaries
//!   for every retained configuration key.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{UrdfError, UrdfResult};
use crate::jsonld::{validate_array_valued, Node};
use crate::vocab;

/// Configuration keys never emitted into the application graph: structural
/// keys captured first-class, editor geometry, and non-semantic editor
/// state. `name` is captured separately as `schema:name`.
const EXCLUDED_KEYS: [&str; 13] = [
    "id", "type", "z", "x", "y", "wires", "info", "d", "g", "label", "disabled", "env", "name",
];

pub fn application_iri(instance: &str) -> String {
    format!("urn:nrua:a{instance}")
}

pub fn flow_iri(tab_id: &str) -> String {
    format!("urn:nrua:f{tab_id}")
}

pub fn node_iri(node_id: &str) -> String {
    format!("urn:nrua:n{node_id}")
}

pub fn output_iri(node_id: &str, gate: usize) -> String {
    format!("urn:nrua:o{node_id}{gate}")
}

/// Deterministic translator bound to one host instance.
pub struct Translator {
    instance: String,
}

impl Translator {
    pub fn new(instance: impl Into<String>) -> Self {
        Translator {
            instance: instance.into(),
        }
    }

    pub fn application_iri(&self) -> String {
        application_iri(&self.instance)
    }

    /// Translates a flow configuration document into the application graph
    /// dataset (`{"@graph": [...]}`), validated against the array-valued
    /// predicate contract before it is handed to the store.
    pub fn translate(&self, config: &Value) -> UrdfResult<Value> {
        let flows = flow_entries(config)?;
        let app_id = self.application_iri();

        let mut out: Vec<Node> = Vec::new();
        let mut app = Node::new();
        app.insert("@id".to_string(), Value::String(app_id.clone()));
        app.insert("@type".to_string(), array_of_iri(vocab::NRUA_APPLICATION));
        app.insert(
            vocab::SCHEMA_IDENTIFIER.to_string(),
            array_of_value(Value::String(self.instance.clone())),
        );
        out.push(app);

        // Tabs first: flows exist before the nodes that reference them.
        let mut keyword_sets: IndexMap<String, std::collections::BTreeSet<String>> =
            IndexMap::new();
        for entry in &flows {
            let Some((id, kind)) = identity(entry) else {
                warn!("skipping flow entry without id/type");
                continue;
            };
            if kind != "tab" {
                continue;
            }
            let fid = flow_iri(id);
            let mut flow = Node::new();
            flow.insert("@id".to_string(), Value::String(fid.clone()));
            flow.insert("@type".to_string(), array_of_iri(vocab::NRUA_FLOW));
            if let Some(name) = display_name(entry) {
                flow.insert(
                    vocab::SCHEMA_NAME.to_string(),
                    array_of_value(Value::String(name)),
                );
            }
            flow.insert(
                vocab::SCHEMA_IS_PART_OF.to_string(),
                array_of_ref(&app_id),
            );
            out.push(flow);
            keyword_sets.insert(fid, std::collections::BTreeSet::new());
        }

        for entry in &flows {
            let Some((id, kind)) = identity(entry) else {
                continue;
            };
            if kind == "tab" {
                continue;
            }
            self.emit_node(&mut out, &mut keyword_sets, &app_id, entry, id, kind);
        }

        // Finalize the per-flow keyword aggregate: trimmed, ascending,
        // comma-joined.
        for (fid, set) in keyword_sets {
            let joined = set.into_iter().collect::<Vec<_>>().join(",");
            if let Some(flow) = out
                .iter_mut()
                .find(|n| n.get("@id").and_then(Value::as_str) == Some(fid.as_str()))
            {
                flow.insert(
                    vocab::SCHEMA_KEYWORDS.to_string(),
                    array_of_value(Value::String(joined)),
                );
            }
        }

        validate_array_valued(&out)?;
        Ok(Value::Object(
            [(
                "@graph".to_string(),
                Value::Array(out.into_iter().map(Value::Object).collect()),
            )]
            .into_iter()
            .collect(),
        ))
    }

    fn emit_node(
        &self,
        out: &mut Vec<Node>,
        keyword_sets: &mut IndexMap<String, std::collections::BTreeSet<String>>,
        app_id: &str,
        entry: &Map<String, Value>,
        id: &str,
        kind: &str,
    ) {
        let nid = node_iri(id);

        // Containment: the flow referenced by `z`, or the application.
        let container_tab = entry
            .get("z")
            .and_then(Value::as_str)
            .filter(|z| !z.is_empty());
        let (container, containment) = match container_tab {
            Some(z) => {
                let fid = flow_iri(z);
                if let Some(set) = keyword_sets.get_mut(&fid) {
                    set.insert(kind.trim().to_string());
                }
                (fid, vocab::SCHEMA_IS_PART_OF)
            }
            None => (app_id.to_string(), vocab::SCHEMA_MEMBER_OF),
        };

        let mut node = Node::new();
        node.insert("@id".to_string(), Value::String(nid.clone()));
        node.insert("@type".to_string(), array_of_iri(vocab::NRUA_NODE));
        node.insert(
            vocab::SCHEMA_ADDITIONAL_TYPE.to_string(),
            array_of_value(Value::String(kind.to_string())),
        );
        if let Some(name) = entry.get("name").and_then(Value::as_str) {
            if !name.is_empty() {
                node.insert(
                    vocab::SCHEMA_NAME.to_string(),
                    array_of_value(Value::String(name.to_string())),
                );
            }
        }
        node.insert(containment.to_string(), array_of_ref(&container));

        // Retained configuration keys, sorted for deterministic auxiliary
        // emission order.
        let mut property_refs = Vec::new();
        let mut keys: Vec<&String> = entry
            .keys()
            .filter(|k| !EXCLUDED_KEYS.contains(&k.as_str()))
            .collect();
        keys.sort();
        let mut aux: Vec<Node> = Vec::new();
        for key in keys {
            if let Some(reference) = encode_property(&mut aux, &nid, key, &entry[key.as_str()]) {
                property_refs.push(reference);
            }
        }
        if !property_refs.is_empty() {
            node.insert(
                vocab::SCHEMA_ADDITIONAL_PROPERTY.to_string(),
                Value::Array(property_refs),
            );
        }

        // Wired output gates.
        let mut output_refs = Vec::new();
        let mut outputs: Vec<Node> = Vec::new();
        if let Some(wires) = entry.get("wires").and_then(Value::as_array) {
            for (gate, targets) in wires.iter().enumerate() {
                let targets: Vec<&str> = targets
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .collect();
                if targets.is_empty() {
                    continue;
                }
                let oid = output_iri(id, gate);
                let mut output = Node::new();
                output.insert("@id".to_string(), Value::String(oid.clone()));
                output.insert("@type".to_string(), array_of_iri(vocab::NRUA_NODE_OUTPUT));
                output.insert(
                    vocab::SCHEMA_POSITION.to_string(),
                    array_of_value(Value::Number(gate.into())),
                );
                output.insert(
                    vocab::NRUA_WIRED_TO.to_string(),
                    Value::Array(
                        targets
                            .iter()
                            .map(|t| reference(&node_iri(t)))
                            .collect(),
                    ),
                );
                outputs.push(output);
                output_refs.push(reference(&oid));
            }
        }
        if !output_refs.is_empty() {
            node.insert(vocab::SCHEMA_HAS_PART.to_string(), Value::Array(output_refs));
        }

        out.push(node);
        out.extend(aux);
        out.extend(outputs);
    }

    /// Builds the environment graph from the host's diagnostics and
    /// settings documents. Written once; never mutated afterwards.
    pub fn environment_graph(&self, diagnostics: &Value, settings: &Value) -> UrdfResult<Value> {
        let env_id = format!("urn:nrua:e{}", self.instance);
        let mut out: Vec<Node> = Vec::new();
        let mut env = Node::new();
        env.insert("@id".to_string(), Value::String(env_id.clone()));
        env.insert("@type".to_string(), array_of_iri(vocab::NRUA_ENVIRONMENT));

        let mut refs = Vec::new();
        let mut aux: Vec<Node> = Vec::new();
        for (key, value) in [("diagnostics", diagnostics), ("settings", settings)] {
            if let Some(r) = encode_property(&mut aux, &env_id, key, value) {
                refs.push(r);
            }
        }
        if !refs.is_empty() {
            env.insert(
                vocab::SCHEMA_ADDITIONAL_PROPERTY.to_string(),
                Value::Array(refs),
            );
        }
        out.push(env);
        out.extend(aux);

        validate_array_valued(&out)?;
        Ok(Value::Object(
            [(
                "@graph".to_string(),
                Value::Array(out.into_iter().map(Value::Object).collect()),
            )]
            .into_iter()
            .collect(),
        ))
    }
}

/// Extracts the ordered flow entries from the admin `/flows` answer, which
/// is either the bare array or a `{"flows": [...], "rev": ...}` envelope.
fn flow_entries(config: &Value) -> UrdfResult<Vec<Map<String, Value>>> {
    let entries = match config {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("flows")
            .and_then(Value::as_array)
            .ok_or_else(|| UrdfError::contract("flow configuration carries no flows array"))?,
        _ => return Err(UrdfError::contract("flow configuration must be an array")),
    };
    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .cloned()
        .collect())
}

fn identity(entry: &Map<String, Value>) -> Option<(&str, &str)> {
    let id = entry.get("id").and_then(Value::as_str)?;
    let kind = entry.get("type").and_then(Value::as_str)?;
    Some((id, kind))
}

/// The display name of a tab: the editor stores it under `label`, older
/// configurations under `name`.
fn display_name(entry: &Map<String, Value>) -> Option<String> {
    entry
        .get("label")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            entry
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(String::from)
}

/// Recursive tagged encoding of one retained configuration value.
///
/// Dispatch: primitive -> `PropertyValue`, array -> `ItemList` of
/// `ListItem`s, object -> `StructuredValue` with nested properties in
/// sorted key order. Nulls are dropped. Returns the reference to link from
/// the parent, with the auxiliary nodes appended to `out`.
fn encode_property(
    out: &mut Vec<Node>,
    parent: &str,
    key: &str,
    value: &Value,
) -> Option<Value> {
    let aux_id = format!("{parent}k{}", urn_safe(key));
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let mut list = Node::new();
            list.insert("@id".to_string(), Value::String(aux_id.clone()));
            list.insert("@type".to_string(), array_of_iri(vocab::SCHEMA_ITEM_LIST));
            list.insert(
                vocab::SCHEMA_NAME.to_string(),
                array_of_value(Value::String(key.to_string())),
            );
            let mut element_refs = Vec::new();
            let mut aux: Vec<Node> = Vec::new();
            for (index, item) in items.iter().enumerate() {
                element_refs.push(encode_list_item(&mut aux, &aux_id, index, item));
            }
            list.insert(
                vocab::SCHEMA_ITEM_LIST_ELEMENT.to_string(),
                Value::Array(element_refs),
            );
            out.push(list);
            out.extend(aux);
            Some(reference(&aux_id))
        }
        Value::Object(obj) => {
            encode_object(out, &aux_id, Some(key), obj);
            Some(reference(&aux_id))
        }
        primitive => {
            let mut pv = Node::new();
            pv.insert("@id".to_string(), Value::String(aux_id.clone()));
            pv.insert("@type".to_string(), array_of_iri(vocab::SCHEMA_PROPERTY_VALUE));
            pv.insert(
                vocab::SCHEMA_NAME.to_string(),
                array_of_value(Value::String(key.to_string())),
            );
            pv.insert(
                vocab::SCHEMA_VALUE.to_string(),
                array_of_value(primitive.clone()),
            );
            out.push(pv);
            Some(reference(&aux_id))
        }
    }
}

fn encode_list_item(out: &mut Vec<Node>, list_id: &str, index: usize, item: &Value) -> Value {
    let li_id = format!("{list_id}i{index}");
    let mut li = Node::new();
    li.insert("@id".to_string(), Value::String(li_id.clone()));
    li.insert("@type".to_string(), array_of_iri(vocab::SCHEMA_LIST_ITEM));
    li.insert(
        vocab::SCHEMA_POSITION.to_string(),
        array_of_value(Value::Number(index.into())),
    );
    match item {
        Value::Null => {}
        Value::Object(obj) => {
            let nested_id = format!("{li_id}v");
            encode_object(out, &nested_id, None, obj);
            li.insert(vocab::SCHEMA_ITEM.to_string(), array_of_ref(&nested_id));
        }
        Value::Array(items) => {
            let nested_id = format!("{li_id}v");
            let mut list = Node::new();
            list.insert("@id".to_string(), Value::String(nested_id.clone()));
            list.insert("@type".to_string(), array_of_iri(vocab::SCHEMA_ITEM_LIST));
            let mut element_refs = Vec::new();
            let mut aux: Vec<Node> = Vec::new();
            for (i, nested_item) in items.iter().enumerate() {
                element_refs.push(encode_list_item(&mut aux, &nested_id, i, nested_item));
            }
            list.insert(
                vocab::SCHEMA_ITEM_LIST_ELEMENT.to_string(),
                Value::Array(element_refs),
            );
            out.push(list);
            out.extend(aux);
            li.insert(vocab::SCHEMA_ITEM.to_string(), array_of_ref(&nested_id));
        }
        primitive => {
            li.insert(
                vocab::SCHEMA_ITEM.to_string(),
                array_of_value(primitive.clone()),
            );
        }
    }
    out.push(li);
    reference(&li_id)
}

/// Emits a `StructuredValue` node for an object value, nested properties in
/// sorted key order.
fn encode_object(out: &mut Vec<Node>, id: &str, key: Option<&str>, obj: &Map<String, Value>) {
    let mut sv = Node::new();
    sv.insert("@id".to_string(), Value::String(id.to_string()));
    sv.insert(
        "@type".to_string(),
        array_of_iri(vocab::SCHEMA_STRUCTURED_VALUE),
    );
    if let Some(key) = key {
        sv.insert(
            vocab::SCHEMA_NAME.to_string(),
            array_of_value(Value::String(key.to_string())),
        );
    }

    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort();
    let mut refs = Vec::new();
    let mut aux: Vec<Node> = Vec::new();
    for k in keys {
        if let Some(r) = encode_property(&mut aux, id, k, &obj[k.as_str()]) {
            refs.push(r);
        }
    }
    if !refs.is_empty() {
        sv.insert(
            vocab::SCHEMA_ADDITIONAL_PROPERTY.to_string(),
            Value::Array(refs),
        );
    }
    out.push(sv);
    out.extend(aux);
}

fn array_of_value(v: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("@value".to_string(), v);
    Value::Array(vec![Value::Object(obj)])
}

fn array_of_iri(iri: &str) -> Value {
    Value::Array(vec![Value::String(iri.to_string())])
}

fn reference(id: &str) -> Value {
    let mut obj = Map::new();
    obj.insert("@id".to_string(), Value::String(id.to_string()));
    Value::Object(obj)
}

fn array_of_ref(id: &str) -> Value {
    Value::Array(vec![reference(id)])
}

/// URN-safe encoding of key text: alphanumerics, `-`, and `_` pass
/// through; everything else is percent-encoded.
fn urn_safe(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(b as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
