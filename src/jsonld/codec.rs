//! Dictionary-driven compression and expansion.
//!
//! Compression rewrites predicate keys, `@type` members, `@id`s, and
//! recognized IRI-shaped string values to `z:<n>` tokens. JSON-LD keywords
//! are never compressed and literal `@value` payloads are never rewritten.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::dictionary::Dictionary;

use super::{Dataset, Node};

fn embedded_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"z:(\d+)").unwrap())
}

/// Compresses every slice of a flattened dataset.
pub fn compress_dataset(dataset: &Dataset, dict: &Dictionary) -> Dataset {
    Dataset {
        graphs: dataset
            .graphs
            .iter()
            .map(|(gid, nodes)| {
                (
                    dict.compress_token(gid),
                    nodes.iter().map(|n| compress_node(n, dict)).collect(),
                )
            })
            .collect(),
    }
}

/// Compresses one normalized node.
pub fn compress_node(node: &Node, dict: &Dictionary) -> Node {
    let mut out = Node::new();
    for (key, value) in node {
        match key.as_str() {
            "@id" => {
                out.insert(key.clone(), compress_string_value(value, dict));
            }
            "@type" => {
                out.insert(key.clone(), compress_type_value(value, dict));
            }
            k if k.starts_with('@') => {
                out.insert(key.clone(), value.clone());
            }
            _ => {
                out.insert(dict.compress_token(key), compress_values(value, dict));
            }
        }
    }
    out
}

fn compress_type_value(value: &Value, dict: &Dictionary) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|t| compress_string_value(t, dict))
                .collect(),
        ),
        other => compress_string_value(other, dict),
    }
}

fn compress_string_value(value: &Value, dict: &Dictionary) -> Value {
    match value {
        Value::String(s) => Value::String(dict.compress_token(s)),
        other => other.clone(),
    }
}

fn compress_values(value: &Value, dict: &Dictionary) -> Value {
    match value {
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| compress_values(v, dict)).collect())
        }
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, v) in obj {
                match key.as_str() {
                    "@id" | "@type" => {
                        out.insert(key.clone(), compress_string_value(v, dict));
                    }
                    // @value payloads and remaining keywords untouched
                    _ => {
                        out.insert(key.clone(), v.clone());
                    }
                }
            }
            Value::Object(out)
        }
        Value::String(s) => Value::String(dict.compress_token(s)),
        other => other.clone(),
    }
}

/// Deep-graph expansion: decodes only strings with the exact `z:<n>` shape,
/// as used for predicate keys, types, and `@id`s. Literal `@value` payloads
/// are left untouched.
pub fn expand_graph_value(value: &Value, dict: &Dictionary) -> Value {
    expand_value(value, dict, false)
}

/// Deep-query expansion: additionally decodes tokens embedded inside string
/// values, such as `<z:5>` references appearing in serialized terms.
pub fn expand_query_value(value: &Value, dict: &Dictionary) -> Value {
    expand_value(value, dict, true)
}

fn expand_value(value: &Value, dict: &Dictionary, embedded: bool) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, v) in obj {
                let expanded_key = if key.starts_with('@') {
                    key.clone()
                } else {
                    dict.expand_token(key)
                };
                let expanded_value = if key == "@value" {
                    v.clone()
                } else {
                    expand_value(v, dict, embedded)
                };
                out.insert(expanded_key, expanded_value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| expand_value(v, dict, embedded))
                .collect(),
        ),
        Value::String(s) => Value::String(expand_string(s, dict, embedded)),
        other => other.clone(),
    }
}

fn expand_string(s: &str, dict: &Dictionary, embedded: bool) -> String {
    if Dictionary::is_token(s) {
        return dict.expand_token(s);
    }
    if embedded {
        return embedded_token_re()
            .replace_all(s, |caps: &regex::Captures| {
                let token = &caps[0];
                dict.expand_token(token)
            })
            .into_owned();
    }
    s.to_string()
}
