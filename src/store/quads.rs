//! Quad view of the stored graphs.
//!
//! Converts the internal node maps into `oxigraph` model quads for the
//! SPARQL evaluator seam. `@type` entries map to `rdf:type` predicates;
//! tokens stay in token form (a `z:<n>` token is itself a valid IRI), so
//! rewritten queries match the internal representation.

use indexmap::IndexMap;
use oxigraph::model::{BlankNode, GraphName, Literal, NamedNode, Quad, Subject, Term};
use serde_json::Value;
use tracing::debug;

use crate::jsonld::Node;
use crate::vocab;

use super::Graph;

/// Converts every graph into quads, skipping terms that do not form valid
/// RDF identifiers (logged at debug level, never fatal).
pub fn dataset_quads(graphs: &IndexMap<String, Graph>) -> Vec<Quad> {
    let mut quads = Vec::new();
    for (gid, graph) in graphs {
        let Some(graph_name) = graph_name_for(gid) else {
            debug!(gid = %gid, "skipping graph with invalid identifier");
            continue;
        };
        for (id, node) in graph {
            node_quads(id, node, &graph_name, &mut quads);
        }
    }
    quads
}

fn node_quads(id: &str, node: &Node, graph: &GraphName, out: &mut Vec<Quad>) {
    let Some(subject) = subject_for(id) else {
        debug!(id = %id, "skipping node with invalid subject identifier");
        return;
    };
    let Ok(rdf_type) = NamedNode::new(vocab::RDF_TYPE) else {
        return;
    };

    for (key, value) in node {
        match key.as_str() {
            "@id" => {}
            "@type" => {
                for t in value.as_array().into_iter().flatten() {
                    if let Some(iri) = t.as_str() {
                        if let Ok(class) = NamedNode::new(iri) {
                            out.push(Quad::new(
                                subject.clone(),
                                rdf_type.clone(),
                                class,
                                graph.clone(),
                            ));
                        }
                    }
                }
            }
            _ => {
                let Ok(predicate) = NamedNode::new(key) else {
                    debug!(predicate = %key, "skipping invalid predicate");
                    continue;
                };
                for entry in value.as_array().into_iter().flatten() {
                    if let Some(object) = object_term(entry) {
                        out.push(Quad::new(
                            subject.clone(),
                            predicate.clone(),
                            object,
                            graph.clone(),
                        ));
                    }
                }
            }
        }
    }
}

fn graph_name_for(gid: &str) -> Option<GraphName> {
    if gid == super::DEFAULT_GRAPH {
        return Some(GraphName::DefaultGraph);
    }
    if let Some(label) = gid.strip_prefix("_:") {
        return BlankNode::new(label).ok().map(GraphName::BlankNode);
    }
    NamedNode::new(gid).ok().map(GraphName::NamedNode)
}

fn subject_for(id: &str) -> Option<Subject> {
    if let Some(label) = id.strip_prefix("_:") {
        return BlankNode::new(label).ok().map(Subject::BlankNode);
    }
    NamedNode::new(id).ok().map(Subject::NamedNode)
}

fn object_term(entry: &Value) -> Option<Term> {
    let obj = entry.as_object()?;
    if let Some(id) = obj.get("@id").and_then(Value::as_str) {
        if let Some(label) = id.strip_prefix("_:") {
            return BlankNode::new(label).ok().map(Term::BlankNode);
        }
        return NamedNode::new(id).ok().map(Term::NamedNode);
    }

    let value = obj.get("@value")?;
    let literal = match value {
        Value::String(s) => {
            if let Some(lang) = obj.get("@language").and_then(Value::as_str) {
                Literal::new_language_tagged_literal(s, lang).ok()?
            } else if let Some(dt) = obj.get("@type").and_then(Value::as_str) {
                let datatype = NamedNode::new(dt).ok()?;
                Literal::new_typed_literal(s.as_str(), datatype)
            } else {
                Literal::new_simple_literal(s)
            }
        }
        Value::Bool(b) => {
            let datatype = NamedNode::new(vocab::XSD_BOOLEAN).ok()?;
            Literal::new_typed_literal(b.to_string(), datatype)
        }
        Value::Number(n) => {
            let datatype_iri = if n.is_i64() || n.is_u64() {
                vocab::XSD_INTEGER
            } else {
                vocab::XSD_DOUBLE
            };
            let datatype = NamedNode::new(datatype_iri).ok()?;
            Literal::new_typed_literal(n.to_string(), datatype)
        }
        _ => return None,
    };
    Some(Term::Literal(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph_of(nodes: Value) -> IndexMap<String, Graph> {
        let mut graph = Graph::new();
        for node in nodes.as_array().expect("array") {
            let obj = node.as_object().expect("object").clone();
            let id = obj["@id"].as_str().expect("id").to_string();
            graph.insert(id, obj);
        }
        let mut graphs = IndexMap::new();
        graphs.insert("urn:g:a".to_string(), graph);
        graphs
    }

    #[test]
    fn test_type_entries_become_rdf_type_quads() {
        let graphs = graph_of(json!([{"@id": "urn:x", "@type": ["urn:C"]}]));
        let quads = dataset_quads(&graphs);
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].predicate.as_str(), vocab::RDF_TYPE);
    }

    #[test]
    fn test_token_predicates_are_valid_iris() {
        let graphs = graph_of(json!([{"@id": "urn:x", "z:2": [{"@value": "N"}]}]));
        let quads = dataset_quads(&graphs);
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].predicate.as_str(), "z:2");
    }

    #[test]
    fn test_literal_terms() {
        let graphs = graph_of(json!([{"@id": "urn:x", "urn:p": [
            {"@value": "s"},
            {"@value": 5},
            {"@value": true},
            {"@value": "hi", "@language": "en"}
        ]}]));
        let quads = dataset_quads(&graphs);
        assert_eq!(quads.len(), 4);
    }

    #[test]
    fn test_blank_subjects_and_objects() {
        let graphs = graph_of(json!([
            {"@id": "_:b0", "urn:p": [{"@id": "_:b1"}]}
        ]));
        let quads = dataset_quads(&graphs);
        assert_eq!(quads.len(), 1);
        assert!(matches!(quads[0].subject, Subject::BlankNode(_)));
        assert!(matches!(quads[0].object, Term::BlankNode(_)));
    }

    #[test]
    fn test_invalid_terms_skipped() {
        let graphs = graph_of(json!([
            {"@id": "not an iri", "urn:p": [{"@value": 1}]},
            {"@id": "urn:ok", "urn:p": [{"@value": 1}]}
        ]));
        let quads = dataset_quads(&graphs);
        assert_eq!(quads.len(), 1);
    }
}
