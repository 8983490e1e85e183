//! SPARQL evaluator capability.
//!
//! The evaluator is a black box behind the [`SparqlEvaluator`] trait: it
//! receives an already-rewritten query and the quad view of the store, and
//! answers either a boolean (ASK) or variable bindings (SELECT). Binding
//! terms use the SPARQL 1.1 JSON results shape.
//!
//! The bundled implementation delegates to an in-memory oxigraph store
//! rebuilt from the quad view per call; queries see the union of all named
//! graphs as the default graph.

use oxigraph::model::{Quad, Term};
use oxigraph::sparql::{Query, QueryResults};
use oxigraph::store::Store;
use serde_json::{Map, Value};

use crate::error::{UrdfError, UrdfResult};
use crate::vocab;

/// Evaluator answer: ASK yields a boolean, SELECT yields binding rows.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Boolean(bool),
    Bindings(Vec<Map<String, Value>>),
}

/// Black-box SPARQL evaluation seam.
pub trait SparqlEvaluator: Send + Sync {
    fn evaluate(&self, sparql: &str, quads: &[Quad]) -> UrdfResult<QueryOutcome>;
}

/// Evaluator backed by an in-memory oxigraph store.
#[derive(Debug, Default)]
pub struct OxigraphEvaluator;

impl OxigraphEvaluator {
    pub fn new() -> Self {
        OxigraphEvaluator
    }
}

impl SparqlEvaluator for OxigraphEvaluator {
    fn evaluate(&self, sparql: &str, quads: &[Quad]) -> UrdfResult<QueryOutcome> {
        let store =
            Store::new().map_err(|e| UrdfError::from_evaluator(e.to_string()))?;
        for quad in quads {
            store
                .insert(quad)
                .map_err(|e| UrdfError::from_evaluator(e.to_string()))?;
        }

        let mut query = Query::parse(sparql, None)
            .map_err(|e| UrdfError::from_evaluator(format!("parse error: {e}")))?;
        query.dataset_mut().set_default_graph_as_union();

        match store
            .query(query)
            .map_err(|e| UrdfError::from_evaluator(e.to_string()))?
        {
            QueryResults::Boolean(b) => Ok(QueryOutcome::Boolean(b)),
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution =
                        solution.map_err(|e| UrdfError::from_evaluator(e.to_string()))?;
                    let mut row = Map::new();
                    for (variable, term) in solution.iter() {
                        row.insert(variable.as_str().to_string(), term_json(term));
                    }
                    rows.push(row);
                }
                Ok(QueryOutcome::Bindings(rows))
            }
            QueryResults::Graph(_) => Err(UrdfError::from_evaluator(
                "graph-shaped results are not supported; project s/p/o bindings instead",
            )),
        }
    }
}

/// Serializes one solution term in the SPARQL 1.1 JSON results shape.
fn term_json(term: &Term) -> Value {
    let mut obj = Map::new();
    match term {
        Term::NamedNode(n) => {
            obj.insert("type".to_string(), Value::String("uri".to_string()));
            obj.insert("value".to_string(), Value::String(n.as_str().to_string()));
        }
        Term::BlankNode(b) => {
            obj.insert("type".to_string(), Value::String("bnode".to_string()));
            obj.insert("value".to_string(), Value::String(b.as_str().to_string()));
        }
        Term::Literal(l) => {
            obj.insert("type".to_string(), Value::String("literal".to_string()));
            obj.insert("value".to_string(), Value::String(l.value().to_string()));
            if let Some(lang) = l.language() {
                obj.insert("xml:lang".to_string(), Value::String(lang.to_string()));
            } else if l.datatype().as_str() != vocab::XSD_STRING {
                obj.insert(
                    "datatype".to_string(),
                    Value::String(l.datatype().as_str().to_string()),
                );
            }
        }
        #[allow(unreachable_patterns)]
        _ => {
            obj.insert("type".to_string(), Value::String("literal".to_string()));
            obj.insert("value".to_string(), Value::String(term.to_string()));
        }
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{GraphName, Literal, NamedNode, Subject};
    use serde_json::json;

    fn quad(s: &str, p: &str, o: Term) -> Quad {
        Quad::new(
            Subject::NamedNode(NamedNode::new(s).expect("subject")),
            NamedNode::new(p).expect("predicate"),
            o,
            GraphName::NamedNode(NamedNode::new("urn:g:a").expect("graph")),
        )
    }

    #[test]
    fn test_select_bindings() {
        let quads = vec![quad(
            "urn:x",
            "urn:p",
            Term::Literal(Literal::new_simple_literal("N")),
        )];
        let outcome = OxigraphEvaluator::new()
            .evaluate("SELECT ?o WHERE { <urn:x> <urn:p> ?o }", &quads)
            .expect("query");
        match outcome {
            QueryOutcome::Bindings(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["o"], json!({"type": "literal", "value": "N"}));
            }
            QueryOutcome::Boolean(_) => panic!("expected bindings"),
        }
    }

    #[test]
    fn test_ask_boolean() {
        let quads = vec![quad(
            "urn:x",
            "urn:p",
            Term::NamedNode(NamedNode::new("urn:y").expect("iri")),
        )];
        let outcome = OxigraphEvaluator::new()
            .evaluate("ASK { <urn:x> <urn:p> <urn:y> }", &quads)
            .expect("query");
        assert_eq!(outcome, QueryOutcome::Boolean(true));

        let outcome = OxigraphEvaluator::new()
            .evaluate("ASK { <urn:x> <urn:p> <urn:z> }", &quads)
            .expect("query");
        assert_eq!(outcome, QueryOutcome::Boolean(false));
    }

    #[test]
    fn test_union_default_graph_spans_named_graphs() {
        let quads = vec![quad(
            "urn:x",
            "urn:p",
            Term::Literal(Literal::new_simple_literal("N")),
        )];
        // No GRAPH clause, yet the named-graph quad is visible.
        let outcome = OxigraphEvaluator::new()
            .evaluate("ASK { ?s ?p ?o }", &quads)
            .expect("query");
        assert_eq!(outcome, QueryOutcome::Boolean(true));
    }

    #[test]
    fn test_a_keyword_matches_type_quads() {
        let quads = vec![quad(
            "urn:x",
            crate::vocab::RDF_TYPE,
            Term::NamedNode(NamedNode::new("urn:C").expect("iri")),
        )];
        let outcome = OxigraphEvaluator::new()
            .evaluate("SELECT ?s WHERE { ?s a <urn:C> }", &quads)
            .expect("query");
        match outcome {
            QueryOutcome::Bindings(rows) => assert_eq!(rows.len(), 1),
            QueryOutcome::Boolean(_) => panic!("expected bindings"),
        }
    }

    #[test]
    fn test_parse_error_is_evaluator_error() {
        let err = OxigraphEvaluator::new()
            .evaluate("SELECT WHERE {", &[])
            .expect_err("parse failure");
        assert_eq!(err.kind(), "EvaluatorError");
    }
}
