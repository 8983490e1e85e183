//! Gateway contract: PREFIX/BASE rejection, IRI rewriting including the
//! index-0 `a` shortcut, and the semantics-preservation of compression.

use std::sync::Arc;

use serde_json::json;
use urdf::sparql::{self, OxigraphEvaluator, QueryOutcome};
use urdf::{Dictionary, UrdfStore};

const TYPE_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

fn dictionary() -> Dictionary {
    Dictionary::new(vec![
        TYPE_IRI.to_string(),
        "urn:a/type".to_string(),
        "urn:a/name".to_string(),
        "urn:C".to_string(),
    ])
}

fn loaded_store(dict: Dictionary) -> UrdfStore {
    let mut store = UrdfStore::new(Arc::new(dict));
    store
        .load(
            &json!({"@id": "urn:g:a", "@graph": [
                {"@id": "urn:x", "@type": ["urn:C"], "urn:a/name": [{"@value": "N"}]},
                {"@id": "urn:y", "@type": ["urn:C"], "urn:a/name": [{"@value": "M"}]}
            ]}),
            None,
        )
        .expect("load");
    store
}

#[test]
fn test_prefix_and_base_rejected() {
    for query in [
        "PREFIX ex: <urn:ex/> SELECT ?s WHERE { ?s ex:p ?o }",
        "prefix ex: <urn:ex/> ASK { ?s ?p ?o }",
        "BASE <urn:base/> SELECT ?s WHERE { ?s ?p ?o }",
        "base <urn:base/> ASK { ?s ?p ?o }",
    ] {
        let err = sparql::guard(query).expect_err("must reject");
        assert_eq!(err.kind(), "ContractViolation");
    }
}

#[test]
fn test_prefix_inside_literal_is_fine() {
    assert!(sparql::guard("SELECT ?s WHERE { ?s <urn:p> \"PREFIX inside\" }").is_ok());
}

#[test]
fn test_s2_rewriting_uses_tokens_and_a_keyword() {
    let dict = dictionary();
    let rewritten = sparql::rewrite(
        "SELECT ?s ?p ?o WHERE { <urn:a/name> ?p ?o }",
        &dict,
    );
    assert_eq!(rewritten, "SELECT ?s ?p ?o WHERE { <z:2> ?p ?o }");

    let rewritten = sparql::rewrite(
        &format!("SELECT ?s WHERE {{ ?s <{TYPE_IRI}> <urn:C> }}"),
        &dict,
    );
    assert_eq!(rewritten, "SELECT ?s WHERE { ?s a <z:3> }");
}

#[test]
fn test_unknown_iris_survive_rewriting() {
    let dict = dictionary();
    let query = "SELECT ?o WHERE { <urn:not/known> <urn:also/unknown> ?o }";
    assert_eq!(sparql::rewrite(query, &dict), query);
}

#[test]
fn test_ask_query_returns_boolean() {
    let store = loaded_store(dictionary());
    let outcome = sparql::execute(
        &store,
        &OxigraphEvaluator::new(),
        "ASK { <urn:x> <urn:a/name> ?o }",
    )
    .expect("ask");
    assert_eq!(outcome, QueryOutcome::Boolean(true));
}

#[test]
fn test_select_bindings_are_expanded() {
    let store = loaded_store(dictionary());
    let outcome = sparql::execute(
        &store,
        &OxigraphEvaluator::new(),
        "SELECT ?s ?o WHERE { ?s <urn:a/name> ?o }",
    )
    .expect("select");

    let QueryOutcome::Bindings(rows) = outcome else {
        panic!("expected bindings");
    };
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let s = row["s"]["value"].as_str().expect("subject");
        assert!(s.starts_with("urn:"), "binding must be expanded, got {s}");
    }
}

#[test]
fn test_type_queries_match_through_a() {
    let store = loaded_store(dictionary());
    let outcome = sparql::execute(
        &store,
        &OxigraphEvaluator::new(),
        &format!("SELECT ?s WHERE {{ ?s <{TYPE_IRI}> <urn:C> }}"),
    )
    .expect("type query");
    let QueryOutcome::Bindings(rows) = outcome else {
        panic!("expected bindings");
    };
    assert_eq!(rows.len(), 2);
}

/// Compression is semantics-preserving: querying the compressed store with
/// the rewritten query yields the same expanded bindings as querying an
/// uncompressed store with the original query.
#[test]
fn test_compression_preserves_query_semantics() {
    let compressed_store = loaded_store(dictionary());
    let plain_store = loaded_store(Dictionary::empty());

    let query = "SELECT ?s ?o WHERE { ?s <urn:a/name> ?o }";
    let evaluator = OxigraphEvaluator::new();

    let from_compressed = sparql::execute(&compressed_store, &evaluator, query).expect("compressed");
    let from_plain = sparql::execute(&plain_store, &evaluator, query).expect("plain");

    let QueryOutcome::Bindings(mut a) = from_compressed else {
        panic!("bindings")
    };
    let QueryOutcome::Bindings(mut b) = from_plain else {
        panic!("bindings")
    };
    let key = |row: &serde_json::Map<String, serde_json::Value>| {
        serde_json::to_string(row).expect("row")
    };
    a.sort_by_key(|r| key(r));
    b.sort_by_key(|r| key(r));
    assert_eq!(a, b);
}

#[test]
fn test_evaluator_failure_reported_as_evaluator_error() {
    let store = loaded_store(dictionary());
    let err = sparql::execute(&store, &OxigraphEvaluator::new(), "SELECT ?s WHERE {")
        .expect_err("parse failure");
    assert_eq!(err.kind(), "EvaluatorError");
}
