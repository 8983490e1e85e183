//! Translator end-to-end: flow configuration through the store and the
//! query gateway, plus the determinism guarantee across runs.

use std::sync::Arc;

use serde_json::json;
use urdf::sparql::{self, OxigraphEvaluator, QueryOutcome};
use urdf::{Dictionary, Translator, UrdfStore};

const APP_GID: &str = "urn:nrua:g:application";

fn sample_config() -> serde_json::Value {
    json!([
        {"id": "t1", "type": "tab", "label": "Flow 1"},
        {"id": "n1", "type": "inject", "z": "t1", "name": "tick",
         "repeat": "5", "wires": [["n3"]]},
        {"id": "n2", "type": "inject", "z": "t1", "wires": [["n3"]]},
        {"id": "n3", "type": "debug", "z": "t1", "wires": [[]]}
    ])
}

fn loaded_store() -> UrdfStore {
    let dict = Arc::new(Dictionary::new(vec![
        "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string(),
        "http://schema.org/name".to_string(),
        "http://schema.org/keywords".to_string(),
        "urn:nrua:Flow".to_string(),
        "urn:nrua:Node".to_string(),
    ]));
    let mut store = UrdfStore::new(dict);
    let translator = Translator::new("host1");
    let dataset = translator.translate(&sample_config()).expect("translate");
    store.load(&dataset, Some(APP_GID)).expect("load");
    store
}

#[test]
fn test_graphs_from_identical_input_are_identical() {
    let translator = Translator::new("host1");
    let first = translator.translate(&sample_config()).expect("first");
    let second = translator.translate(&sample_config()).expect("second");
    assert_eq!(first, second);

    // And they load to identical graph exports
    let dict = Arc::new(Dictionary::empty());
    let mut store_a = UrdfStore::new(Arc::clone(&dict));
    let mut store_b = UrdfStore::new(dict);
    store_a.load(&first, Some(APP_GID)).expect("a");
    store_b.load(&second, Some(APP_GID)).expect("b");
    assert_eq!(
        store_a.export_graph(APP_GID).expect("a export"),
        store_b.export_graph(APP_GID).expect("b export")
    );
}

#[test]
fn test_flows_queryable_through_gateway() {
    let store = loaded_store();
    let outcome = sparql::execute(
        &store,
        &OxigraphEvaluator::new(),
        "SELECT ?f ?kw WHERE { ?f a <urn:nrua:Flow> . ?f <http://schema.org/keywords> ?kw }",
    )
    .expect("query");

    let QueryOutcome::Bindings(rows) = outcome else {
        panic!("expected bindings");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["f"]["value"], json!("urn:nrua:ft1"));
    assert_eq!(rows[0]["kw"]["value"], json!("debug,inject"));
}

#[test]
fn test_nodes_countable_by_class() {
    let store = loaded_store();
    let outcome = sparql::execute(
        &store,
        &OxigraphEvaluator::new(),
        "SELECT ?n WHERE { ?n a <urn:nrua:Node> }",
    )
    .expect("query");
    let QueryOutcome::Bindings(rows) = outcome else {
        panic!("expected bindings");
    };
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_wiring_traversable() {
    let store = loaded_store();
    let outcome = sparql::execute(
        &store,
        &OxigraphEvaluator::new(),
        "SELECT ?target WHERE { \
             <urn:nrua:nn1> <http://schema.org/hasPart> ?out . \
             ?out <urn:nrua:wiredTo> ?target }",
    )
    .expect("query");
    let QueryOutcome::Bindings(rows) = outcome else {
        panic!("expected bindings");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["target"]["value"], json!("urn:nrua:nn3"));
}

#[test]
fn test_retained_key_reachable_as_property_value() {
    let store = loaded_store();
    let node = store
        .find("urn:nrua:nn1krepeat", Some(APP_GID))
        .expect("property value node");
    assert_eq!(
        node["http://schema.org/value"],
        json!([{"@value": "5"}])
    );
    assert_eq!(node["http://schema.org/name"], json!([{"@value": "repeat"}]));
}
