//! Normalizer round trips: flattening, dictionary compression, and the two
//! expansion modes, including the S1 end-to-end scenario.

use proptest::prelude::*;
use serde_json::{json, Value};
use urdf::jsonld::{
    compress_dataset, compress_node, expand_graph_value, expand_query_value, flatten,
};
use urdf::Dictionary;

fn dictionary() -> Dictionary {
    Dictionary::new(vec![
        "urn:a/type".to_string(),
        "urn:a/name".to_string(),
    ])
}

#[test]
fn test_s1_compress_then_expand_returns_original() {
    let dict = dictionary();
    let doc = json!({
        "@id": "urn:x",
        "urn:a/type": [{"@id": "urn:C"}],
        "urn:a/name": [{"@value": "N"}]
    });

    let dataset = flatten(&doc, "").expect("flatten");
    let compressed = compress_dataset(&dataset, &dict);

    let (_, nodes) = &compressed.graphs[0];
    assert!(nodes[0].contains_key("z:0"));
    assert!(nodes[0].contains_key("z:1"));
    assert!(!nodes[0].contains_key("urn:a/type"));

    let expanded = expand_graph_value(&Value::Object(nodes[0].clone()), &dict);
    assert_eq!(expanded, doc);
}

#[test]
fn test_flatten_is_stable_on_flat_input() {
    let doc = json!({
        "@id": "urn:x",
        "@type": ["urn:C"],
        "urn:a/name": [{"@value": "N"}]
    });
    let dataset = flatten(&doc, "").expect("flatten");
    let again = flatten(
        &Value::Array(
            dataset.graphs[0]
                .1
                .iter()
                .cloned()
                .map(Value::Object)
                .collect(),
        ),
        "",
    )
    .expect("reflatten");
    assert_eq!(dataset.graphs[0].1, again.graphs[0].1);
}

#[test]
fn test_deeply_nested_document_hoists_every_node() {
    let doc = json!({
        "@id": "urn:a",
        "urn:p": {
            "@id": "urn:b",
            "urn:p": {
                "@id": "urn:c",
                "urn:a/name": "deep"
            }
        }
    });
    let dataset = flatten(&doc, "").expect("flatten");
    let (_, nodes) = &dataset.graphs[0];
    assert_eq!(nodes.len(), 3);
    // Each level is replaced in situ by a reference
    let a = nodes
        .iter()
        .find(|n| n["@id"] == json!("urn:a"))
        .expect("a");
    assert_eq!(a["urn:p"], json!([{"@id": "urn:b"}]));
}

#[test]
fn test_query_expansion_handles_embedded_references() {
    let dict = dictionary();
    let binding = json!({
        "s": {"type": "uri", "value": "z:0"},
        "o": {"type": "literal", "value": "see <z:1> for details"}
    });
    let expanded = expand_query_value(&binding, &dict);
    assert_eq!(expanded["s"]["value"], json!("urn:a/type"));
    assert_eq!(
        expanded["o"]["value"],
        json!("see <urn:a/name> for details")
    );
}

#[test]
fn test_graph_expansion_is_conservative() {
    let dict = dictionary();
    // Embedded tokens inside strings stay; only exact-form strings decode
    let node = json!({"@id": "z:0", "urn:p": [{"@value": "keep <z:1>"}]});
    let expanded = expand_graph_value(&node, &dict);
    assert_eq!(expanded["@id"], json!("urn:a/type"));
    assert_eq!(expanded["urn:p"][0]["@value"], json!("keep <z:1>"));
}

#[test]
fn test_compression_skips_keywords_and_value_payloads() {
    let dict = dictionary();
    let node = json!({
        "@id": "urn:x",
        "@type": ["urn:a/type"],
        "urn:a/name": [{"@value": "urn:a/name", "@language": "en"}]
    });
    let compressed = compress_node(node.as_object().expect("node"), &dict);
    assert_eq!(compressed["@type"], json!(["z:0"]));
    // The literal payload matches a dictionary IRI but is never rewritten
    assert_eq!(
        compressed["z:1"],
        json!([{"@value": "urn:a/name", "@language": "en"}])
    );
}

proptest! {
    /// Dictionary round-trip: expand(compress(s)) = s for known IRIs and
    /// in-range bare tokens; unknown inputs pass through both directions.
    #[test]
    fn prop_dictionary_round_trip(index in 0usize..2, unknown in "[a-z]{1,12}") {
        let dict = dictionary();

        let iri = dict.iri_of(index).expect("indexed iri").to_string();
        prop_assert_eq!(dict.expand_token(&dict.compress_token(&iri)), iri);

        let token = format!("z:{index}");
        prop_assert_eq!(dict.compress_token(&dict.expand_token(&token)), token);

        let passthrough = format!("urn:unknown/{unknown}");
        prop_assert_eq!(dict.compress_token(&passthrough), passthrough.clone());
        prop_assert_eq!(dict.expand_token(&passthrough), passthrough);
    }
}
