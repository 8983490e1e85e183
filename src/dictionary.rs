//! IRI Dictionary
//!
//! An ordered, read-only sequence of IRIs defining the `z:<n>` compression
//! token set. Index `i` defines the token `z:i`; the token form and the IRI
//! form are semantically interchangeable. The store holds graphs in token
//! form internally and expands them before anything leaves the core.
//!
//! By convention index 0 is the type predicate, which the SPARQL gateway
//! additionally rewrites to the bare `a` keyword.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{UrdfError, UrdfResult};

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"^z:(\d+)$").unwrap())
}

/// Bidirectional IRI <-> `z:<n>` token mapping.
///
/// Immutable after construction. Lookups never fail: unknown inputs pass
/// through both directions unchanged.
#[derive(Debug, Default)]
pub struct Dictionary {
    iris: Vec<String>,
    index: HashMap<String, usize>,
}

impl Dictionary {
    /// Empty dictionary. Compression and expansion become identities.
    pub fn empty() -> Self {
        Dictionary::default()
    }

    /// Builds a dictionary from an ordered IRI list.
    ///
    /// First occurrence wins; duplicates are ignored without shifting
    /// subsequent indices of earlier entries.
    pub fn new(iris: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(iris.len());
        for (i, iri) in iris.iter().enumerate() {
            index.entry(iri.clone()).or_insert(i);
        }
        Dictionary { iris, index }
    }

    /// Builds a dictionary from a parsed JSON document.
    ///
    /// Fails if the document is not an array of strings; this is fatal for
    /// the loader that supplied the document.
    pub fn from_value(doc: &Value) -> UrdfResult<Self> {
        let entries = doc
            .as_array()
            .ok_or_else(|| UrdfError::config("dictionary document is not an array"))?;
        let mut iris = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let iri = entry.as_str().ok_or_else(|| {
                UrdfError::config(format!("dictionary entry {i} is not a string"))
            })?;
            iris.push(iri.to_string());
        }
        Ok(Dictionary::new(iris))
    }

    /// O(1) expected index lookup.
    pub fn index_of(&self, iri: &str) -> Option<usize> {
        self.index.get(iri).copied()
    }

    /// O(1) IRI lookup.
    pub fn iri_of(&self, i: usize) -> Option<&str> {
        self.iris.get(i).map(String::as_str)
    }

    /// `z:<i>` if the IRI is known, otherwise the input unchanged.
    pub fn compress_token(&self, iri: &str) -> String {
        match self.index_of(iri) {
            Some(i) => format!("z:{i}"),
            None => iri.to_string(),
        }
    }

    /// The IRI if the input is a known `z:<n>` token, otherwise the input
    /// unchanged. Out-of-range tokens pass through.
    pub fn expand_token(&self, s: &str) -> String {
        if let Some(caps) = token_re().captures(s) {
            if let Some(i) = caps[1].parse::<usize>().ok().filter(|&i| i < self.iris.len()) {
                return self.iris[i].clone();
            }
        }
        s.to_string()
    }

    /// True when the string has the exact `z:<n>` shape, in range or not.
    pub fn is_token(s: &str) -> bool {
        token_re().is_match(s)
    }

    pub fn len(&self) -> usize {
        self.iris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iris.is_empty()
    }

    /// The ordered IRI list, as served by the `zurl` endpoint.
    pub fn iris(&self) -> &[String] {
        &self.iris
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dict() -> Dictionary {
        Dictionary::new(vec![
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string(),
            "urn:a/type".to_string(),
            "urn:a/name".to_string(),
        ])
    }

    #[test]
    fn test_index_and_iri_lookup() {
        let d = dict();
        assert_eq!(d.index_of("urn:a/type"), Some(1));
        assert_eq!(d.iri_of(2), Some("urn:a/name"));
        assert_eq!(d.index_of("urn:unknown"), None);
        assert_eq!(d.iri_of(99), None);
    }

    #[test]
    fn test_compress_known_and_unknown() {
        let d = dict();
        assert_eq!(d.compress_token("urn:a/name"), "z:2");
        assert_eq!(d.compress_token("urn:unknown"), "urn:unknown");
    }

    #[test]
    fn test_expand_token_shapes() {
        let d = dict();
        assert_eq!(d.expand_token("z:0"), "http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
        // Out of range passes through
        assert_eq!(d.expand_token("z:99"), "z:99");
        // Not a token at all
        assert_eq!(d.expand_token("z:x"), "z:x");
        assert_eq!(d.expand_token("urn:a/type"), "urn:a/type");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let d = Dictionary::new(vec![
            "urn:dup".to_string(),
            "urn:other".to_string(),
            "urn:dup".to_string(),
        ]);
        assert_eq!(d.index_of("urn:dup"), Some(0));
        // The duplicate slot still expands positionally
        assert_eq!(d.expand_token("z:2"), "urn:dup");
    }

    #[test]
    fn test_from_value_rejects_non_strings() {
        assert!(Dictionary::from_value(&json!({"a": 1})).is_err());
        assert!(Dictionary::from_value(&json!(["urn:a", 42])).is_err());
        let d = Dictionary::from_value(&json!(["urn:a", "urn:b"])).expect("valid");
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_round_trip() {
        let d = dict();
        for iri in d.iris() {
            assert_eq!(d.expand_token(&d.compress_token(iri)), *iri);
        }
        assert_eq!(d.compress_token(&d.expand_token("z:1")), "z:1");
    }
}
