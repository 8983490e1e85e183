//! SPARQL Gateway
//!
//! Queries pass through three stages before reaching the evaluator:
//!
//! 1. **Contract enforcement** - standalone `PREFIX`/`BASE` tokens are
//!    rejected (the store refuses to resolve external contexts; callers
//!    must expand prefixes themselves).
//! 2. **Rewriting** - every full IRI inside angle brackets is compressed to
//!    its `<z:i>` token when known. The IRI at dictionary index 0 (the type
//!    predicate) is rewritten to the bare `a` keyword instead, mirroring
//!    the store's internal representation of types. The rewriter tracks
//!    parentheses and never performs the `a` substitution inside a call
//!    expression.
//! 3. **Expansion** - evaluator bindings are deeply expanded before they
//!    leave the core, including tokens embedded in string values.

mod evaluator;

pub use evaluator::{OxigraphEvaluator, QueryOutcome, SparqlEvaluator};

use serde_json::Value;

use crate::dictionary::Dictionary;
use crate::error::{UrdfError, UrdfResult};
use crate::jsonld::expand_query_value;
use crate::store::UrdfStore;

/// Full query path: guard, rewrite, evaluate, expand.
pub fn execute(
    store: &UrdfStore,
    evaluator: &dyn SparqlEvaluator,
    sparql: &str,
) -> UrdfResult<QueryOutcome> {
    guard(sparql)?;
    let rewritten = rewrite(sparql, store.dictionary());
    let outcome = evaluator.evaluate(&rewritten, &store.quads())?;
    Ok(match outcome {
        QueryOutcome::Boolean(b) => QueryOutcome::Boolean(b),
        QueryOutcome::Bindings(rows) => QueryOutcome::Bindings(
            rows.into_iter()
                .map(|row| {
                    match expand_query_value(&Value::Object(row), store.dictionary()) {
                        Value::Object(map) => map,
                        _ => serde_json::Map::new(),
                    }
                })
                .collect(),
        ),
    })
}

/// Rejects queries carrying standalone `PREFIX` or `BASE` keywords
/// (case-insensitive), outside string literals and IRI refs. Variables such
/// as `?base` do not count.
pub fn guard(sparql: &str) -> UrdfResult<()> {
    for token in keywords(sparql) {
        if token.eq_ignore_ascii_case("prefix") || token.eq_ignore_ascii_case("base") {
            return Err(UrdfError::contract(format!(
                "{} declarations are not accepted; expand IRIs before querying",
                token.to_uppercase()
            )));
        }
    }
    Ok(())
}

/// Bare word tokens of a query, skipping string literals, IRI refs,
/// comments, and variable names.
fn keywords(sparql: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = sparql.chars().peekable();
    let mut prev: Option<char> = None;
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                skip_string(&mut chars, c);
                prev = Some(c);
            }
            '<' => {
                skip_iri(&mut chars);
                prev = Some('>');
            }
            '#' => {
                for nc in chars.by_ref() {
                    if nc == '\n' {
                        break;
                    }
                }
                prev = Some('\n');
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                word.push(c);
                while let Some(&nc) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || nc == '_' {
                        word.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let is_variable = matches!(prev, Some('?' | '$'));
                // Words adjacent to ':' are prefixed-name parts, not
                // keywords.
                let is_prefixed = chars.peek() == Some(&':') || prev == Some(':');
                if !is_variable && !is_prefixed {
                    tokens.push(word);
                }
                prev = Some('w');
            }
            other => prev = Some(other),
        }
    }
    tokens
}

fn skip_string<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>, quote: char) {
    let mut escaped = false;
    for c in chars.by_ref() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            break;
        }
    }
}

fn skip_iri<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    for c in chars.by_ref() {
        if c == '>' || c.is_whitespace() {
            break;
        }
    }
}

/// Rewrites every known full IRI inside angle brackets to its compressed
/// form. The index-0 IRI becomes the bare keyword `a` outside parentheses.
pub fn rewrite(sparql: &str, dict: &Dictionary) -> String {
    let mut out = String::with_capacity(sparql.len());
    let mut chars = sparql.chars().peekable();
    let mut depth: usize = 0;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                copy_string(&mut chars, c, &mut out);
            }
            '(' => {
                depth += 1;
                out.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            '<' => {
                // Collect a candidate IRI ref; bail out on whitespace,
                // which marks a comparison operator instead.
                let mut candidate = String::new();
                let mut closed = false;
                while let Some(&nc) = chars.peek() {
                    if nc == '>' {
                        chars.next();
                        closed = true;
                        break;
                    }
                    if nc.is_whitespace() || nc == '<' {
                        break;
                    }
                    candidate.push(nc);
                    chars.next();
                }
                if closed {
                    match dict.index_of(&candidate) {
                        Some(0) if depth == 0 => out.push('a'),
                        Some(i) => {
                            out.push('<');
                            out.push_str(&format!("z:{i}"));
                            out.push('>');
                        }
                        None => {
                            out.push('<');
                            out.push_str(&candidate);
                            out.push('>');
                        }
                    }
                } else {
                    out.push('<');
                    out.push_str(&candidate);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn copy_string<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
    quote: char,
    out: &mut String,
) {
    let mut escaped = false;
    for c in chars.by_ref() {
        out.push(c);
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> Dictionary {
        Dictionary::new(vec![
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string(),
            "urn:a/type".to_string(),
            "urn:a/name".to_string(),
        ])
    }

    #[test]
    fn test_guard_rejects_prefix() {
        assert!(guard("PREFIX ex: <urn:ex/> SELECT ?s WHERE { ?s ex:p ?o }").is_err());
        assert!(guard("prefix ex: <urn:ex/>").is_err());
        assert!(guard("BASE <urn:base/>").is_err());
    }

    #[test]
    fn test_guard_accepts_plain_queries() {
        assert!(guard("SELECT ?s WHERE { ?s <urn:a/name> ?o }").is_ok());
        assert!(guard("ASK { ?s ?p ?o }").is_ok());
    }

    #[test]
    fn test_guard_ignores_strings_and_variables() {
        assert!(guard("SELECT ?base WHERE { ?base <urn:p> \"PREFIX\" }").is_ok());
        assert!(guard("SELECT ?s WHERE { ?s <urn:p> 'base' }").is_ok());
    }

    #[test]
    fn test_rewrite_compresses_known_iris() {
        let q = "SELECT ?o WHERE { <urn:x> <urn:a/name> ?o }";
        assert_eq!(
            rewrite(q, &dict()),
            "SELECT ?o WHERE { <urn:x> <z:2> ?o }"
        );
    }

    #[test]
    fn test_rewrite_type_predicate_becomes_a() {
        let q = "SELECT ?s WHERE { ?s <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <urn:C> }";
        assert_eq!(rewrite(q, &dict()), "SELECT ?s WHERE { ?s a <urn:C> }");
    }

    #[test]
    fn test_rewrite_no_a_inside_call_expressions() {
        let q = "SELECT ?s WHERE { ?s ?p ?o FILTER(?p = <http://www.w3.org/1999/02/22-rdf-syntax-ns#type>) }";
        assert_eq!(
            rewrite(q, &dict()),
            "SELECT ?s WHERE { ?s ?p ?o FILTER(?p = <z:0>) }"
        );
    }

    #[test]
    fn test_rewrite_leaves_comparison_operators() {
        let q = "SELECT ?s WHERE { ?s <urn:p> ?o FILTER(?o < 5) }";
        assert_eq!(rewrite(q, &dict()), q);
    }

    #[test]
    fn test_rewrite_leaves_strings_untouched() {
        let q = "SELECT ?s WHERE { ?s <urn:a/name> \"<urn:a/name>\" }";
        assert_eq!(
            rewrite(q, &dict()),
            "SELECT ?s WHERE { ?s <z:2> \"<urn:a/name>\" }"
        );
    }
}
