//! Inference Orchestrator
//!
//! Reads the rules graph, executes each rule through its projection path,
//! and deterministically replaces the inferred graph:
//!
//! ```text
//! rules graph
//!     |
//! [partition]   - sparql rules | n3 rules (reasoner capability required)
//!     |
//! [execute]     - SPARQL bindings -> s/p/o triples
//!     |           N3: projection bindings -> N-Triples facts -> reasoner
//! [filter]      - drop urn:nrua:pv: helper predicates
//!     |
//! [aggregate]   - group by subject into array-valued nodes
//!     |
//! [replace]     - clear + load the inferred graph (prior state restored
//!                 if the replacement itself fails)
//! ```
//!
//! Failure isolation: a failing rule is logged and skipped, a failing
//! binding is logged and skipped, and a missing reasoner is logged once
//! while SPARQL rules keep executing.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{UrdfError, UrdfResult};
use crate::jsonld::{first_reference, first_string, has_type, node_id, Node};
use crate::reasoner::{DerivedFact, Reasoner};
use crate::sparql::{self, QueryOutcome, SparqlEvaluator};
use crate::store::UrdfStore;
use crate::vocab;

/// Summary of one orchestration cycle, published as the `inference` event.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InferenceOutcome {
    /// Rules seen in the rules graph.
    pub rules: usize,
    /// Triples loaded into the inferred graph.
    pub triples: usize,
    /// The trigger that caused the recomputation.
    pub reason: String,
    /// Resulting per-graph triple counts.
    pub graph_sizes: IndexMap<String, usize>,
}

/// Rule-driven rebuild of the inferred graph.
pub struct InferenceEngine {
    rules_gid: String,
    inferred_gid: String,
    reasoner_warned: bool,
}

impl InferenceEngine {
    pub fn new(rules_gid: impl Into<String>, inferred_gid: impl Into<String>) -> Self {
        InferenceEngine {
            rules_gid: rules_gid.into(),
            inferred_gid: inferred_gid.into(),
            reasoner_warned: false,
        }
    }

    /// Runs one cycle. The inferred graph afterwards equals the fresh
    /// computation, or on error its prior state.
    pub fn run(
        &mut self,
        store: &mut UrdfStore,
        evaluator: &dyn SparqlEvaluator,
        reasoner: Option<&dyn Reasoner>,
        reason: &str,
    ) -> UrdfResult<InferenceOutcome> {
        let rule_nodes = match store.find_graph(Some(self.rules_gid.as_str())) {
            Ok(nodes) => nodes,
            Err(UrdfError::NotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };

        if rule_nodes.is_empty() {
            store.clear(Some(self.inferred_gid.as_str()));
            return Ok(self.outcome(store, 0, 0, reason));
        }

        // Id-indexed view for dereferencing hasPart projection references.
        let by_id: IndexMap<&str, &Node> = rule_nodes
            .iter()
            .filter_map(|n| node_id(n).map(|id| (id, n)))
            .collect();

        let mut rules = 0usize;
        let mut derived: Vec<(String, String, Value)> = Vec::new();
        for node in &rule_nodes {
            if !has_type(node, vocab::NRUA_RULE) {
                continue;
            }
            rules += 1;
            let rule_id = node_id(node).unwrap_or("<anonymous>").to_string();

            let Some(text) = first_string(node, vocab::SCHEMA_TEXT) else {
                warn!(rule = %rule_id, "rule_without_text_skipped");
                continue;
            };

            if is_n3_rule(node) {
                self.run_n3_rule(
                    store, evaluator, reasoner, node, &by_id, &rule_id, text,
                    &mut derived,
                );
            } else {
                run_sparql_rule(store, evaluator, &rule_id, text, &mut derived);
            }
        }

        // Helper predicates emitted during reasoning never persist.
        derived.retain(|(_, p, _)| !p.starts_with(vocab::NRUA_PV_PREFIX));
        let triples = derived.len();

        let nodes = aggregate(derived);
        self.replace_inferred(store, nodes)?;

        let outcome = self.outcome(store, rules, triples, reason);
        info!(
            rules = outcome.rules,
            triples = outcome.triples,
            reason = %outcome.reason,
            "inference_cycle_complete"
        );
        Ok(outcome)
    }

    fn run_n3_rule(
        &mut self,
        store: &UrdfStore,
        evaluator: &dyn SparqlEvaluator,
        reasoner: Option<&dyn Reasoner>,
        node: &Node,
        by_id: &IndexMap<&str, &Node>,
        rule_id: &str,
        rule_text: &str,
        derived: &mut Vec<(String, String, Value)>,
    ) {
        let Some(reasoner) = reasoner else {
            if !self.reasoner_warned {
                warn!("no reasoner capability available; n3 rules are skipped");
                self.reasoner_warned = true;
            }
            return;
        };

        // The projection query lives in a SoftwareSourceCode sub-resource.
        let Some(projection) = first_reference(node, vocab::SCHEMA_HAS_PART)
            .and_then(|part_id| by_id.get(part_id))
            .filter(|part| has_type(part, vocab::SCHEMA_SOFTWARE_SOURCE_CODE))
            .and_then(|part| first_string(part, vocab::SCHEMA_TEXT))
        else {
            warn!(rule = %rule_id, "n3_rule_without_projection_skipped");
            return;
        };

        let rows = match sparql::execute(store, evaluator, projection) {
            Ok(QueryOutcome::Bindings(rows)) => rows,
            Ok(QueryOutcome::Boolean(_)) => {
                warn!(rule = %rule_id, "n3_projection_returned_boolean_skipped");
                return;
            }
            Err(e) => {
                warn!(rule = %rule_id, error = %e, "n3_projection_failed_skipped");
                return;
            }
        };

        let mut facts = Vec::new();
        for row in &rows {
            match serialize_binding(row) {
                Some(line) => facts.push(line),
                None => {
                    warn!(rule = %rule_id, "binding_not_serializable_skipped");
                }
            }
        }

        let program = format!("{}\n\n{}", facts.join("\n"), rule_text);
        let mut collected: Vec<DerivedFact> = Vec::new();
        if let Err(e) = reasoner.reason(&program, &mut |fact| collected.push(fact)) {
            warn!(rule = %rule_id, error = %e, "reasoner_failed_skipped");
            return;
        }
        for fact in collected {
            match decode_fact(&fact) {
                Some(triple) => derived.push(triple),
                None => {
                    warn!(rule = %rule_id, "derived_fact_not_decodable_skipped");
                }
            }
        }
    }

    /// Clear + load replacement of the inferred graph. The prior graph is
    /// restored when the load itself reports an error, so a failed cycle
    /// never leaves a partially populated graph.
    fn replace_inferred(&self, store: &mut UrdfStore, nodes: Vec<Node>) -> UrdfResult<()> {
        let snapshot = store.snapshot_graph(&self.inferred_gid);
        store.clear(Some(self.inferred_gid.as_str()));
        if nodes.is_empty() {
            return Ok(());
        }
        let dataset = json!({
            "@id": self.inferred_gid.clone(),
            "@graph": nodes.into_iter().map(Value::Object).collect::<Vec<_>>(),
        });
        if let Err(e) = store.load(&dataset, None) {
            if let Some(prior) = snapshot {
                store.restore_graph(&self.inferred_gid, prior);
            }
            return Err(e);
        }
        Ok(())
    }

    fn outcome(
        &self,
        store: &UrdfStore,
        rules: usize,
        triples: usize,
        reason: &str,
    ) -> InferenceOutcome {
        let mut graph_sizes = IndexMap::new();
        for gid in store.graph_ids() {
            if let Some(size) = store.graph_size(&gid) {
                graph_sizes.insert(gid, size);
            }
        }
        InferenceOutcome {
            rules,
            triples,
            reason: reason.to_string(),
            graph_sizes,
        }
    }
}

/// The language slot selects the execution path; the encoding format is an
/// alternative N3 signal when the language slot is absent.
fn is_n3_rule(node: &Node) -> bool {
    match first_string(node, vocab::SCHEMA_PROGRAMMING_LANGUAGE)
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("n3" | "notation3") => true,
        Some(_) => false,
        None => first_string(node, vocab::SCHEMA_ENCODING_FORMAT)
            .map(str::to_lowercase)
            .is_some_and(|f| f.contains("n3")),
    }
}

fn run_sparql_rule(
    store: &UrdfStore,
    evaluator: &dyn SparqlEvaluator,
    rule_id: &str,
    text: &str,
    derived: &mut Vec<(String, String, Value)>,
) {
    match sparql::execute(store, evaluator, text) {
        Ok(QueryOutcome::Bindings(rows)) => {
            for row in &rows {
                match triple_from_binding(row) {
                    Some(triple) => derived.push(triple),
                    None => {
                        warn!(rule = %rule_id, "binding_without_spo_terms_skipped");
                    }
                }
            }
        }
        Ok(QueryOutcome::Boolean(_)) => {
            warn!(rule = %rule_id, "rule_returned_boolean_skipped");
        }
        Err(e) => {
            warn!(rule = %rule_id, error = %e, "rule_query_failed_skipped");
        }
    }
}

/// Picks a binding term by its canonical name or common synonym.
fn pick<'a>(row: &'a Map<String, Value>, names: [&str; 2]) -> Option<&'a Map<String, Value>> {
    names
        .iter()
        .find_map(|n| row.get(*n))
        .and_then(Value::as_object)
}

/// Interprets one result binding as a triple: `s`/`p` normalize to IRIs or
/// blank labels, `o` to a JSON-LD object.
fn triple_from_binding(row: &Map<String, Value>) -> Option<(String, String, Value)> {
    let s = pick(row, ["s", "subject"])?;
    let p = pick(row, ["p", "predicate"])?;
    let o = pick(row, ["o", "object"])?;

    let subject = identifier_of(s)?;
    if term_type(p)? != "uri" {
        return None;
    }
    let predicate = term_value(p)?.to_string();
    Some((subject, predicate, term_to_jsonld(o)?))
}

fn term_type(term: &Map<String, Value>) -> Option<&str> {
    term.get("type").and_then(Value::as_str)
}

fn term_value(term: &Map<String, Value>) -> Option<&str> {
    term.get("value").and_then(Value::as_str)
}

/// IRI or `_:` blank label of a uri/bnode term.
fn identifier_of(term: &Map<String, Value>) -> Option<String> {
    match term_type(term)? {
        "uri" => Some(term_value(term)?.to_string()),
        "bnode" => Some(format!("_:{}", term_value(term)?)),
        _ => None,
    }
}

fn term_to_jsonld(term: &Map<String, Value>) -> Option<Value> {
    match term_type(term)? {
        "uri" | "bnode" => Some(json!({"@id": identifier_of(term)?})),
        "literal" => {
            let mut obj = Map::new();
            obj.insert(
                "@value".to_string(),
                Value::String(term_value(term)?.to_string()),
            );
            if let Some(lang) = term.get("xml:lang").and_then(Value::as_str) {
                obj.insert("@language".to_string(), Value::String(lang.to_string()));
            } else if let Some(dt) = term.get("datatype").and_then(Value::as_str) {
                obj.insert("@type".to_string(), Value::String(dt.to_string()));
            }
            Some(Value::Object(obj))
        }
        _ => None,
    }
}

/// Serializes one projection binding as an N-Triples line.
fn serialize_binding(row: &Map<String, Value>) -> Option<String> {
    let s = pick(row, ["s", "subject"])?;
    let p = pick(row, ["p", "predicate"])?;
    let o = pick(row, ["o", "object"])?;

    let subject = match term_type(s)? {
        "uri" => format!("<{}>", term_value(s)?),
        "bnode" => format!("_:{}", term_value(s)?),
        _ => return None,
    };
    if term_type(p)? != "uri" {
        return None;
    }
    let predicate = format!("<{}>", term_value(p)?);
    let object = match term_type(o)? {
        "uri" => format!("<{}>", term_value(o)?),
        "bnode" => format!("_:{}", term_value(o)?),
        "literal" => {
            let escaped = escape_literal(term_value(o)?);
            if let Some(lang) = o.get("xml:lang").and_then(Value::as_str) {
                format!("\"{escaped}\"@{lang}")
            } else if let Some(dt) = o.get("datatype").and_then(Value::as_str) {
                format!("\"{escaped}\"^^<{dt}>")
            } else {
                format!("\"{escaped}\"")
            }
        }
        _ => return None,
    };
    Some(format!("{subject} {predicate} {object} ."))
}

fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decodes a raw derived fact: `s` as IRI or blank label, `p` as IRI, `o`
/// as IRI, blank, or literal with N3-style quote stripping.
fn decode_fact(fact: &DerivedFact) -> Option<(String, String, Value)> {
    let subject = decode_identifier(&fact.subject)?;
    let predicate = strip_iri_ref(&fact.predicate)?;
    let object = decode_object(&fact.object)?;
    Some((subject, predicate.to_string(), object))
}

fn strip_iri_ref(raw: &str) -> Option<&str> {
    raw.strip_prefix('<').and_then(|r| r.strip_suffix('>'))
}

fn decode_identifier(raw: &str) -> Option<String> {
    if raw.starts_with("_:") {
        return Some(raw.to_string());
    }
    strip_iri_ref(raw).map(String::from).or_else(|| {
        // Bare IRIs without angle brackets also pass
        raw.contains(':').then(|| raw.to_string())
    })
}

fn decode_object(raw: &str) -> Option<Value> {
    if raw.starts_with("_:") {
        return Some(json!({"@id": raw}));
    }
    if let Some(iri) = strip_iri_ref(raw) {
        return Some(json!({"@id": iri}));
    }
    if let Some(rest) = raw.strip_prefix('"') {
        // Closing quote position, honoring escapes
        let mut end = None;
        let mut escaped = false;
        for (i, c) in rest.char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                end = Some(i);
                break;
            }
        }
        let end = end?;
        let value = unescape_literal(&rest[..end]);
        let suffix = &rest[end + 1..];
        if let Some(lang) = suffix.strip_prefix('@') {
            return Some(json!({"@value": value, "@language": lang}));
        }
        if let Some(dt) = suffix.strip_prefix("^^").and_then(strip_iri_ref) {
            return Some(json!({"@value": value, "@type": dt}));
        }
        return Some(json!({"@value": value}));
    }
    // Bare tokens: numbers and booleans become typed JSON values
    if let Ok(i) = raw.parse::<i64>() {
        return Some(json!({"@value": i}));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Some(json!({"@value": f}));
    }
    if raw == "true" || raw == "false" {
        return Some(json!({"@value": raw == "true"}));
    }
    if raw.contains(':') {
        return Some(json!({"@id": raw}));
    }
    Some(json!({"@value": raw}))
}

/// Groups derived triples by subject into normalized nodes. Type triples
/// land in `@type`; duplicate values collapse.
fn aggregate(derived: Vec<(String, String, Value)>) -> Vec<Node> {
    let mut nodes: IndexMap<String, Node> = IndexMap::new();
    for (s, p, o) in derived {
        let node = nodes.entry(s.clone()).or_insert_with(|| {
            let mut n = Node::new();
            n.insert("@id".to_string(), Value::String(s.clone()));
            n
        });
        if p == vocab::RDF_TYPE {
            if let Some(class) = o.get("@id").and_then(Value::as_str) {
                let types = node
                    .entry("@type".to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = types {
                    let class_value = Value::String(class.to_string());
                    if !items.contains(&class_value) {
                        items.push(class_value);
                    }
                }
                continue;
            }
        }
        let values = node
            .entry(p)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = values {
            if !items.contains(&o) {
                items.push(o);
            }
        }
    }
    nodes.into_values().collect()
}
