//! Quad Store
//!
//! In-memory named-graph container. Graphs are keyed by graph id, nodes by
//! `@id`; both keep insertion order so exports and the evaluator quad view
//! are deterministic. Nodes are held in compressed (token) form internally
//! and expanded before anything leaves the store.
//!
//! Set semantics per graph: duplicate quads within a graph are collapsed.
//! Identifiers are unique per graph; merging during load unions values,
//! preferring existing scalars over overwrites and concatenating arrays.

mod quads;

pub use quads::dataset_quads;

use std::sync::Arc;

use indexmap::IndexMap;
use oxigraph::model::Quad;
use serde_json::{json, Value};

use crate::dictionary::Dictionary;
use crate::error::{UrdfError, UrdfResult};
use crate::jsonld::{
    compress_dataset, expand_graph_value, flatten, node_id, validate_array_valued, Node,
};

/// Graph id of the unnamed graph used when a load carries no target.
pub const DEFAULT_GRAPH: &str = "";

/// One named graph: `@id` -> normalized node, in insertion order.
pub type Graph = IndexMap<String, Node>;

/// The in-memory named-graph store.
pub struct UrdfStore {
    dict: Arc<Dictionary>,
    graphs: IndexMap<String, Graph>,
}

impl UrdfStore {
    pub fn new(dict: Arc<Dictionary>) -> Self {
        UrdfStore {
            dict,
            graphs: IndexMap::new(),
        }
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    /// Ingests a JSON-LD document: flatten, compress, validate, merge.
    ///
    /// Validation covers the whole dataset before the first write, so a
    /// rejected document leaves the store untouched. Returns the ids of the
    /// graphs that received nodes, in expanded form.
    pub fn load(&mut self, doc: &Value, default_gid: Option<&str>) -> UrdfResult<Vec<String>> {
        let dataset = flatten(doc, default_gid.unwrap_or(DEFAULT_GRAPH))?;
        let compressed = compress_dataset(&dataset, &self.dict);
        for (_, nodes) in &compressed.graphs {
            validate_array_valued(nodes)?;
        }

        let mut touched = Vec::new();
        for (gid, nodes) in compressed.graphs {
            let graph = self.graphs.entry(gid.clone()).or_default();
            for node in nodes {
                insert_node(graph, node);
            }
            touched.push(self.dict.expand_token(&gid));
        }
        Ok(touched)
    }

    /// Removes one named graph, or every graph when `gid` is `None`.
    pub fn clear(&mut self, gid: Option<&str>) {
        match gid {
            Some(g) => {
                let key = self.dict.compress_token(g);
                self.graphs.shift_remove(&key);
            }
            None => self.graphs.clear(),
        }
    }

    /// Removes a single node. Returns whether it was present.
    pub fn remove_node(&mut self, gid: &str, id: &str) -> bool {
        let gkey = self.dict.compress_token(gid);
        let nkey = self.dict.compress_token(id);
        match self.graphs.get_mut(&gkey) {
            Some(graph) => graph.shift_remove(&nkey).is_some(),
            None => false,
        }
    }

    /// Whether a node exists in the given graph.
    pub fn contains(&self, gid: &str, id: &str) -> bool {
        let gkey = self.dict.compress_token(gid);
        let nkey = self.dict.compress_token(id);
        self.graphs
            .get(&gkey)
            .is_some_and(|graph| graph.contains_key(&nkey))
    }

    /// Returns the expanded node with the given `@id`, optionally scoped to
    /// one graph. Not-found is signalled distinctly from other errors.
    pub fn find(&self, id: &str, gid: Option<&str>) -> UrdfResult<Node> {
        let nkey = self.dict.compress_token(id);
        let found = match gid {
            Some(g) => {
                let gkey = self.dict.compress_token(g);
                self.graphs.get(&gkey).and_then(|graph| graph.get(&nkey))
            }
            None => self
                .graphs
                .values()
                .find_map(|graph| graph.get(&nkey)),
        };
        let node = found.ok_or_else(|| UrdfError::not_found("node", id))?;
        expand_node(node, &self.dict)
    }

    /// Returns the expanded nodes of one graph (or the default graph).
    pub fn find_graph(&self, gid: Option<&str>) -> UrdfResult<Vec<Node>> {
        match gid {
            Some(g) => {
                let gkey = self.dict.compress_token(g);
                let graph = self
                    .graphs
                    .get(&gkey)
                    .ok_or_else(|| UrdfError::not_found("graph", g))?;
                graph.values().map(|n| expand_node(n, &self.dict)).collect()
            }
            None => match self.graphs.get(DEFAULT_GRAPH) {
                Some(graph) => graph.values().map(|n| expand_node(n, &self.dict)).collect(),
                None => Ok(Vec::new()),
            },
        }
    }

    /// The expanded dataset form of one graph, as served by the export
    /// endpoint.
    pub fn export_graph(&self, gid: &str) -> UrdfResult<Value> {
        let nodes = self.find_graph(Some(gid))?;
        Ok(json!({
            "@id": gid,
            "@graph": nodes.into_iter().map(Value::Object).collect::<Vec<_>>(),
        }))
    }

    /// Triple count of one named graph, `None` for an unknown graph.
    pub fn graph_size(&self, gid: &str) -> Option<usize> {
        let gkey = self.dict.compress_token(gid);
        self.graphs
            .get(&gkey)
            .map(|graph| graph.values().map(node_triples).sum())
    }

    /// Triple count across the whole store.
    pub fn total_size(&self) -> usize {
        self.graphs
            .values()
            .flat_map(|graph| graph.values())
            .map(node_triples)
            .sum()
    }

    /// Expanded graph ids, in insertion order.
    pub fn graph_ids(&self) -> Vec<String> {
        self.graphs
            .keys()
            .map(|gid| self.dict.expand_token(gid))
            .collect()
    }

    pub fn has_graph(&self, gid: &str) -> bool {
        let gkey = self.dict.compress_token(gid);
        self.graphs.contains_key(&gkey)
    }

    /// Snapshot of one graph in internal (compressed) form.
    pub fn snapshot_graph(&self, gid: &str) -> Option<Graph> {
        let gkey = self.dict.compress_token(gid);
        self.graphs.get(&gkey).cloned()
    }

    /// Puts a previously taken snapshot back, replacing whatever the graph
    /// holds. Used to restore the prior state after a failed rebuild.
    pub fn restore_graph(&mut self, gid: &str, graph: Graph) {
        let gkey = self.dict.compress_token(gid);
        self.graphs.insert(gkey, graph);
    }

    /// The quad view of the whole store, handed to the SPARQL evaluator.
    pub fn quads(&self) -> Vec<Quad> {
        dataset_quads(&self.graphs)
    }
}

/// Triples carried by one node: one per `@type` member plus one per
/// predicate array element.
fn node_triples(node: &Node) -> usize {
    node.iter()
        .map(|(key, value)| match key.as_str() {
            "@id" => 0,
            _ => value.as_array().map_or(0, Vec::len),
        })
        .sum()
}

fn expand_node(node: &Node, dict: &Dictionary) -> UrdfResult<Node> {
    match expand_graph_value(&Value::Object(node.clone()), dict) {
        Value::Object(map) => Ok(map),
        _ => Err(UrdfError::internal("node expansion changed value shape")),
    }
}

/// Union merge on id collision: `@type` and predicate arrays concatenate
/// with duplicate entries collapsed; an existing scalar wins.
fn insert_node(graph: &mut Graph, node: Node) {
    let Some(id) = node_id(&node).map(String::from) else {
        return;
    };
    match graph.get_mut(&id) {
        None => {
            graph.insert(id, node);
        }
        Some(existing) => {
            for (key, value) in node {
                match existing.get_mut(&key) {
                    None => {
                        existing.insert(key, value);
                    }
                    Some(Value::Array(current)) => {
                        if let Value::Array(items) = value {
                            for item in items {
                                if !current.contains(&item) {
                                    current.push(item);
                                }
                            }
                        }
                    }
                    Some(_) => {}
                }
            }
        }
    }
}
