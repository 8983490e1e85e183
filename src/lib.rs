//! # uRDF Runtime
//!
//! An in-memory RDF quad store bound to a live flow-engine instance,
//! extended with a deterministic rule-driven inference engine that rebuilds
//! an "inferred" named graph on every change.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! flow configuration (host admin API)
//!     |
//! [Translator]      -> application JSON-LD graph (stable identifiers)
//!     |
//! [Normalizer]      -> flatten + predicate-array normalization
//!     |
//! [Dictionary]      -> IRI <-> z:<n> token compression
//!     |
//! [Quad Store]      -> named graphs: ontology | rules | application |
//!     |                environment | inferred
//! [SPARQL Gateway]  -> query rewriting, contract enforcement, expansion
//!     |
//! [Orchestrator]    -> SPARQL + N3 projection rules, deterministic
//!     |                inferred-graph replacement
//! [HTTP Facade]     -> /urdf endpoints + urdf/events topic
//! ```
//!
//! ## Concurrency
//!
//! The store is owned by a single runtime task that serializes every
//! mutation and query; everything else goes through [`RuntimeHandle`].
//! Host flow events are debounced with a coalescing window before they
//! trigger a reload cycle.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use urdf::{runtime, Config, OxigraphEvaluator};
//!
//! let config = Config::load()?;
//! let (handle, _task) = runtime::start(
//!     config.clone(),
//!     Arc::new(OxigraphEvaluator::new()),
//!     None, // SPARQL-only mode
//! ).await;
//!
//! handle.flow_event("flows:deployed").await;
//! let answer = handle.query("SELECT ?s WHERE { ?s a <urn:nrua:Flow> }".into()).await?;
//! ```

pub mod config;
pub mod dictionary;
pub mod error;
pub mod events;
pub mod host;
pub mod http;
pub mod inference;
pub mod jsonld;
pub mod reasoner;
pub mod runtime;
pub mod sparql;
pub mod store;
pub mod translator;
pub mod vocab;

// Re-export the types that make up the public surface
pub use config::Config;
pub use dictionary::Dictionary;
pub use error::{UrdfError, UrdfResult};
pub use events::{Event, EventBus, RequestInfo};
pub use inference::{InferenceEngine, InferenceOutcome};
pub use reasoner::{DerivedFact, Reasoner};
pub use runtime::{LoadFileInfo, RuntimeHandle, SizeInfo};
pub use sparql::{OxigraphEvaluator, QueryOutcome, SparqlEvaluator};
pub use store::UrdfStore;
pub use translator::Translator;
