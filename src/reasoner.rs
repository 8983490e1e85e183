//! N3 reasoner capability.
//!
//! The reasoner is an optional injected capability: it receives a program
//! (N-Triples facts, a blank line, then the rule's N3 text) and streams
//! derived facts through a callback. Absence is a first-class state; the
//! orchestrator runs in SPARQL-only mode without it.

use crate::error::UrdfResult;

/// One fact produced by the reasoner, in raw N3 term syntax: the subject is
/// an IRI ref or `_:` blank label, the predicate an IRI ref, the object an
/// IRI ref, blank label, or quoted literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl DerivedFact {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        DerivedFact {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// Injected N3 reasoning capability.
pub trait Reasoner: Send + Sync {
    /// Runs the program, invoking `on_derived` once per derived fact.
    fn reason(
        &self,
        program: &str,
        on_derived: &mut dyn FnMut(DerivedFact),
    ) -> UrdfResult<()>;
}
