//! Error taxonomy for the uRDF runtime.
//!
//! Every handler-visible failure maps to one of these variants. Mutation
//! paths either complete fully or leave the store in its prior state; no
//! variant is ever produced after a partial write.

use serde::Serialize;

/// uRDF runtime error type.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub enum UrdfError {
    /// Missing or malformed dictionary / ontology / rules input at startup.
    /// Non-fatal for the affected graph only.
    #[error("config error: {message}")]
    Config { message: String },

    /// A JSON-LD value violates the array-valued predicate invariant.
    #[error("schema violation: {message}")]
    SchemaViolation { message: String },

    /// `find` or `find_graph` called with an unknown identifier.
    #[error("{what} not found: {id}")]
    NotFound { what: String, id: String },

    /// A rule with the same identifier already exists.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// SPARQL evaluation failed; the store is unchanged.
    #[error("evaluator error: {message}")]
    Evaluator { message: String },

    /// Reasoner invocation failed for one rule.
    #[error("reasoner error: {message}")]
    Reasoner { message: String },

    /// `PREFIX`/`BASE` in a query, missing `@id` on loadFile, missing
    /// required fields on rules CRUD.
    #[error("contract violation: {message}")]
    Contract { message: String },

    /// The evaluator reported an unimplemented query feature.
    #[error("not implemented: {message}")]
    NotImplemented { message: String },

    /// Host admin API unreachable; retried then abandoned.
    #[error("upstream unavailable: {message}")]
    Upstream { message: String },

    /// Runtime plumbing failure (command channel closed, task gone).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl UrdfError {
    pub fn config(message: impl Into<String>) -> Self {
        UrdfError::Config {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        UrdfError::SchemaViolation {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>, id: impl Into<String>) -> Self {
        UrdfError::NotFound {
            what: what.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        UrdfError::Conflict {
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        UrdfError::Contract {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        UrdfError::Internal {
            message: message.into(),
        }
    }

    /// Classifies an evaluator failure message: "not implemented" style
    /// answers get their own kind so the facade can answer 501.
    pub fn from_evaluator(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("not implemented") || lower.contains("not supported") {
            UrdfError::NotImplemented { message }
        } else {
            UrdfError::Evaluator { message }
        }
    }

    /// Stable error-kind string carried in HTTP error bodies and events.
    pub fn kind(&self) -> &'static str {
        match self {
            UrdfError::Config { .. } => "ConfigError",
            UrdfError::SchemaViolation { .. } => "SchemaViolation",
            UrdfError::NotFound { .. } => "NotFound",
            UrdfError::Conflict { .. } => "Conflict",
            UrdfError::Evaluator { .. } => "EvaluatorError",
            UrdfError::Reasoner { .. } => "ReasonerError",
            UrdfError::Contract { .. } => "ContractViolation",
            UrdfError::NotImplemented { .. } => "NotImplemented",
            UrdfError::Upstream { .. } => "TransientUpstream",
            UrdfError::Internal { .. } => "InternalError",
        }
    }
}

pub type UrdfResult<T> = Result<T, UrdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(UrdfError::config("x").kind(), "ConfigError");
        assert_eq!(UrdfError::schema("x").kind(), "SchemaViolation");
        assert_eq!(UrdfError::not_found("node", "urn:x").kind(), "NotFound");
        assert_eq!(UrdfError::contract("x").kind(), "ContractViolation");
        assert_eq!(
            UrdfError::Upstream {
                message: "x".to_string()
            }
            .kind(),
            "TransientUpstream"
        );
    }

    #[test]
    fn test_from_evaluator_detects_not_implemented() {
        let err = UrdfError::from_evaluator("SERVICE is not implemented");
        assert_eq!(err.kind(), "NotImplemented");

        let err = UrdfError::from_evaluator("syntax error at line 3");
        assert_eq!(err.kind(), "EvaluatorError");
    }

    #[test]
    fn test_display_includes_message() {
        let err = UrdfError::not_found("graph", "urn:g:missing");
        assert_eq!(err.to_string(), "graph not found: urn:g:missing");
    }
}
