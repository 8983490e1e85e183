//! HTTP API error mapping.
//!
//! Maps the runtime error taxonomy onto status codes. Error bodies carry
//! the same `ok`/`ts` envelope as successes plus the stable error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::UrdfError;

use super::dto::now_ms;

/// Wrapper making the runtime error returnable from handlers.
#[derive(Debug)]
pub struct ApiError(pub UrdfError);

impl From<UrdfError> for ApiError {
    fn from(err: UrdfError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &UrdfError) -> StatusCode {
    match err {
        UrdfError::SchemaViolation { .. } | UrdfError::Contract { .. } => StatusCode::BAD_REQUEST,
        UrdfError::NotFound { .. } => StatusCode::NOT_FOUND,
        UrdfError::Conflict { .. } => StatusCode::CONFLICT,
        UrdfError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
        UrdfError::Upstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
        UrdfError::Config { .. }
        | UrdfError::Evaluator { .. }
        | UrdfError::Reasoner { .. }
        | UrdfError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(json!({
            "ok": false,
            "ts": now_ms(),
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
