//! HTTP API Data Transfer Objects
//!
//! Request bodies for the facade endpoints and the shared response
//! envelope: every answer carries `ok` and a millisecond-precision `ts`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

/// `POST /urdf/clear` body
#[derive(Debug, Deserialize, Default)]
pub struct ClearRequest {
    pub gid: Option<String>,
}

/// `POST /urdf/loadFile` body
#[derive(Debug, Deserialize)]
pub struct LoadFileRequest {
    pub doc: Value,
}

/// `POST /urdf/query` body
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sparql: String,
}

/// `POST /urdf/rules/create` and `/urdf/rules/update` body
#[derive(Debug, Deserialize)]
pub struct RuleRequest {
    pub rule: Value,
}

/// `POST /urdf/rules/delete` body
#[derive(Debug, Deserialize)]
pub struct RuleDeleteRequest {
    pub id: String,
}

/// `?gid=` query string
#[derive(Debug, Deserialize, Default)]
pub struct GidQuery {
    pub gid: Option<String>,
}

/// `?id=&gid=` query string
#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    pub id: String,
    pub gid: Option<String>,
}

/// Millisecond-precision timestamp carried by every response and event.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `{ok: true, ts, ...fields}`
pub fn ok_body(fields: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("ok".to_string(), Value::Bool(true));
    body.insert("ts".to_string(), Value::Number(now_ms().into()));
    body.extend(fields);
    Value::Object(body)
}
