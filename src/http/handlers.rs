//! HTTP facade handlers.
//!
//! Every handler talks to the store through the runtime handle, answers
//! with the `ok`/`ts` envelope, and publishes a best-effort event on the
//! `urdf/events` topic.

use axum::{
    extract::{ws::Message, Query, WebSocketUpgrade},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::events::RequestInfo;
use crate::runtime::RuntimeHandle;
use crate::sparql::QueryOutcome;

use super::dto::{
    ok_body, ClearRequest, GidQuery, LoadFileRequest, NodeQuery, QueryRequest,
    RuleDeleteRequest, RuleRequest,
};
use super::error::ApiError;

fn fields(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn publish(handle: &RuntimeHandle, kind: &str, method: &str, path: &str, response: &Value) {
    handle
        .events()
        .publish(kind, RequestInfo::new(method, path), response.clone());
}

fn publish_error(handle: &RuntimeHandle, kind: &str, method: &str, path: &str, err: &ApiError) {
    handle.events().publish(
        kind,
        RequestInfo::new(method, path),
        json!({"ok": false, "error": err.0.kind()}),
    );
}

/// `GET /urdf/health`
pub async fn health(
    Extension(handle): Extension<RuntimeHandle>,
) -> Result<Json<Value>, ApiError> {
    let size = handle.health().await?;
    let body = ok_body(fields(vec![("size", json!(size))]));
    publish(&handle, "health", "GET", "/urdf/health", &body);
    Ok(Json(body))
}

/// `GET /urdf/size?gid=<iri>`
pub async fn size(
    Extension(handle): Extension<RuntimeHandle>,
    Query(query): Query<GidQuery>,
) -> Result<Json<Value>, ApiError> {
    match handle.size(query.gid).await {
        Ok(info) => {
            let mut entries = vec![("totalSize", json!(info.total_size))];
            if let Some(gid) = &info.gid {
                entries.push(("gid", json!(gid)));
            }
            if let Some(size) = info.size {
                entries.push(("size", json!(size)));
            }
            let body = ok_body(fields(entries));
            publish(&handle, "size", "GET", "/urdf/size", &body);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "size", "GET", "/urdf/size", &err);
            Err(err)
        }
    }
}

/// `GET /urdf/graph?gid=<iri>`
pub async fn graph(
    Extension(handle): Extension<RuntimeHandle>,
    Query(query): Query<GidQuery>,
) -> Result<Json<Value>, ApiError> {
    let gid = query
        .gid
        .ok_or_else(|| ApiError(crate::error::UrdfError::contract("gid query is required")))?;
    match handle.graph(gid.clone()).await {
        Ok(nodes) => {
            let body = ok_body(fields(vec![
                ("gid", json!(gid)),
                (
                    "graph",
                    Value::Array(nodes.into_iter().map(Value::Object).collect()),
                ),
            ]));
            publish(
                &handle,
                "graph",
                "GET",
                "/urdf/graph",
                &json!({"ok": true, "gid": gid}),
            );
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "graph", "GET", "/urdf/graph", &err);
            Err(err)
        }
    }
}

/// `GET /urdf/export?gid=<iri>` - JSON-LD attachment
pub async fn export(
    Extension(handle): Extension<RuntimeHandle>,
    Query(query): Query<GidQuery>,
) -> Result<Response, ApiError> {
    let gid = query
        .gid
        .ok_or_else(|| ApiError(crate::error::UrdfError::contract("gid query is required")))?;
    let dataset = handle.export(gid.clone()).await?;
    let filename = format!(
        "attachment; filename=\"{}.json\"",
        gid.replace([':', '/'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/ld+json".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        Json(dataset),
    )
        .into_response())
}

/// `GET /urdf/node?id=<iri>&gid=<iri>`
pub async fn node(
    Extension(handle): Extension<RuntimeHandle>,
    Query(query): Query<NodeQuery>,
) -> Result<Json<Value>, ApiError> {
    match handle.node(query.id.clone(), query.gid.clone()).await {
        Ok(found) => {
            let mut entries = vec![("id", json!(query.id))];
            if let Some(gid) = &query.gid {
                entries.push(("gid", json!(gid)));
            }
            entries.push(("node", Value::Object(found)));
            let body = ok_body(fields(entries));
            publish(
                &handle,
                "node",
                "GET",
                "/urdf/node",
                &json!({"ok": true, "id": query.id}),
            );
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "node", "GET", "/urdf/node", &err);
            Err(err)
        }
    }
}

/// `POST /urdf/clear`
pub async fn clear(
    Extension(handle): Extension<RuntimeHandle>,
    body: Option<Json<ClearRequest>>,
) -> Result<Json<Value>, ApiError> {
    let gid = body.and_then(|Json(req)| req.gid);
    handle.clear(gid.clone()).await?;
    let mut entries = Vec::new();
    if let Some(gid) = &gid {
        entries.push(("gid", json!(gid)));
    }
    let body = ok_body(fields(entries));
    publish(&handle, "clear", "POST", "/urdf/clear", &body);
    Ok(Json(body))
}

/// `POST /urdf/load` - JSON-LD object or array
pub async fn load(
    Extension(handle): Extension<RuntimeHandle>,
    Json(doc): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    match handle.load(doc).await {
        Ok(size) => {
            let body = ok_body(fields(vec![("size", json!(size))]));
            publish(&handle, "load", "POST", "/urdf/load", &body);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "load", "POST", "/urdf/load", &err);
            Err(err)
        }
    }
}

/// `POST /urdf/loadFile` - `{doc}`, the doc must carry `@id`
pub async fn load_file(
    Extension(handle): Extension<RuntimeHandle>,
    Json(req): Json<LoadFileRequest>,
) -> Result<Json<Value>, ApiError> {
    match handle.load_file(req.doc).await {
        Ok(info) => {
            let body = ok_body(fields(vec![
                ("gid", json!(info.gid)),
                ("size", json!(info.size)),
                ("totalSize", json!(info.total_size)),
            ]));
            publish(&handle, "loadFile", "POST", "/urdf/loadFile", &body);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "loadFile", "POST", "/urdf/loadFile", &err);
            Err(err)
        }
    }
}

/// `POST /urdf/query` - `{sparql}`
pub async fn query(
    Extension(handle): Extension<RuntimeHandle>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    match handle.query(req.sparql).await {
        Ok(QueryOutcome::Boolean(result)) => {
            let body = ok_body(fields(vec![
                ("type", json!("ASK")),
                ("result", json!(result)),
            ]));
            publish(
                &handle,
                "query",
                "POST",
                "/urdf/query",
                &json!({"ok": true, "type": "ASK"}),
            );
            Ok(Json(body))
        }
        Ok(QueryOutcome::Bindings(rows)) => {
            let count = rows.len();
            let body = ok_body(fields(vec![
                ("type", json!("SELECT")),
                (
                    "results",
                    Value::Array(rows.into_iter().map(Value::Object).collect()),
                ),
            ]));
            publish(
                &handle,
                "query",
                "POST",
                "/urdf/query",
                &json!({"ok": true, "type": "SELECT", "results": count}),
            );
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "query", "POST", "/urdf/query", &err);
            Err(err)
        }
    }
}

/// `POST /urdf/rules/create`
pub async fn rules_create(
    Extension(handle): Extension<RuntimeHandle>,
    Json(req): Json<RuleRequest>,
) -> Result<Json<Value>, ApiError> {
    match handle.rule_create(req.rule).await {
        Ok(()) => {
            let body = ok_body(Map::new());
            publish(&handle, "rules", "POST", "/urdf/rules/create", &body);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "rules", "POST", "/urdf/rules/create", &err);
            Err(err)
        }
    }
}

/// `POST /urdf/rules/update`
pub async fn rules_update(
    Extension(handle): Extension<RuntimeHandle>,
    Json(req): Json<RuleRequest>,
) -> Result<Json<Value>, ApiError> {
    match handle.rule_update(req.rule).await {
        Ok(()) => {
            let body = ok_body(Map::new());
            publish(&handle, "rules", "POST", "/urdf/rules/update", &body);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "rules", "POST", "/urdf/rules/update", &err);
            Err(err)
        }
    }
}

/// `POST /urdf/rules/delete`
pub async fn rules_delete(
    Extension(handle): Extension<RuntimeHandle>,
    Json(req): Json<RuleDeleteRequest>,
) -> Result<Json<Value>, ApiError> {
    match handle.rule_delete(req.id).await {
        Ok(()) => {
            let body = ok_body(Map::new());
            publish(&handle, "rules", "POST", "/urdf/rules/delete", &body);
            Ok(Json(body))
        }
        Err(e) => {
            let err = ApiError(e);
            publish_error(&handle, "rules", "POST", "/urdf/rules/delete", &err);
            Err(err)
        }
    }
}

/// `GET /urdf/zurl` - the ordered IRI dictionary
pub async fn zurl(Extension(handle): Extension<RuntimeHandle>) -> Json<Value> {
    Json(json!(handle.zurl()))
}

/// `GET /urdf/events` - WebSocket stream of the event topic
pub async fn events(
    Extension(handle): Extension<RuntimeHandle>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (mut sink, mut stream) = socket.split();
        let mut rx = handle.events().subscribe();
        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Ok(event) => {
                            let Ok(text) = serde_json::to_string(&event) else {
                                continue;
                            };
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "event subscriber lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                message = stream.next() => {
                    // Clients only listen; any close or error ends the session.
                    match message {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        _ => {}
                    }
                }
            }
        }
    })
}
