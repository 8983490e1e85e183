//! Event channel
//!
//! Single `urdf/events` topic backed by a broadcast channel and exposed
//! over WebSocket. Publication is best-effort: a missing or lagging
//! subscriber never affects the store or the orchestrator.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

pub const EVENT_TOPIC: &str = "urdf/events";

/// One event on the topic.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Millisecond-precision timestamp.
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub request: RequestInfo,
    pub response: Value,
}

/// The request that produced the event.
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        RequestInfo {
            method: method.into(),
            path: path.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Internal triggers (startup loaders, flow events) are not HTTP
    /// requests; they publish with an `internal` method.
    pub fn internal(reason: impl Into<String>) -> Self {
        RequestInfo {
            method: "internal".to_string(),
            path: EVENT_TOPIC.to_string(),
            summary: Some(reason.into()),
        }
    }
}

/// Best-effort broadcast bus for the event topic.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    /// Publishes one event; send failures are swallowed.
    pub fn publish(&self, kind: &str, request: RequestInfo, response: Value) {
        let event = Event {
            ts: Utc::now().timestamp_millis(),
            kind: kind.to_string(),
            request,
            response,
        };
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(256)
    }
}
