//! Host flow-engine admin client.
//!
//! Consumes the host admin surface: `GET /flows` for the application graph,
//! `GET /diagnostics` and `GET /settings` for the environment graph. The
//! readiness wait probes the admin surface before the environment load;
//! exhausting the attempts abandons the load (logged, not fatal).

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::HostConfig;
use crate::error::{UrdfError, UrdfResult};

/// Thin reqwest client bound to the host admin base URL.
#[derive(Debug, Clone)]
pub struct HostClient {
    base_url: String,
    client: reqwest::Client,
}

impl HostClient {
    pub fn new(config: &HostConfig) -> Self {
        HostClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(&self, path: &str) -> UrdfResult<Value> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UrdfError::Upstream {
                message: format!("GET {path}: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(UrdfError::Upstream {
                message: format!("GET {path}: status {}", response.status()),
            });
        }
        response.json().await.map_err(|e| UrdfError::Upstream {
            message: format!("GET {path}: invalid JSON: {e}"),
        })
    }

    /// The flow configuration, either a bare array or the
    /// `{"flows": [...], "rev": ...}` envelope.
    pub async fn fetch_flows(&self) -> UrdfResult<Value> {
        self.get_json("/flows").await
    }

    pub async fn fetch_diagnostics(&self) -> UrdfResult<Value> {
        self.get_json("/diagnostics").await
    }

    pub async fn fetch_settings(&self) -> UrdfResult<Value> {
        self.get_json("/settings").await
    }

    /// Probes the admin surface until it answers, up to `attempts` times at
    /// the given cadence.
    pub async fn wait_ready(&self, attempts: u32, interval: Duration) -> UrdfResult<()> {
        for attempt in 1..=attempts {
            match self.fetch_settings().await {
                Ok(_) => {
                    debug!(attempt, "host admin surface reachable");
                    return Ok(());
                }
                Err(e) => {
                    debug!(attempt, error = %e, "host admin surface not ready");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(UrdfError::Upstream {
            message: format!("host admin surface unreachable after {attempts} attempts"),
        })
    }
}

/// The revision marker of a `/flows` answer, when the envelope carries one.
pub fn flows_revision(doc: &Value) -> Option<String> {
    doc.get("rev").and_then(Value::as_str).map(String::from)
}

/// Watches `/flows` revisions on an interval and feeds the debouncer when
/// the revision changes. Standalone deployments use this in place of the
/// host's flow lifecycle event bus.
pub fn spawn_flow_watcher(
    client: HostClient,
    interval: Duration,
    flow_tx: tokio::sync::mpsc::Sender<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_rev: Option<String> = None;
        let mut started = false;
        loop {
            match client.fetch_flows().await {
                Ok(doc) => {
                    let rev = flows_revision(&doc);
                    if !started {
                        started = true;
                        last_rev = rev;
                        if flow_tx.send("flows:started".to_string()).await.is_err() {
                            return;
                        }
                    } else if rev != last_rev {
                        last_rev = rev;
                        if flow_tx.send("flows:updated".to_string()).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "flow watcher poll failed");
                }
            }
            tokio::time::sleep(interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flows_revision_extraction() {
        assert_eq!(
            flows_revision(&json!({"flows": [], "rev": "abc123"})),
            Some("abc123".to_string())
        );
        assert_eq!(flows_revision(&json!([])), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = HostConfig {
            base_url: "http://127.0.0.1:1880/".to_string(),
            ..HostConfig::default()
        };
        let client = HostClient::new(&config);
        assert_eq!(client.base_url, "http://127.0.0.1:1880");
    }
}
