//! Runtime task
//!
//! The store is a single shared mutable resource owned by one runtime task
//! that serializes every mutation, load, clear, query, and rule run.
//! Everything else talks to it through a command channel; handlers never
//! escape references to the store.
//!
//! Host flow events enter through a debouncer with a coalescing window:
//! N events inside the window produce exactly one reload cycle. A cycle is
//! application graph replacement, then inference recomputation, then event
//! publication (best-effort).
//!
//! Startup loaders run in a fixed order: dictionary, ontology, rules, then
//! the environment graph once the host admin surface is reachable, then the
//! first application load on the first flow event.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::dictionary::Dictionary;
use crate::error::{UrdfError, UrdfResult};
use crate::events::{EventBus, RequestInfo};
use crate::host::{spawn_flow_watcher, HostClient};
use crate::inference::InferenceEngine;
use crate::jsonld::Node;
use crate::reasoner::Reasoner;
use crate::sparql::{self, QueryOutcome, SparqlEvaluator};
use crate::store::UrdfStore;
use crate::translator::Translator;
use crate::vocab;

type Reply<T> = oneshot::Sender<T>;

/// Answer of the size operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SizeInfo {
    pub total_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

/// Answer of the loadFile operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoadFileInfo {
    pub gid: String,
    pub size: usize,
    pub total_size: usize,
}

enum Command {
    Health {
        reply: Reply<usize>,
    },
    Size {
        gid: Option<String>,
        reply: Reply<UrdfResult<SizeInfo>>,
    },
    Graph {
        gid: String,
        reply: Reply<UrdfResult<Vec<Node>>>,
    },
    Export {
        gid: String,
        reply: Reply<UrdfResult<Value>>,
    },
    FindNode {
        id: String,
        gid: Option<String>,
        reply: Reply<UrdfResult<Node>>,
    },
    Clear {
        gid: Option<String>,
        reply: Reply<UrdfResult<()>>,
    },
    Load {
        doc: Value,
        reply: Reply<UrdfResult<usize>>,
    },
    LoadFile {
        doc: Value,
        reply: Reply<UrdfResult<LoadFileInfo>>,
    },
    Query {
        sparql: String,
        reply: Reply<UrdfResult<QueryOutcome>>,
    },
    RuleCreate {
        rule: Value,
        reply: Reply<UrdfResult<()>>,
    },
    RuleUpdate {
        rule: Value,
        reply: Reply<UrdfResult<()>>,
    },
    RuleDelete {
        id: String,
        reply: Reply<UrdfResult<()>>,
    },
    LoadEnvironment {
        diagnostics: Value,
        settings: Value,
        reply: Reply<UrdfResult<usize>>,
    },
    FlowsChanged {
        reason: String,
    },
}

/// Clonable handle to the runtime task; the only way to reach the store.
#[derive(Clone)]
pub struct RuntimeHandle {
    tx: mpsc::Sender<Command>,
    flow_tx: mpsc::Sender<String>,
    events: EventBus,
    dict: Arc<Dictionary>,
}

impl RuntimeHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> UrdfResult<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| UrdfError::internal("runtime task unavailable"))?;
        rx.await
            .map_err(|_| UrdfError::internal("runtime task dropped the reply"))
    }

    pub async fn health(&self) -> UrdfResult<usize> {
        self.request(|reply| Command::Health { reply }).await
    }

    pub async fn size(&self, gid: Option<String>) -> UrdfResult<SizeInfo> {
        self.request(|reply| Command::Size { gid, reply }).await?
    }

    pub async fn graph(&self, gid: String) -> UrdfResult<Vec<Node>> {
        self.request(|reply| Command::Graph { gid, reply }).await?
    }

    pub async fn export(&self, gid: String) -> UrdfResult<Value> {
        self.request(|reply| Command::Export { gid, reply }).await?
    }

    pub async fn node(&self, id: String, gid: Option<String>) -> UrdfResult<Node> {
        self.request(|reply| Command::FindNode { id, gid, reply })
            .await?
    }

    pub async fn clear(&self, gid: Option<String>) -> UrdfResult<()> {
        self.request(|reply| Command::Clear { gid, reply }).await?
    }

    pub async fn load(&self, doc: Value) -> UrdfResult<usize> {
        self.request(|reply| Command::Load { doc, reply }).await?
    }

    pub async fn load_file(&self, doc: Value) -> UrdfResult<LoadFileInfo> {
        self.request(|reply| Command::LoadFile { doc, reply }).await?
    }

    pub async fn query(&self, sparql: String) -> UrdfResult<QueryOutcome> {
        self.request(|reply| Command::Query { sparql, reply }).await?
    }

    pub async fn rule_create(&self, rule: Value) -> UrdfResult<()> {
        self.request(|reply| Command::RuleCreate { rule, reply })
            .await?
    }

    pub async fn rule_update(&self, rule: Value) -> UrdfResult<()> {
        self.request(|reply| Command::RuleUpdate { rule, reply })
            .await?
    }

    pub async fn rule_delete(&self, id: String) -> UrdfResult<()> {
        self.request(|reply| Command::RuleDelete { id, reply }).await?
    }

    pub async fn load_environment(
        &self,
        diagnostics: Value,
        settings: Value,
    ) -> UrdfResult<usize> {
        self.request(|reply| Command::LoadEnvironment {
            diagnostics,
            settings,
            reply,
        })
        .await?
    }

    /// Feeds one host flow lifecycle event into the debouncer.
    pub async fn flow_event(&self, reason: impl Into<String>) {
        let _ = self.flow_tx.send(reason.into()).await;
    }

    /// The ordered IRI dictionary, as served by the zurl endpoint.
    pub fn zurl(&self) -> &[String] {
        self.dict.iris()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

/// The runtime task state: the store and its collaborators.
struct Runtime {
    store: UrdfStore,
    evaluator: Arc<dyn SparqlEvaluator>,
    reasoner: Option<Arc<dyn Reasoner>>,
    translator: Translator,
    inference: InferenceEngine,
    host: HostClient,
    events: EventBus,
    config: Config,
}

/// Builds the runtime, runs the startup loaders, and spawns the runtime
/// task plus the debouncer (and the flow watcher when polling is enabled).
pub async fn start(
    config: Config,
    evaluator: Arc<dyn SparqlEvaluator>,
    reasoner: Option<Arc<dyn Reasoner>>,
) -> (RuntimeHandle, tokio::task::JoinHandle<()>) {
    let events = EventBus::default();

    // Startup loaders, fixed order: dictionary first.
    let dict = match load_json_file(&config.paths.dictionary_path).await {
        Ok(doc) => match Dictionary::from_value(&doc) {
            Ok(d) => Arc::new(d),
            Err(e) => {
                warn!(error = %e, "dictionary load failed; compression disabled");
                Arc::new(Dictionary::empty())
            }
        },
        Err(e) => {
            warn!(error = %e, "dictionary file unavailable; compression disabled");
            Arc::new(Dictionary::empty())
        }
    };

    let mut store = UrdfStore::new(Arc::clone(&dict));
    let mut startup = Vec::new();
    for (label, path, gid) in [
        ("ontology", &config.paths.ontology_path, &config.graphs.ontology),
        ("rules", &config.paths.rules_path, &config.graphs.rules),
    ] {
        match load_json_file(path).await {
            Ok(doc) => match store.load(&doc, Some(gid.as_str())) {
                Ok(_) => {
                    let size = store.graph_size(gid).unwrap_or(0);
                    info!(graph = label, gid = %gid, size, "startup graph loaded");
                    startup.push(json!({"graph": label, "ok": true, "size": size}));
                }
                Err(e) => {
                    warn!(graph = label, error = %e, "startup graph rejected");
                    startup.push(json!({"graph": label, "ok": false, "error": e.kind()}));
                }
            },
            Err(e) => {
                warn!(graph = label, error = %e, "startup graph unavailable");
                startup.push(json!({"graph": label, "ok": false, "error": e.kind()}));
            }
        }
    }
    events.publish(
        "startupLoad",
        RequestInfo::internal("startup"),
        json!({"ok": true, "graphs": startup}),
    );

    let host = HostClient::new(&config.host);
    let translator = Translator::new(config.host.instance_id.clone());
    let inference = InferenceEngine::new(
        config.graphs.rules.clone(),
        config.graphs.inferred.clone(),
    );

    let (tx, rx) = mpsc::channel(64);
    let (flow_tx, flow_rx) = mpsc::channel(64);
    let handle = RuntimeHandle {
        tx: tx.clone(),
        flow_tx: flow_tx.clone(),
        events: events.clone(),
        dict,
    };

    // Debouncer: coalesces flow events into one reload command per window.
    let window = Duration::from_millis(config.runtime.debounce_ms);
    tokio::spawn(debounce_loop(flow_rx, tx.clone(), window));

    // Environment loader: deferred until the admin surface is reachable.
    let env_handle = handle.clone();
    let env_host = host.clone();
    let env_attempts = config.host.ready_attempts;
    let env_interval = Duration::from_secs(config.host.ready_interval_secs);
    tokio::spawn(async move {
        if let Err(e) = env_host.wait_ready(env_attempts, env_interval).await {
            warn!(error = %e, "environment load abandoned");
            env_handle.events.publish(
                "envLoad",
                RequestInfo::internal("startup"),
                json!({"ok": false, "error": e.kind()}),
            );
            return;
        }
        let (diagnostics, settings) = match (
            env_host.fetch_diagnostics().await,
            env_host.fetch_settings().await,
        ) {
            (Ok(d), Ok(s)) => (d, s),
            (d, s) => {
                let e = d.err().or(s.err()).unwrap_or_else(|| UrdfError::Upstream {
                    message: "environment fetch failed".to_string(),
                });
                warn!(error = %e, "environment load abandoned");
                env_handle.events.publish(
                    "envLoad",
                    RequestInfo::internal("startup"),
                    json!({"ok": false, "error": e.kind()}),
                );
                return;
            }
        };
        let _ = env_handle.load_environment(diagnostics, settings).await;
    });

    // Standalone deployments watch /flows revisions instead of the host's
    // flow lifecycle bus.
    if config.host.poll_interval_secs > 0 {
        spawn_flow_watcher(
            host.clone(),
            Duration::from_secs(config.host.poll_interval_secs),
            flow_tx,
        );
    }

    let runtime = Runtime {
        store,
        evaluator,
        reasoner,
        translator,
        inference,
        host,
        events,
        config,
    };
    let join = tokio::spawn(runtime.run(rx));
    (handle, join)
}

async fn load_json_file(path: &std::path::Path) -> UrdfResult<Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| UrdfError::config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| UrdfError::config(format!("{}: {e}", path.display())))
}

/// Fixed-window coalescing: the window opens on the first event; every
/// event inside it folds into one reload.
async fn debounce_loop(
    mut rx: mpsc::Receiver<String>,
    tx: mpsc::Sender<Command>,
    window: Duration,
) {
    while let Some(first) = rx.recv().await {
        let deadline = Instant::now() + window;
        let mut reason = first;
        let mut closed = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, rx.recv()).await {
                Ok(Some(next)) => reason = next,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        let _ = tx.send(Command::FlowsChanged { reason }).await;
        if closed {
            return;
        }
    }
}

impl Runtime {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Health { reply } => {
                let _ = reply.send(self.store.total_size());
            }
            Command::Size { gid, reply } => {
                let result = match gid {
                    Some(g) => match self.store.graph_size(&g) {
                        Some(size) => Ok(SizeInfo {
                            total_size: self.store.total_size(),
                            gid: Some(g),
                            size: Some(size),
                        }),
                        None => Err(UrdfError::not_found("graph", g)),
                    },
                    None => Ok(SizeInfo {
                        total_size: self.store.total_size(),
                        gid: None,
                        size: None,
                    }),
                };
                let _ = reply.send(result);
            }
            Command::Graph { gid, reply } => {
                let _ = reply.send(self.store.find_graph(Some(gid.as_str())));
            }
            Command::Export { gid, reply } => {
                let _ = reply.send(self.store.export_graph(&gid));
            }
            Command::FindNode { id, gid, reply } => {
                let _ = reply.send(self.store.find(&id, gid.as_deref()));
            }
            Command::Clear { gid, reply } => {
                self.store.clear(gid.as_deref());
                let _ = reply.send(Ok(()));
            }
            Command::Load { doc, reply } => {
                let result = self.store.load(&doc, None).map(|_| self.store.total_size());
                let _ = reply.send(result);
            }
            Command::LoadFile { doc, reply } => {
                let _ = reply.send(self.load_file(&doc));
            }
            Command::Query { sparql, reply } => {
                let result = sparql::execute(&self.store, self.evaluator.as_ref(), &sparql);
                let _ = reply.send(result);
            }
            Command::RuleCreate { rule, reply } => {
                let result = self.rule_create(rule).await;
                let _ = reply.send(result);
            }
            Command::RuleUpdate { rule, reply } => {
                let result = self.rule_update(rule).await;
                let _ = reply.send(result);
            }
            Command::RuleDelete { id, reply } => {
                let result = self.rule_delete(&id).await;
                let _ = reply.send(result);
            }
            Command::LoadEnvironment {
                diagnostics,
                settings,
                reply,
            } => {
                let result = self.load_environment(&diagnostics, &settings);
                match &result {
                    Ok(size) => self.events.publish(
                        "envLoad",
                        RequestInfo::internal("startup"),
                        json!({"ok": true, "gid": self.config.graphs.environment.clone(), "size": size}),
                    ),
                    Err(e) => self.events.publish(
                        "envLoad",
                        RequestInfo::internal("startup"),
                        json!({"ok": false, "error": e.kind()}),
                    ),
                }
                let _ = reply.send(result);
            }
            Command::FlowsChanged { reason } => {
                self.reload_cycle(&reason).await;
            }
        }
    }

    fn load_file(&mut self, doc: &Value) -> UrdfResult<LoadFileInfo> {
        let obj = doc
            .as_object()
            .ok_or_else(|| UrdfError::contract("loadFile document must be an object"))?;
        let gid = obj
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| UrdfError::contract("loadFile document must carry an @id"))?
            .to_string();

        if obj.contains_key("@graph") {
            self.store.load(doc, None)?;
        } else {
            self.store.load(doc, Some(gid.as_str()))?;
        }
        Ok(LoadFileInfo {
            size: self.store.graph_size(&gid).unwrap_or(0),
            total_size: self.store.total_size(),
            gid,
        })
    }

    fn load_environment(&mut self, diagnostics: &Value, settings: &Value) -> UrdfResult<usize> {
        let gid = self.config.graphs.environment.clone();
        let dataset = self.translator.environment_graph(diagnostics, settings)?;
        self.store.load(&dataset, Some(gid.as_str()))?;
        let size = self.store.graph_size(&gid).unwrap_or(0);
        info!(gid = %gid, size, "environment graph loaded");
        Ok(size)
    }

    /// Validates a rule document for the CRUD contract: an object carrying
    /// `@id` and a `schema:text` program.
    fn rule_contract(rule: &Value) -> UrdfResult<String> {
        let obj = rule
            .as_object()
            .ok_or_else(|| UrdfError::contract("rule must be an object"))?;
        let id = obj
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| UrdfError::contract("rule must carry an @id"))?;
        if !obj.contains_key(vocab::SCHEMA_TEXT) {
            return Err(UrdfError::contract("rule must carry a schema:text program"));
        }
        Ok(id.to_string())
    }

    async fn rule_create(&mut self, rule: Value) -> UrdfResult<()> {
        let id = Self::rule_contract(&rule)?;
        let rules_gid = self.config.graphs.rules.clone();
        if self.store.contains(&rules_gid, &id) {
            return Err(UrdfError::conflict(format!("rule already exists: {id}")));
        }
        self.store.load(&rule, Some(rules_gid.as_str()))?;
        self.run_inference("rules:create").await;
        Ok(())
    }

    async fn rule_update(&mut self, rule: Value) -> UrdfResult<()> {
        let id = Self::rule_contract(&rule)?;
        let rules_gid = self.config.graphs.rules.clone();
        if !self.store.contains(&rules_gid, &id) {
            return Err(UrdfError::not_found("rule", id));
        }
        // Replace, not merge: the old node would otherwise win its scalars.
        self.store.remove_node(&rules_gid, &id);
        self.store.load(&rule, Some(rules_gid.as_str()))?;
        self.run_inference("rules:update").await;
        Ok(())
    }

    async fn rule_delete(&mut self, id: &str) -> UrdfResult<()> {
        let rules_gid = self.config.graphs.rules.clone();
        if !self.store.remove_node(&rules_gid, id) {
            return Err(UrdfError::not_found("rule", id));
        }
        self.run_inference("rules:delete").await;
        Ok(())
    }

    /// One reload cycle: application graph replacement happens-before rule
    /// recomputation happens-before event publication.
    async fn reload_cycle(&mut self, reason: &str) {
        let app_gid = self.config.graphs.application.clone();

        let flows = match self.host.fetch_flows().await {
            Ok(flows) => flows,
            Err(e) => {
                warn!(error = %e, reason, "application reload failed at fetch");
                self.events.publish(
                    "appUpdate",
                    RequestInfo::internal(reason),
                    json!({"ok": false, "error": e.kind()}),
                );
                return;
            }
        };

        let dataset = match self.translator.translate(&flows) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(error = %e, reason, "application reload failed at translate");
                self.events.publish(
                    "appUpdate",
                    RequestInfo::internal(reason),
                    json!({"ok": false, "error": e.kind()}),
                );
                return;
            }
        };

        // Clear and fully re-load; restore the prior graph if the load
        // itself reports an error.
        let snapshot = self.store.snapshot_graph(&app_gid);
        self.store.clear(Some(app_gid.as_str()));
        if let Err(e) = self.store.load(&dataset, Some(app_gid.as_str())) {
            if let Some(prior) = snapshot {
                self.store.restore_graph(&app_gid, prior);
            }
            warn!(error = %e, reason, "application reload failed at load");
            self.events.publish(
                "appUpdate",
                RequestInfo::internal(reason),
                json!({"ok": false, "error": e.kind()}),
            );
            return;
        }

        let size = self.store.graph_size(&app_gid).unwrap_or(0);
        info!(gid = %app_gid, size, reason, "application graph replaced");
        self.events.publish(
            "appUpdate",
            RequestInfo::internal(reason),
            json!({"ok": true, "gid": app_gid, "size": size, "reason": reason}),
        );

        self.run_inference(reason).await;
    }

    async fn run_inference(&mut self, reason: &str) {
        let result = self.inference.run(
            &mut self.store,
            self.evaluator.as_ref(),
            self.reasoner.as_deref(),
            reason,
        );
        match result {
            Ok(outcome) => {
                self.events.publish(
                    "inference",
                    RequestInfo::internal(reason),
                    json!({
                        "ok": true,
                        "rules": outcome.rules,
                        "triples": outcome.triples,
                        "reason": outcome.reason,
                        "graphSizes": outcome.graph_sizes,
                    }),
                );
            }
            Err(e) => {
                warn!(error = %e, reason, "inference cycle failed");
                self.events.publish(
                    "inference",
                    RequestInfo::internal(reason),
                    json!({"ok": false, "error": e.kind(), "reason": reason}),
                );
            }
        }
    }
}
