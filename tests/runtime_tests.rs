//! Runtime task behavior against a scripted host: debounce coalescing,
//! reload cycles, and the ordering of application replacement before
//! inference.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use urdf::{runtime, Config, Event, OxigraphEvaluator};

#[derive(Clone)]
struct FakeHost {
    flows_hits: Arc<AtomicUsize>,
}

async fn flows(State(host): State<FakeHost>) -> Json<Value> {
    host.flows_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "flows": [
            {"id": "t1", "type": "tab", "label": "Flow 1"},
            {"id": "n1", "type": "inject", "z": "t1", "name": "tick", "wires": [["n2"]]},
            {"id": "n2", "type": "debug", "z": "t1", "wires": [[]]}
        ],
        "rev": "r1"
    }))
}

async fn settings() -> Json<Value> {
    Json(json!({"httpNodeRoot": "/"}))
}

async fn diagnostics() -> Json<Value> {
    Json(json!({"runtime": {"version": "4.0.2"}}))
}

/// Serves /flows, /settings, /diagnostics on an ephemeral port.
async fn spawn_fake_host() -> (SocketAddr, Arc<AtomicUsize>) {
    let flows_hits = Arc::new(AtomicUsize::new(0));
    let host = FakeHost {
        flows_hits: Arc::clone(&flows_hits),
    };
    let app = Router::new()
        .route("/flows", get(flows))
        .route("/settings", get(settings))
        .route("/diagnostics", get(diagnostics))
        .with_state(host);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake host");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, flows_hits)
}

fn test_config(host_addr: SocketAddr, debounce_ms: u64) -> Config {
    let mut config = Config::default();
    config.host.base_url = format!("http://{host_addr}");
    config.host.ready_attempts = 1;
    config.host.ready_interval_secs = 1;
    config.runtime.debounce_ms = debounce_ms;
    // No input files in the test environment; the loaders tolerate that
    config.paths.dictionary_path = "./does-not-exist/zurl.json".into();
    config.paths.ontology_path = "./does-not-exist/ontology.json".into();
    config.paths.rules_path = "./does-not-exist/rules.json".into();
    config
}

/// Collects events of the given kinds until `deadline` elapses.
async fn collect_events(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    kinds: &[&str],
    window: Duration,
) -> Vec<Event> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => {
                if kinds.contains(&event.kind.as_str()) {
                    events.push(event);
                }
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }
    events
}

/// S6: five flow events inside the window produce exactly one reload and
/// one inference cycle; a later event produces a second cycle.
#[tokio::test]
async fn test_debounce_coalesces_flow_events() {
    let (addr, flows_hits) = spawn_fake_host().await;
    let config = test_config(addr, 200);
    let (handle, _task) =
        runtime::start(config, Arc::new(OxigraphEvaluator::new()), None).await;
    let mut rx = handle.events().subscribe();

    for _ in 0..5 {
        handle.flow_event("flows:updated").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let events = collect_events(&mut rx, &["appUpdate", "inference"], Duration::from_millis(800))
        .await;
    let app_updates = events.iter().filter(|e| e.kind == "appUpdate").count();
    let inferences = events.iter().filter(|e| e.kind == "inference").count();
    assert_eq!(app_updates, 1, "five events in the window must coalesce");
    assert_eq!(inferences, 1);
    assert_eq!(flows_hits.load(Ordering::SeqCst), 1);

    // A sixth event after the window opens a second cycle
    handle.flow_event("flows:updated").await;
    let events = collect_events(&mut rx, &["appUpdate"], Duration::from_millis(800)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(flows_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reload_cycle_populates_application_graph() {
    let (addr, _) = spawn_fake_host().await;
    let config = test_config(addr, 50);
    let app_gid = config.graphs.application.clone();
    let (handle, _task) =
        runtime::start(config, Arc::new(OxigraphEvaluator::new()), None).await;
    let mut rx = handle.events().subscribe();

    handle.flow_event("flows:started").await;
    let events =
        collect_events(&mut rx, &["appUpdate"], Duration::from_millis(800)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].response["ok"], json!(true));
    assert_eq!(events[0].response["gid"], json!(app_gid));

    let nodes = handle.graph(app_gid).await.expect("application graph");
    let flow = nodes
        .iter()
        .find(|n| n.get("@id").and_then(Value::as_str) == Some("urn:nrua:ft1"))
        .expect("flow node");
    assert_eq!(
        flow["http://schema.org/keywords"],
        json!([{"@value": "debug,inject"}])
    );
}

#[tokio::test]
async fn test_inference_event_reports_sizes() {
    let (addr, _) = spawn_fake_host().await;
    let config = test_config(addr, 50);
    let (handle, _task) =
        runtime::start(config, Arc::new(OxigraphEvaluator::new()), None).await;
    let mut rx = handle.events().subscribe();

    handle.flow_event("flows:deployed").await;
    let events =
        collect_events(&mut rx, &["inference"], Duration::from_millis(800)).await;
    assert_eq!(events.len(), 1);
    let response = &events[0].response;
    assert_eq!(response["ok"], json!(true));
    assert!(response["graphSizes"].is_object());
    assert_eq!(response["reason"], json!("flows:deployed"));
}

#[tokio::test]
async fn test_environment_graph_loaded_once_host_is_ready() {
    let (addr, _) = spawn_fake_host().await;
    let config = test_config(addr, 50);
    let env_gid = config.graphs.environment.clone();
    let (handle, _task) =
        runtime::start(config, Arc::new(OxigraphEvaluator::new()), None).await;
    let mut rx = handle.events().subscribe();

    let events = collect_events(&mut rx, &["envLoad"], Duration::from_millis(1500)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].response["ok"], json!(true));

    let nodes = handle.graph(env_gid).await.expect("environment graph");
    assert!(!nodes.is_empty());
}

#[tokio::test]
async fn test_flow_event_with_unreachable_host_reports_failure() {
    // Port from a listener that is immediately dropped: nothing listens
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = test_config(addr, 50);
    let (handle, _task) =
        runtime::start(config, Arc::new(OxigraphEvaluator::new()), None).await;
    let mut rx = handle.events().subscribe();

    handle.flow_event("flows:updated").await;
    let events =
        collect_events(&mut rx, &["appUpdate"], Duration::from_millis(800)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].response["ok"], json!(false));
    assert_eq!(events[0].response["error"], json!("TransientUpstream"));
}
