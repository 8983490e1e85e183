//! # uRDF Server
//!
//! Runs the semantic runtime against a host flow engine: startup loaders,
//! the runtime task, the flow watcher, and the HTTP facade.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (urdf.toml + URDF_* environment overrides)
//! cargo run --bin urdf-server
//!
//! # Custom config file and port
//! cargo run --bin urdf-server -- --config ./urdf.toml --port 9000
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use urdf::http::start_http_server;
use urdf::{runtime, Config, OxigraphEvaluator};

#[derive(Parser, Debug)]
#[command(name = "urdf-server", about = "RDF store and inference runtime for flow engines")]
struct Args {
    /// Path to a configuration file (defaults to urdf.toml)
    #[arg(long)]
    config: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Override the host admin base URL
    #[arg(long)]
    host_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(host_url) = args.host_url {
        config.host.base_url = host_url;
    }

    init_tracing(&config);
    info!(
        host = %config.host.base_url,
        instance = %config.host.instance_id,
        "starting uRDF runtime"
    );

    let (handle, _runtime_task) = runtime::start(
        config.clone(),
        Arc::new(OxigraphEvaluator::new()),
        None, // no reasoner capability bundled; SPARQL-only mode
    )
    .await;

    start_http_server(handle, &config.http)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
