//! HTTP Facade
//!
//! Thin axum surface over the runtime handle: the endpoint table under
//! `/urdf` plus the WebSocket event topic. Every response carries `ok` and
//! a millisecond-precision `ts`.

pub mod dto;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::runtime::RuntimeHandle;

/// Creates the axum router.
pub fn create_router(handle: RuntimeHandle, config: &HttpConfig) -> Router {
    let cors = if !config.cors_origins.is_empty() {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| {
                let parsed = s.parse();
                if parsed.is_err() {
                    warn!(origin = %s, "Invalid CORS origin ignored");
                }
                parsed.ok()
            })
            .collect();
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if config.cors_allow_all {
        Some(CorsLayer::permissive())
    } else {
        None
    };

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/size", get(handlers::size))
        .route("/graph", get(handlers::graph))
        .route("/export", get(handlers::export))
        .route("/node", get(handlers::node))
        .route("/clear", post(handlers::clear))
        .route("/load", post(handlers::load))
        .route("/loadFile", post(handlers::load_file))
        .route("/query", post(handlers::query))
        .route("/rules/create", post(handlers::rules_create))
        .route("/rules/update", post(handlers::rules_update))
        .route("/rules/delete", post(handlers::rules_delete))
        .route("/zurl", get(handlers::zurl))
        .route("/events", get(handlers::events));

    let mut app = Router::new()
        .nest("/urdf", api)
        .layer(Extension(handle))
        .layer(RequestBodyLimitLayer::new(16 * 1024 * 1024));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app
}

/// Starts the HTTP server with graceful shutdown on SIGINT/SIGTERM.
pub async fn start_http_server(
    handle: RuntimeHandle,
    config: &HttpConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(handle, config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP facade listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => { info!("Received SIGINT, shutting down..."); }
            _ = sigterm.recv() => { info!("Received SIGTERM, shutting down..."); }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl-c");
        info!("Received SIGINT, shutting down...");
    }
}
