//! Service initialization and run loop

use crate::api::{self, FilesState, TerminalState};
use anyhow::{Context, Result};
use axum::Router;
use hostbridge_core::{SessionRegistry, SWEEP_PERIOD};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Run the file service until the process is stopped.
pub async fn run_files(host: &str, port: u16) -> Result<()> {
    let registry = Arc::new(SessionRegistry::new());
    let _sweeper = registry.start_sweeper(SWEEP_PERIOD);

    let state = FilesState::new(registry);
    let app = api::files_router(state).layer(CorsLayer::permissive());

    serve("file", app, host, port).await
}

/// Run the terminal service until the process is stopped.
pub async fn run_terminal(host: &str, port: u16) -> Result<()> {
    let registry = Arc::new(SessionRegistry::new());
    let _sweeper = registry.start_sweeper(SWEEP_PERIOD);

    let state = TerminalState::new(registry);
    let app = api::terminal_router(state).layer(CorsLayer::permissive());

    serve("terminal", app, host, port).await
}

async fn serve(service: &str, app: Router, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!(service, "HTTP server listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;
    Ok(())
}
