//! HTTP server: binds the Axum app and serves it until Ctrl-C.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::info;

use crate::app::{AppState, build_app};

pub async fn serve(state: AppState) -> Result<()> {
    let port = state.config.port;
    let url = state.config.public_url();
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("HTTP server: bind failed")?;

    info!(service = "http", "Listening on http://{}; GraphQL: {}/graphql", addr, url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum::serve")?;

    info!(service = "http", "HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(service = "http", "Shutdown signal received");
    }
}
