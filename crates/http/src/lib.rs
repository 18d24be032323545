//! HTTP facade serving an embedded search node over the JSON wire protocol,
//! so remote sessions can talk to it like any other search service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use bookindex_kernel::Settings;
use bookindex_search::EmbeddedNode;
use tokio::task::JoinHandle;

pub mod error;
pub mod handlers;
pub mod router;

use router::RouterBuilder;

/// A server running on a background task.
pub struct SpawnedServer {
    local_addr: SocketAddr,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl SpawnedServer {
    /// Address actually bound, useful when the configured port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait until the server stops.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.handle.await.context("HTTP server task panicked")?
    }

    /// Stop serving and release the node handle held by the router.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
        tracing::info!(addr = %self.local_addr, "HTTP server stopped");
    }
}

/// Start the HTTP server for `node` and serve until it fails
pub async fn start_server(node: Arc<EmbeddedNode>, settings: &Settings) -> anyhow::Result<()> {
    spawn_server(node, settings).await?.wait().await
}

/// Bind the configured address and serve `node` on a background task
pub async fn spawn_server(
    node: Arc<EmbeddedNode>,
    settings: &Settings,
) -> anyhow::Result<SpawnedServer> {
    tracing::info!(
        "starting HTTP server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    let app = build_router(node, settings);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))
            .await
            .context("failed to bind to address")?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;

    tracing::info!("HTTP server listening on http://{}", local_addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .context("HTTP server failed")
    });

    Ok(SpawnedServer { local_addr, handle })
}

/// Build the main HTTP router with the node routes and middleware
pub fn build_router(node: Arc<EmbeddedNode>, settings: &Settings) -> Router {
    RouterBuilder::new()
        .route("/healthz", get(health_check))
        .mount_node(node)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.server.request_timeout_ms)
        .build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
