//! Streamable HTTP transport for the MCP server.
//!
//! Splits the transport into a protocol-agnostic [`dispatch`] layer (session
//! resolution and lifecycle) and the [`routes`] layer that renders dispatch
//! outcomes as HTTP responses.
//!
//! # Endpoints
//!
//! - `GET    /health` — Liveness probe
//! - `GET    /`       — Service description and tool catalog
//! - `POST   /mcp`    — One JSON-RPC message per request
//! - `GET    /mcp`    — SSE notification stream
//! - `DELETE /mcp`    — Session termination

pub mod dispatch;
pub mod routes;

pub use dispatch::{DispatchError, EngineFactory, McpDispatcher, PostOutcome};
pub use routes::{app_router, AppState, MCP_SESSION_HEADER};

use std::sync::Arc;

use anyhow::Context;

use crate::session::SessionStore;
use crate::tools::builtin_registry;

/// Bind the HTTP transport on `0.0.0.0:port` and serve until the process
/// exits.
///
/// Tool registration runs once up front so a registration bug fails startup
/// before the listener binds.
pub async fn run_http(port: u16) -> anyhow::Result<()> {
    let catalog = builtin_registry()
        .context("tool registration failed")?
        .list_all();
    let store = Arc::new(SessionStore::new());
    let dispatcher = McpDispatcher::with_builtin_tools(store);
    let app = app_router(AppState::new(dispatcher, catalog));

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("{} running on http://{}", crate::SERVER_NAME, bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health — health check");
    tracing::info!("  GET    /       — documentation");
    tracing::info!("  POST   /mcp    — MCP protocol endpoint");

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
