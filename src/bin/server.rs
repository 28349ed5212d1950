//! My Little MCP Server binary.
//!
//! Serves the MCP protocol over stdio (default) or streamable HTTP.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP listen port, overrides `--port=` (default: 8081)
//! - `RUST_LOG` — Tracing filter (default: "info,my_little_mcp_server=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server                        # stdio transport
//! cargo run --bin server -- --transport=http    # HTTP on port 8081
//! cargo run --bin server -- --transport=http --port=9000
//! ```

use my_little_mcp_server::{server, stdio, ServerConfig, TransportMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr: in stdio mode stdout belongs to the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,my_little_mcp_server=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::from_env();
    match config.transport {
        TransportMode::Http => server::run_http(config.port).await,
        TransportMode::Stdio => stdio::run().await,
    }
}
