//! # My Little MCP Server
//!
//! A small Model Context Protocol server exposing two tools: the current
//! time in Korea Standard Time and a bounded random number draw.
//!
//! The protocol engine ([`mcp`]) is transport-agnostic; it runs over
//! newline-delimited stdio ([`stdio`]) or over streamable HTTP with session
//! tracking ([`server`] and [`session`]).

pub mod config;
pub mod mcp;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stdio;
pub mod tools;

pub use config::{ServerConfig, TransportMode};
pub use mcp::McpServer;
pub use session::{McpSession, SessionStore};
pub use tools::{builtin_registry, ToolRegistry};

/// Server name reported by the `initialize` handshake.
pub const SERVER_NAME: &str = "My Little MCP Server";

/// Crate version, reported by the handshake and the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
