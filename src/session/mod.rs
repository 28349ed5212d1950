//! Session tracking for the streamable HTTP transport.
//!
//! One [`SessionStore`] maps session ids to one [`McpSession`] handler each.
//! Handlers register at handshake completion and deregister through their own
//! closure notice, never through the dispatcher.

pub mod store;
pub mod transport;

pub use store::{SessionClosed, SessionError, SessionStore};
pub use transport::{McpSession, SessionMessage};
