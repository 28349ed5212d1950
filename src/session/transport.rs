//! Per-session transport handler for the streamable HTTP mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::mcp::McpServer;
use crate::session::store::{SessionClosed, SessionStore};

/// Message fanned out to a session's open notification streams.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    /// A server-initiated protocol notification.
    Notification(Value),
    /// The session closed; streams must end.
    Shutdown,
}

/// Handler for one streamable HTTP session.
///
/// Owns the session's protocol engine behind a mutex so concurrent requests
/// for the same session serialize rather than interleave. On close it sends
/// one [`SessionClosed`] notice to the owning store, which removes the table
/// entry synchronously; the handler holds the store weakly, so the store
/// owns the handler and not the other way around.
#[derive(Debug)]
pub struct McpSession {
    id: String,
    engine: Mutex<McpServer>,
    notify_tx: broadcast::Sender<SessionMessage>,
    store: Weak<SessionStore>,
    closed: AtomicBool,
}

impl McpSession {
    /// Buffered notifications per stream before laggards drop messages.
    const NOTIFY_CAPACITY: usize = 32;

    /// Create a handler with a fresh unguessable session id.
    pub fn new(engine: McpServer, store: Weak<SessionStore>) -> Self {
        let (notify_tx, _) = broadcast::channel(Self::NOTIFY_CAPACITY);
        Self {
            id: Uuid::new_v4().to_string(),
            engine: Mutex::new(engine),
            notify_tx,
            store,
            closed: AtomicBool::new(false),
        }
    }

    /// The session id this handler registers under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the engine handshake completed.
    pub async fn is_initialized(&self) -> bool {
        self.engine.lock().await.is_initialized()
    }

    /// Forward one protocol message to this session's engine.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        self.engine.lock().await.handle_message(message).await
    }

    /// Open a receiver for server-initiated notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionMessage> {
        self.notify_tx.subscribe()
    }

    /// Push a notification to every open stream. Dropped silently when no
    /// stream is open.
    pub fn notify(&self, message: Value) {
        let _ = self.notify_tx.send(SessionMessage::Notification(message));
    }

    /// True once `close` has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the transport. Idempotent: the shutdown marker and the closure
    /// notice go out exactly once; in-flight requests still complete but the
    /// session cannot be looked up again.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.notify_tx.send(SessionMessage::Shutdown);
        debug!("transport closed: {}", self.id);
        if let Some(store) = self.store.upgrade() {
            store.notify_closed(SessionClosed {
                session_id: self.id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn detached_session() -> McpSession {
        McpSession::new(McpServer::with_builtin_tools().unwrap(), Weak::new())
    }

    #[tokio::test]
    async fn test_handler_answers_protocol_messages() {
        let session = detached_session();
        let response = session
            .handle_message(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {"protocolVersion": "2025-03-26"}
            }))
            .await
            .unwrap();

        assert!(response.get("result").is_some());
        assert!(session.is_initialized().await);
    }

    #[tokio::test]
    async fn test_notify_reaches_every_subscriber() {
        let session = detached_session();
        let mut first = session.subscribe();
        let mut second = session.subscribe();

        session.notify(json!({"method": "notifications/message"}));

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                SessionMessage::Notification(value) => {
                    assert_eq!(value["method"], "notifications/message");
                }
                SessionMessage::Shutdown => panic!("expected a notification"),
            }
        }
    }

    #[tokio::test]
    async fn test_close_sends_shutdown_exactly_once() {
        let session = detached_session();
        let mut rx = session.subscribe();

        session.close();
        session.close();

        assert!(session.is_closed());
        assert!(matches!(rx.recv().await.unwrap(), SessionMessage::Shutdown));
        // The channel yields nothing further: the second close sent nothing.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_removes_entry_from_owning_store() {
        let store = Arc::new(SessionStore::new());
        let session = Arc::new(McpSession::new(
            McpServer::with_builtin_tools().unwrap(),
            Arc::downgrade(&store),
        ));
        store
            .insert(session.id().to_string(), Arc::clone(&session))
            .unwrap();

        session.close();

        assert!(store.is_empty());
        // Closing again after removal stays a no-op.
        session.close();
        assert!(store.is_empty());
    }
}
