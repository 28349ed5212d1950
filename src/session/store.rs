//! The session transport table.
//!
//! Maps session ids to live transport handlers. The store is explicitly
//! owned and injectable: the HTTP layer builds one per server instance and
//! hands it to the dispatcher as an `Arc`, tests construct their own. All
//! operations take the inner lock briefly and never hold it across an await.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, error};

use crate::session::transport::McpSession;

/// Closure notice sent by a transport handler to its owning store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosed {
    /// Id of the session whose transport closed.
    pub session_id: String,
}

/// Invariant violations of the table itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// An insert hit an id that already has a live transport.
    #[error("session '{0}' already has a live transport")]
    Collision(String),
}

/// Table of live sessions, keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<String, Arc<McpSession>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live session. No side effects.
    pub fn lookup(&self, session_id: &str) -> Option<Arc<McpSession>> {
        self.entries.read().get(session_id).cloned()
    }

    /// Insert a newly initialized session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Collision`] when the id is already present.
    /// With UUID generation this should never happen, but it is checked: a
    /// collision would silently detach the existing transport.
    pub fn insert(
        &self,
        session_id: impl Into<String>,
        session: Arc<McpSession>,
    ) -> Result<(), SessionError> {
        let session_id = session_id.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&session_id) {
            error!("session id collision: {session_id}");
            return Err(SessionError::Collision(session_id));
        }
        debug!("session registered: {session_id}");
        entries.insert(session_id, session);
        Ok(())
    }

    /// Remove a session. Idempotent; removing an absent id is a no-op.
    /// Returns whether an entry was present.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.entries.write().remove(session_id).is_some();
        if removed {
            debug!("session removed: {session_id}");
        }
        removed
    }

    /// Consume a transport closure notice by removing its table entry.
    pub fn notify_closed(&self, notice: SessionClosed) {
        self.remove(&notice.session_id);
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no session is live.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::McpServer;
    use std::sync::Weak;

    fn session() -> Arc<McpSession> {
        Arc::new(McpSession::new(
            McpServer::with_builtin_tools().unwrap(),
            Weak::new(),
        ))
    }

    #[test]
    fn test_insert_lookup_remove_roundtrip() {
        let store = SessionStore::new();
        let session = session();
        let id = session.id().to_string();

        store.insert(id.clone(), Arc::clone(&session)).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.lookup(&id).is_some());

        assert!(store.remove(&id));
        assert!(store.lookup(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = SessionStore::new();
        assert!(!store.remove("never-inserted"));

        let session = session();
        let id = session.id().to_string();
        store.insert(id.clone(), session).unwrap();
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
    }

    #[test]
    fn test_duplicate_insert_is_a_collision() {
        let store = SessionStore::new();
        let session = session();
        let id = session.id().to_string();

        store.insert(id.clone(), Arc::clone(&session)).unwrap();
        let err = store.insert(id.clone(), session).unwrap_err();
        assert_eq!(err, SessionError::Collision(id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_notify_closed_removes_entry() {
        let store = SessionStore::new();
        let session = session();
        let id = session.id().to_string();
        store.insert(id.clone(), session).unwrap();

        store.notify_closed(SessionClosed {
            session_id: id.clone(),
        });
        assert!(store.lookup(&id).is_none());

        // A second notice for the same id is a no-op.
        store.notify_closed(SessionClosed { session_id: id });
        assert!(store.is_empty());
    }
}
