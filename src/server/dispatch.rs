//! Request dispatcher for the streamable HTTP endpoint.
//!
//! Implements the per-exchange state machine: resolve the session named by
//! the `Mcp-Session-Id` header, reuse its handler, or create a fresh handler
//! for an initialize request, and reject everything else. The dispatcher is
//! transport-agnostic: it returns typed outcomes and the HTTP layer renders
//! them into status codes, headers, and streams.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::mcp::McpServer;
use crate::protocol::is_initialize_request;
use crate::session::{McpSession, SessionMessage, SessionStore};
use crate::tools::RegistryError;

/// Builds the fresh protocol engine bound to each new session.
pub type EngineFactory = Arc<dyn Fn() -> Result<McpServer, RegistryError> + Send + Sync>;

/// Outcome of a POST-shaped exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// A protocol response to send. `session_id` echoes the live session
    /// backing the reply; it is absent when the handshake failed and no
    /// session was registered.
    Reply {
        message: Value,
        session_id: Option<String>,
    },
    /// The message was a notification; nothing to send back.
    Accepted,
}

/// Rejections and failures of the dispatch state machine.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The request referenced a session id that is missing or not live.
    #[error("invalid or missing session id")]
    InvalidSession,
    /// A headerless POST did not carry an initialize request.
    #[error("server not initialized")]
    NotInitialized,
    /// The generated session id collided with a live one.
    #[error("session id collision")]
    Collision,
    /// Handler construction failed.
    #[error("failed to construct session handler")]
    Internal,
}

/// Routes inbound exchanges to session transport handlers.
///
/// Holds the injected [`SessionStore`] by `Arc`; clones share it, so one
/// process can run several independent dispatchers.
#[derive(Clone)]
pub struct McpDispatcher {
    store: Arc<SessionStore>,
    engine_factory: EngineFactory,
}

impl fmt::Debug for McpDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpDispatcher")
            .field("store", &self.store)
            .finish()
    }
}

impl McpDispatcher {
    /// Create a dispatcher over an injected store and engine factory.
    pub fn new(store: Arc<SessionStore>, engine_factory: EngineFactory) -> Self {
        Self {
            store,
            engine_factory,
        }
    }

    /// Dispatcher whose sessions expose the built-in tools.
    pub fn with_builtin_tools(store: Arc<SessionStore>) -> Self {
        Self::new(store, Arc::new(McpServer::with_builtin_tools))
    }

    /// Handle a POST-shaped exchange: route to the named live session, or
    /// create a new one when the body is an initialize request.
    pub async fn dispatch_post(
        &self,
        session_id: Option<&str>,
        message: Value,
    ) -> Result<PostOutcome, DispatchError> {
        if let Some(id) = session_id {
            if let Some(session) = self.store.lookup(id) {
                return match session.handle_message(message).await {
                    Some(response) => Ok(PostOutcome::Reply {
                        message: response,
                        session_id: Some(session.id().to_string()),
                    }),
                    None => Ok(PostOutcome::Accepted),
                };
            }
            if !is_initialize_request(&message) {
                warn!("rejected message for unknown session: {id}");
                return Err(DispatchError::InvalidSession);
            }
            // A stale or forged id must not reuse a dead session; an
            // initialize request instead gets a fresh session and id.
            warn!("initialize carried a stale session id: {id}");
        } else if !is_initialize_request(&message) {
            warn!("rejected headerless message that is not an initialize request");
            return Err(DispatchError::NotInitialized);
        }

        self.create_session(message).await
    }

    async fn create_session(&self, message: Value) -> Result<PostOutcome, DispatchError> {
        let engine = (self.engine_factory)().map_err(|err| {
            error!("engine construction failed: {err}");
            DispatchError::Internal
        })?;
        let session = Arc::new(McpSession::new(engine, Arc::downgrade(&self.store)));

        let response = match session.handle_message(message).await {
            Some(response) => response,
            None => {
                error!("initialize request produced no response");
                return Err(DispatchError::Internal);
            }
        };

        if response.get("error").is_some() {
            // Failed handshake: the handler is dropped, never registered.
            debug!("handshake failed, session not registered");
            return Ok(PostOutcome::Reply {
                message: response,
                session_id: None,
            });
        }

        let session_id = session.id().to_string();
        self.store
            .insert(session_id.clone(), Arc::clone(&session))
            .map_err(|err| {
                error!("{err}");
                DispatchError::Collision
            })?;
        debug!("session created: {session_id}");

        Ok(PostOutcome::Reply {
            message: response,
            session_id: Some(session_id),
        })
    }

    /// Handle a GET-shaped exchange: open a notification stream on an
    /// already-established session.
    pub fn open_stream(
        &self,
        session_id: Option<&str>,
    ) -> Result<broadcast::Receiver<SessionMessage>, DispatchError> {
        let session = session_id
            .and_then(|id| self.store.lookup(id))
            .ok_or(DispatchError::InvalidSession)?;
        debug!("notification stream opened: {}", session.id());
        Ok(session.subscribe())
    }

    /// Handle a DELETE-shaped exchange: terminate the session through its
    /// own closure path (close → notice → removal), never by editing the
    /// table directly.
    pub fn terminate(&self, session_id: Option<&str>) -> Result<(), DispatchError> {
        let session = session_id
            .and_then(|id| self.store.lookup(id))
            .ok_or(DispatchError::InvalidSession)?;
        session.close();
        Ok(())
    }
}
