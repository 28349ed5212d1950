//! Axum route handlers for the streamable HTTP transport.
//!
//! # Routes
//!
//! - `GET    /health` — Liveness probe
//! - `GET    /`       — Service description and tool catalog
//! - `POST   /mcp`    — One JSON-RPC message per request
//! - `GET    /mcp`    — SSE stream of server-to-client notifications
//! - `DELETE /mcp`    — Session termination
//!
//! `POST /mcp` carries the session handshake: the response to a successful
//! `initialize` arrives with a fresh `Mcp-Session-Id` header, and every
//! later exchange must quote a live id in the same header.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::protocol::{RpcError, RpcErrorCode};
use crate::server::dispatch::{DispatchError, McpDispatcher, PostOutcome};
use crate::session::SessionMessage;
use crate::tools::ToolInfo;

/// Header carrying the session id on requests and responses.
pub const MCP_SESSION_HEADER: &str = "mcp-session-id";

/// Body of the 400 response for GET/DELETE without a live session.
const INVALID_SESSION_TEXT: &str = "Invalid or missing session ID";

/// Shared application state for the HTTP transport.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Dispatcher behind every `/mcp` exchange.
    pub dispatcher: McpDispatcher,
    /// Tool catalog served by the documentation endpoint.
    pub catalog: Arc<Vec<ToolInfo>>,
}

impl AppState {
    pub fn new(dispatcher: McpDispatcher, catalog: Vec<ToolInfo>) -> Self {
        Self {
            dispatcher,
            catalog: Arc::new(catalog),
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    let session_header = HeaderName::from_static(MCP_SESSION_HEADER);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, session_header.clone()])
        .expose_headers([session_header]);

    Router::new()
        .route("/", get(docs_handler))
        .route("/health", get(health_handler))
        .route(
            "/mcp",
            post(mcp_post_handler)
                .get(mcp_get_handler)
                .delete(mcp_delete_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(MCP_SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
}

fn echo_session_header(response: &mut Response, session_id: &str) {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(MCP_SESSION_HEADER, value);
    }
}

/// POST /mcp — accept one JSON-RPC message and answer it.
///
/// Routing is driven by the `Mcp-Session-Id` header: a live id reuses its
/// session, a missing or stale id is only accepted for `initialize`
/// requests (which mint a fresh session), and everything else is a 400
/// carrying a `-32000` error envelope.
async fn mcp_post_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let message: Value = match serde_json::from_str(&body) {
        Ok(message) => message,
        Err(err) => {
            warn!("unparseable request body: {err}");
            let envelope = RpcError::from_code(RpcErrorCode::ParseError).to_response(None);
            return (StatusCode::BAD_REQUEST, Json(envelope)).into_response();
        }
    };

    match state
        .dispatcher
        .dispatch_post(session_id(&headers), message)
        .await
    {
        Ok(PostOutcome::Accepted) => StatusCode::ACCEPTED.into_response(),
        Ok(PostOutcome::Reply {
            message,
            session_id,
        }) => {
            let mut response = Json(message).into_response();
            if let Some(ref id) = session_id {
                echo_session_header(&mut response, id);
            }
            response
        }
        Err(err) => dispatch_error_response(err),
    }
}

fn dispatch_error_response(err: DispatchError) -> Response {
    let (status, envelope) = match err {
        DispatchError::InvalidSession => (
            StatusCode::BAD_REQUEST,
            RpcError::new(
                RpcErrorCode::BadRequest,
                "Bad Request: No valid session ID provided",
            ),
        ),
        DispatchError::NotInitialized => (
            StatusCode::BAD_REQUEST,
            RpcError::new(RpcErrorCode::BadRequest, "Bad Request: Server not initialized"),
        ),
        DispatchError::Collision | DispatchError::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            RpcError::from_code(RpcErrorCode::InternalError),
        ),
    };
    (status, Json(envelope.to_response(None))).into_response()
}

/// GET /mcp — open the server-to-client notification stream for a live
/// session.
async fn mcp_get_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = session_id(&headers);
    match state.dispatcher.open_stream(id) {
        Ok(receiver) => {
            let mut response = Sse::new(notification_stream(receiver))
                .keep_alive(KeepAlive::default())
                .into_response();
            if let Some(id) = id {
                echo_session_header(&mut response, id);
            }
            response
        }
        Err(_) => (StatusCode::BAD_REQUEST, INVALID_SESSION_TEXT).into_response(),
    }
}

/// Adapt a broadcast subscription into an SSE event stream. The stream ends
/// when the session shuts down or the channel closes; a lagged receiver
/// skips ahead instead of dropping the connection.
fn notification_stream(
    receiver: broadcast::Receiver<SessionMessage>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(SessionMessage::Notification(value)) => match Event::default().json_data(&value)
                {
                    Ok(event) => return Some((Ok(event), receiver)),
                    Err(err) => {
                        warn!("skipping unserializable notification: {err}");
                    }
                },
                Ok(SessionMessage::Shutdown) => return None,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("notification stream lagged, skipped {skipped} messages");
                }
            }
        }
    })
}

/// DELETE /mcp — terminate the session named by the header.
async fn mcp_delete_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.dispatcher.terminate(session_id(&headers)) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, INVALID_SESSION_TEXT).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Auxiliary endpoints
// ---------------------------------------------------------------------------

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "server": env!("CARGO_PKG_NAME"),
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}

/// GET / — service description and tool catalog.
async fn docs_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tools: Vec<Value> = state
        .catalog
        .iter()
        .map(|tool| json!({"name": tool.name, "description": tool.description}))
        .collect();

    Json(json!({
        "name": crate::SERVER_NAME,
        "version": crate::VERSION,
        "description": "A small MCP server providing the current time and random numbers",
        "transport": "HTTP (Streamable)",
        "endpoints": {
            "health": "GET /health - server health check",
            "mcp": "POST /mcp - MCP protocol endpoint",
            "documentation": "GET / - this document",
        },
        "tools": tools,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use crate::tools::builtin_registry;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let store = Arc::new(SessionStore::new());
        let dispatcher = McpDispatcher::with_builtin_tools(store);
        let catalog = builtin_registry().unwrap().list_all();
        app_router(AppState::new(dispatcher, catalog))
    }

    fn post_request(session: Option<&str>, message: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("Content-Type", "application/json");
        if let Some(id) = session {
            builder = builder.header(MCP_SESSION_HEADER, id);
        }
        builder.body(Body::from(message.to_string())).unwrap()
    }

    fn request_without_body(method: &str, uri: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = session {
            builder = builder.header(MCP_SESSION_HEADER, id);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn initialize_message() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "0.0.0"}
            }
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn establish_session(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_request(None, &initialize_message()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(MCP_SESSION_HEADER)
            .expect("initialize response must carry a session id")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_full_session_lifecycle_over_http() {
        let app = test_app();

        // Initialize without a session header mints one.
        let session = establish_session(&app).await;

        // A bounds-swapped draw comes back from the same session.
        let call = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "get_random_number",
                "arguments": {"min": 10, "max": 5}
            }
        });
        let response = app
            .clone()
            .oneshot(post_request(Some(&session), &call))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(MCP_SESSION_HEADER)
                .and_then(|value| value.to_str().ok()),
            Some(session.as_str())
        );
        let reply = body_json(response).await;
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        let drawn: i64 = text.parse().unwrap();
        assert!((5..=10).contains(&drawn), "draw {drawn} outside [5, 10]");

        // Termination succeeds once, then the id is dead.
        let response = app
            .clone()
            .oneshot(request_without_body("DELETE", "/mcp", Some(&session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request_without_body("GET", "/mcp", Some(&session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], INVALID_SESSION_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_headerless_non_initialize_post_is_rejected() {
        let app = test_app();
        let response = app
            .oneshot(post_request(
                None,
                &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let reply = body_json(response).await;
        assert_eq!(reply["error"]["code"], -32000);
        assert_eq!(reply["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_stale_session_id_on_initialize_mints_a_new_one() {
        let app = test_app();
        let response = app
            .oneshot(post_request(Some("stale-id"), &initialize_message()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let echoed = response
            .headers()
            .get(MCP_SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_string();
        assert_ne!(echoed, "stale-id");
    }

    #[tokio::test]
    async fn test_unparseable_body_yields_parse_error() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let reply = body_json(response).await;
        assert_eq!(reply["error"]["code"], -32700);
        assert_eq!(reply["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_notification_post_is_accepted_without_a_body() {
        let app = test_app();
        let session = establish_session(&app).await;

        let response = app
            .oneshot(post_request(
                Some(&session),
                &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_get_stream_opens_as_server_sent_events() {
        let app = test_app();
        let session = establish_session(&app).await;

        let response = app
            .oneshot(request_without_body("GET", "/mcp", Some(&session)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap();
        assert!(content_type.starts_with("text/event-stream"));
        // The body is an open stream; inspecting headers is enough here.
    }

    #[tokio::test]
    async fn test_headerless_get_and_delete_are_rejected() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(request_without_body("GET", "/mcp", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request_without_body("DELETE", "/mcp", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();
        let response = app
            .oneshot(request_without_body("GET", "/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let reply = body_json(response).await;
        assert_eq!(reply["status"], "healthy");
        assert_eq!(reply["server"], env!("CARGO_PKG_NAME"));
        assert_eq!(reply["version"], crate::VERSION);
        assert!(reply["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_docs_endpoint_lists_the_registered_tools() {
        let app = test_app();
        let response = app
            .oneshot(request_without_body("GET", "/", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let reply = body_json(response).await;
        assert_eq!(reply["name"], crate::SERVER_NAME);
        assert_eq!(reply["transport"], "HTTP (Streamable)");

        let tools = reply["tools"].as_array().unwrap();
        let names: Vec<&str> = tools
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["get_current_time", "get_random_number"]);
    }
}
