//! Streamable HTTP transport: single `/mcp` endpoint for GET, POST, OPTIONS.
//!
//! POST carries exactly one JSON-RPC message per request. `initialize` mints
//! the session; later requests must present `Mcp-Session-Id`. Notifications
//! and responses are acknowledged with 202. GET upgrades to an SSE stream
//! that opens with the endpoint event and then pings every 30 seconds until
//! the session expires.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use futures::{Stream, StreamExt};
use serde_json::{Value, json};

use super::dispatch::{JsonRpcResponse, MessageKind, classify};
use super::guard::{self, MCP_SESSION_ID};
use super::HttpState;
use super::session::is_valid_session_id;
use super::sse::SseFrame;
use crate::config::defaults;

/// CORS preflight for `/mcp`.
pub async fn handle_mcp_options() -> Response {
    let mut response = StatusCode::OK.into_response();
    for (name, value) in guard::preflight_headers() {
        response.headers_mut().insert(name, value.parse().expect("static header value"));
    }
    response
}

/// `GET /mcp`: establish the server-push SSE stream for an existing session.
pub async fn handle_mcp_get(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    if !guard::validate_origin(&headers, &state.config.allowed_origins) {
        return rpc_error(StatusCode::FORBIDDEN, None, -32000, "Invalid origin");
    }

    let accept = header_str(&headers, header::ACCEPT);
    if !accept.contains("text/event-stream") {
        tracing::warn!(accept = %accept, "GET /mcp without text/event-stream accept");
        return rpc_error(
            StatusCode::METHOD_NOT_ALLOWED,
            None,
            -32000,
            "Method Not Allowed. Accept header must include text/event-stream",
        );
    }

    let session_id = match require_session_header(&headers, None) {
        Ok(id) => id,
        Err(response) => return response,
    };

    if !state.streamable_sessions.validate(&session_id) {
        tracing::warn!(session_id = %session_id, "GET /mcp with unknown session");
        return rpc_error(StatusCode::NOT_FOUND, None, -32000, "Invalid session ID");
    }

    tracing::info!(session_id = %session_id, "Establishing SSE stream");

    let stream = sse_event_stream(Arc::clone(&state), session_id.clone());
    let body = Body::from_stream(stream.map(Ok::<_, Infallible>));

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .expect("valid SSE response");
    insert_session_header(&mut response, &session_id);
    response
}

/// `POST /mcp`: process one JSON-RPC message.
pub async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !guard::validate_origin(&headers, &state.config.allowed_origins) {
        return rpc_error(StatusCode::FORBIDDEN, None, -32000, "Invalid origin");
    }

    // The server is permitted to upgrade the response to SSE, so clients must
    // accept both media types.
    let accept = header_str(&headers, header::ACCEPT);
    if !(accept.contains("application/json") && accept.contains("text/event-stream")) {
        tracing::warn!(accept = %accept, "POST /mcp with invalid accept header");
        return rpc_error(
            StatusCode::BAD_REQUEST,
            Some(Value::Null),
            -32600,
            "Invalid Accept header. Must include both application/json and text/event-stream",
        );
    }

    let message: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "POST /mcp body parse error");
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error_with_data(
                    Some(Value::Null),
                    -32700,
                    "Parse error",
                    json!(e.to_string()),
                )),
            )
                .into_response();
        }
    };

    if message.is_array() {
        tracing::warn!("POST /mcp rejected batch request");
        return rpc_error(
            StatusCode::BAD_REQUEST,
            Some(Value::Null),
            -32600,
            "Batch requests not supported. Body must be single JSON-RPC message.",
        );
    }

    let request_id = message.get("id").cloned();

    match classify(&message) {
        MessageKind::Request if is_initialize(&message) => {
            handle_initialize(&state, &headers, &message).await
        }
        MessageKind::Request => handle_request(&state, &headers, &message, request_id).await,
        MessageKind::Notification | MessageKind::Response => {
            handle_client_message(&state, &headers, &message)
        }
        MessageKind::Invalid => rpc_error(
            StatusCode::BAD_REQUEST,
            request_id.or(Some(Value::Null)),
            -32600,
            "Invalid JSON-RPC message format",
        ),
    }
}

/// `initialize` mints the session, snapshotting the raw Authorization header.
async fn handle_initialize(state: &HttpState, headers: &HeaderMap, message: &Value) -> Response {
    let mut auth_info = HashMap::new();
    if let Some(authorization) =
        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
    {
        auth_info.insert("authorization".to_string(), authorization.to_string());
    }

    let session_id = state.streamable_sessions.create(auth_info);
    tracing::info!(session_id = %session_id, "Created session for initialize");

    let response = state.dispatcher.dispatch(message).await;

    let mut response = Json(response).into_response();
    insert_session_header(&mut response, &session_id);
    response
}

async fn handle_request(
    state: &HttpState,
    headers: &HeaderMap,
    message: &Value,
    request_id: Option<Value>,
) -> Response {
    let session_id = match require_session_header(headers, request_id.clone()) {
        Ok(id) => id,
        Err(response) => return response,
    };

    if !state.streamable_sessions.validate(&session_id) {
        tracing::warn!(session_id = %session_id, "POST /mcp request with unknown session");
        return rpc_error(StatusCode::NOT_FOUND, request_id, -32000, "Invalid session ID");
    }

    let response = state.dispatcher.dispatch(message).await;
    state.streamable_sessions.touch(&session_id);

    let mut response = Json(response).into_response();
    insert_session_header(&mut response, &session_id);
    response
}

/// Notifications and client responses are side effects only: 202, empty body.
fn handle_client_message(state: &HttpState, headers: &HeaderMap, message: &Value) -> Response {
    let session_id = match require_session_header_for_ack(headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    if !state.streamable_sessions.validate(&session_id) {
        tracing::warn!(session_id = %session_id, "Notification/response with unknown session");
        return rpc_error(StatusCode::NOT_FOUND, None, -32000, "Invalid session ID");
    }

    state.dispatcher.handle_client_message(message, &session_id);
    state.streamable_sessions.touch(&session_id);

    let mut response = StatusCode::ACCEPTED.into_response();
    insert_session_header(&mut response, &session_id);
    response
}

/// The SSE generator: endpoint event first, then a ping every 30 seconds
/// while the session stays valid.
fn sse_event_stream(state: Arc<HttpState>, session_id: String) -> impl Stream<Item = String> {
    async_stream::stream! {
        let _guard = StreamGuard { session_id: session_id.clone() };

        let endpoint = SseFrame::new(
            "endpoint",
            json!({
                "jsonrpc": "2.0",
                "method": "notifications/endpoint",
                "params": {"endpoint": defaults::MCP_ENDPOINT}
            }),
        );
        yield endpoint.to_sse_format();

        tracing::info!(session_id = %session_id, "SSE stream started");

        while state.streamable_sessions.validate(&session_id) {
            state.streamable_sessions.touch(&session_id);

            let ping = SseFrame::new(
                "ping",
                json!({
                    "jsonrpc": "2.0",
                    "method": "notifications/ping",
                    "params": {"timestamp": chrono::Utc::now().to_rfc3339()}
                }),
            );
            yield ping.to_sse_format();

            tokio::time::sleep(defaults::KEEPALIVE_INTERVAL).await;
        }

        tracing::info!(session_id = %session_id, "SSE stream ended");
    }
}

/// Logs stream termination even when the client disconnects mid-stream.
struct StreamGuard {
    session_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        tracing::info!(session_id = %self.session_id, "SSE stream closed");
    }
}

fn is_initialize(message: &Value) -> bool {
    message.get("method").and_then(Value::as_str) == Some("initialize")
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string()
}

/// Read and charset-check the `Mcp-Session-Id` header for request paths.
fn require_session_header(headers: &HeaderMap, id: Option<Value>) -> Result<String, Response> {
    let Some(session_id) = headers.get(MCP_SESSION_ID).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Missing Mcp-Session-Id header");
        return Err(rpc_error(
            StatusCode::BAD_REQUEST,
            id,
            -32000,
            "Missing Mcp-Session-Id header",
        ));
    };

    if !is_valid_session_id(session_id) {
        tracing::warn!("Malformed Mcp-Session-Id header");
        return Err(rpc_error(StatusCode::BAD_REQUEST, id, -32000, "Invalid session ID format"));
    }

    Ok(session_id.to_string())
}

fn require_session_header_for_ack(headers: &HeaderMap) -> Result<String, Response> {
    let Some(session_id) = headers.get(MCP_SESSION_ID).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Notification/response missing Mcp-Session-Id header");
        return Err(rpc_error(
            StatusCode::BAD_REQUEST,
            None,
            -32000,
            "Missing Mcp-Session-Id header for notification/response",
        ));
    };

    if !is_valid_session_id(session_id) {
        return Err(rpc_error(StatusCode::BAD_REQUEST, None, -32000, "Invalid session ID format"));
    }

    Ok(session_id.to_string())
}

fn insert_session_header(response: &mut Response, session_id: &str) {
    if let Ok(value) = session_id.parse() {
        response.headers_mut().insert(MCP_SESSION_ID, value);
    }
}

fn rpc_error(status: StatusCode, id: Option<Value>, code: i32, message: &str) -> Response {
    (status, Json(JsonRpcResponse::error(id, code, message))).into_response()
}
