//! Legacy SSE + messages transport.
//!
//! Older clients read every response from the SSE channel, never from the
//! POST that carried the request. The per-session queue bridges the two:
//! `POST /messages` dispatches and enqueues, the `GET /sse` generator drains.
//!
//! `GET /sse` serves two client generations: a Bearer token selects the
//! MCP-standard session stream; an `api_key` query parameter falls back to
//! the pre-MCP welcome/ping loop over the connection registry.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};

use super::HttpState;
use super::dispatch::{JsonRpcResponse, MessageKind, classify};
use super::sse::{SseFrame, comment};
use crate::auth::Credentials;
use crate::config::defaults;

/// Query parameters for `GET /sse`.
#[derive(Debug, Deserialize)]
pub struct SseQuery {
    pub api_key: Option<String>,
}

/// Query parameters for `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub session_id: Option<String>,
    pub api_key: Option<String>,
}

/// Query parameters for the `POST /message` alias (camelCase, with fallback).
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id_camel: Option<String>,
    pub session_id: Option<String>,
    pub api_key: Option<String>,
}

/// `GET /sse`: unified legacy stream endpoint.
pub async fn handle_sse(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<SseQuery>,
    headers: HeaderMap,
) -> Response {
    let credentials = Credentials::extract(&headers, query.api_key.as_deref());
    let Some(token) = credentials.token().map(str::to_string) else {
        return detail_error(StatusCode::UNAUTHORIZED, "Missing authentication");
    };

    if !state.auth.validate(&credentials) {
        return detail_error(StatusCode::UNAUTHORIZED, "Invalid authentication");
    }

    let auth_result = state.auth.authenticate(&credentials).await;
    if !auth_result.success {
        return detail_error(StatusCode::UNAUTHORIZED, "Authentication failed");
    }

    let is_mcp_standard = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));

    if is_mcp_standard {
        let session_id = state
            .legacy_sessions
            .create(HashMap::from([("token".to_string(), token)]));

        tracing::info!(session_id = %session_id, "Starting legacy MCP session stream");
        let stream = session_stream(Arc::clone(&state), session_id);
        sse_response(stream)
    } else {
        let client_ip = client_ip(&headers);
        let connection_id = state.connections.connect(client_ip, auth_result.user_info);

        tracing::info!(connection_id = %connection_id, "Starting pre-MCP welcome stream");
        let stream = welcome_stream(Arc::clone(&state), connection_id);
        sse_response(stream)
    }
}

/// `POST /messages?session_id=<id>`: dispatch and bridge onto the queue.
pub async fn handle_messages(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Missing session_id parameter"})))
            .into_response();
    };
    process_message(&state, &session_id, &headers, query.api_key.as_deref(), &body).await
}

/// `POST /message?sessionId=<id>`: inspector-compatible alias.
pub async fn handle_message(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let Some(session_id) = query.session_id_camel.or(query.session_id) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Missing sessionId parameter"})))
            .into_response();
    };
    process_message(&state, &session_id, &headers, query.api_key.as_deref(), &body).await
}

async fn process_message(
    state: &HttpState,
    session_id: &str,
    headers: &HeaderMap,
    query_api_key: Option<&str>,
    body: &[u8],
) -> Response {
    if !state.legacy_sessions.validate(session_id) {
        return detail_error(StatusCode::NOT_FOUND, "Session not found");
    }

    // The token must match the one the stream was opened with.
    let credentials = Credentials::extract(headers, query_api_key);
    let session_token = state.legacy_sessions.auth_info_value(session_id, "token");
    if credentials.token().map(str::to_string) != session_token {
        tracing::warn!(session_id = %session_id, "Token mismatch on message post");
        return detail_error(StatusCode::UNAUTHORIZED, "Invalid session authentication");
    }

    let message: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            return Json(JsonRpcResponse::error_with_data(
                Some(Value::Null),
                -32700,
                "Parse error",
                json!(e.to_string()),
            ))
            .into_response();
        }
    };

    tracing::info!(session_id = %session_id, "Received legacy message");
    state.legacy_sessions.touch(session_id);

    match classify(&message) {
        MessageKind::Request => {
            let response = state.dispatcher.dispatch(&message).await;
            let response_value = serde_json::to_value(&response).unwrap_or(Value::Null);

            if state.legacy_sessions.enqueue(session_id, response_value) {
                Json(json!({"status": "accepted"})).into_response()
            } else {
                Json(json!({"status": "error", "message": "Failed to send to SSE stream"}))
                    .into_response()
            }
        }
        MessageKind::Notification | MessageKind::Response => {
            state.dispatcher.handle_client_message(&message, session_id);
            Json(json!({"status": "no_response"})).into_response()
        }
        MessageKind::Invalid => Json(JsonRpcResponse::error(
            message.get("id").cloned().or(Some(Value::Null)),
            -32600,
            "Invalid JSON-RPC message format",
        ))
        .into_response(),
    }
}

/// MCP-standard stream: endpoint path first, then queue drain with
/// keep-alive comments on 30-second idle gaps.
fn session_stream(state: Arc<HttpState>, session_id: String) -> impl Stream<Item = String> {
    async_stream::stream! {
        let endpoint = SseFrame::new(
            "endpoint",
            Value::String(format!(
                "/messages?session_id={}",
                super::guard::url_encode(&session_id)
            )),
        );
        yield endpoint.to_sse_format();

        tracing::info!(session_id = %session_id, "Legacy SSE message loop started");

        loop {
            if !state.legacy_sessions.validate(&session_id) {
                tracing::info!(session_id = %session_id, "Session no longer active, ending stream");
                break;
            }

            match state.legacy_sessions.wait_next(&session_id, defaults::QUEUE_WAIT_TIMEOUT).await {
                Some(message) => {
                    yield SseFrame::new("message", message).to_sse_format();
                }
                None => {
                    yield comment("keep-alive");
                }
            }

            state.legacy_sessions.touch(&session_id);
        }
    }
}

/// Pre-MCP stream: endpoint, welcome, then pings until the connection expires.
fn welcome_stream(state: Arc<HttpState>, connection_id: String) -> impl Stream<Item = String> {
    async_stream::stream! {
        let _guard = ConnectionGuard { state: Arc::clone(&state), connection_id: connection_id.clone() };

        yield SseFrame::new("endpoint", Value::String("/message".to_string())).to_sse_format();

        let welcome = SseFrame::new(
            "connection",
            json!({
                "type": "welcome",
                "connection_id": connection_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "server": "MCP-SSE-Server/1.0"
            }),
        );
        yield welcome.to_sse_format();

        loop {
            if !state.connections.ping(&connection_id) {
                tracing::info!(connection_id = %connection_id, "Connection expired, ending stream");
                break;
            }

            let ping = SseFrame::new(
                "ping",
                json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "connection_id": connection_id
                }),
            );
            yield ping.to_sse_format();

            tokio::time::sleep(defaults::KEEPALIVE_INTERVAL).await;
        }
    }
}

/// Deregisters the connection when the stream is dropped.
struct ConnectionGuard {
    state: Arc<HttpState>,
    connection_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.connections.disconnect(&self.connection_id);
    }
}

fn sse_response(stream: impl Stream<Item = String> + Send + 'static) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(stream.map(Ok::<_, Infallible>)))
        .expect("valid SSE response")
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn detail_error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}
