//! Shared helpers for router-level integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use serde_json::Value;
use tower::ServiceExt;

use ticket_mcp::config::Config;
use ticket_mcp::server::{HttpState, McpServer, create_router};

/// Both media types the Streamable POST path requires.
pub const FULL_ACCEPT: &str = "application/json, text/event-stream";

/// Build shared state against a (usually wiremock) backend URL.
pub fn test_state(backend_url: &str) -> Arc<HttpState> {
    let mut config = Config::for_testing(backend_url);
    config.mcp_api_key = Some("mcp-secret".to_string());
    McpServer::new(config).expect("server builds").state()
}

/// Build a router over fresh state.
pub fn test_router(backend_url: &str) -> (Router, Arc<HttpState>) {
    let state = test_state(backend_url);
    (create_router(Arc::clone(&state)), state)
}

/// Send one request through a clone of the router.
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("infallible router")
}

/// POST a JSON-RPC body to /mcp with the full accept header.
pub fn mcp_post(body: &Value, session_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::ACCEPT, FULL_ACCEPT)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(id) = session_id {
        builder = builder.header("mcp-session-id", id);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

/// Read and parse a JSON response body.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Run `initialize` and return the minted session ID.
pub async fn initialize_session(router: &Router) -> String {
    let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    let response = send(router, mcp_post(&body, None)).await;
    response
        .headers()
        .get("mcp-session-id")
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string()
}
