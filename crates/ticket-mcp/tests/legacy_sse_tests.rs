//! Legacy SSE + messages transport tests.
//!
//! Exercises the queue bridge: requests posted to `/messages` come back as
//! `event: message` frames on the `/sse` stream.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use serde_json::{Value, json};

use common::{json_body, send, test_router};

const NO_BACKEND: &str = "http://127.0.0.1:1";
const TOKEN: &str = "legacy-token";

fn sse_request(bearer: Option<&str>, api_key_query: Option<&str>) -> Request<Body> {
    let uri = match api_key_query {
        Some(key) => format!("/sse?api_key={key}"),
        None => "/sse".to_string(),
    };

    let mut builder =
        Request::builder().method("GET").uri(uri).header(header::ACCEPT, "text/event-stream");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Open a Bearer-mode stream and return (frame stream, session id).
async fn open_session_stream(
    router: &Router,
) -> (impl futures::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin, String) {
    let response = send(router, sse_request(Some(TOKEN), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();
    let first = stream.next().await.unwrap().unwrap();
    let frame = String::from_utf8(first.to_vec()).unwrap();

    assert!(frame.contains("event: endpoint"));
    let data_line = frame
        .lines()
        .find_map(|l| l.strip_prefix("data: "))
        .expect("endpoint data line");
    let session_id = data_line
        .strip_prefix("/messages?session_id=")
        .expect("endpoint path shape")
        .to_string();

    (stream, session_id)
}

fn post_message(session_id: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/messages?session_id={session_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_sse_requires_authentication() {
    let (router, _state) = test_router(NO_BACKEND);

    let response = send(&router, sse_request(None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sse_bearer_stream_announces_messages_endpoint() {
    let (router, _state) = test_router(NO_BACKEND);

    let (_stream, session_id) = open_session_stream(&router).await;
    assert!(!session_id.is_empty());
}

#[tokio::test]
async fn test_message_response_arrives_over_stream() {
    let (router, _state) = test_router(NO_BACKEND);
    let (mut stream, session_id) = open_session_stream(&router).await;

    let body = json!({"jsonrpc": "2.0", "id": 11, "method": "tools/list", "params": {}});
    let response = send(&router, post_message(&session_id, TOKEN, &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "accepted"}));

    // The dispatched response is bridged onto the stream as a message frame.
    let next = stream.next().await.unwrap().unwrap();
    let frame = String::from_utf8(next.to_vec()).unwrap();
    assert!(frame.contains("event: message"));

    let data_line = frame.lines().find_map(|l| l.strip_prefix("data: ")).unwrap();
    let message: Value = serde_json::from_str(data_line).unwrap();
    assert_eq!(message["jsonrpc"], json!("2.0"));
    assert_eq!(message["id"], json!(11));
    assert_eq!(message["result"]["tools"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_message_with_wrong_token_is_rejected() {
    let (router, _state) = test_router(NO_BACKEND);
    let (_stream, session_id) = open_session_stream(&router).await;

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
    let response = send(&router, post_message(&session_id, "other-token", &body)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_message_with_unknown_session_is_404() {
    let (router, _state) = test_router(NO_BACKEND);

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
    let response = send(&router, post_message("nope", TOKEN, &body)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_missing_session_param() {
    let (router, _state) = test_router(NO_BACKEND);

    let request = Request::builder()
        .method("POST")
        .uri("/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_message_alias_uses_camel_case_param() {
    let (router, _state) = test_router(NO_BACKEND);
    let (_stream, session_id) = open_session_stream(&router).await;

    let body = json!({"jsonrpc": "2.0", "id": 12, "method": "ping"});
    let request = Request::builder()
        .method("POST")
        .uri(format!("/message?sessionId={session_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "accepted"}));
}

#[tokio::test]
async fn test_notification_gets_no_response_status() {
    let (router, _state) = test_router(NO_BACKEND);
    let (_stream, session_id) = open_session_stream(&router).await;

    let body = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = send(&router, post_message(&session_id, TOKEN, &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "no_response"}));
}

#[tokio::test]
async fn test_message_parse_error_returns_rpc_error_body() {
    let (router, _state) = test_router(NO_BACKEND);
    let (_stream, session_id) = open_session_stream(&router).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/messages?session_id={session_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{broken"))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], json!(-32700));
}

#[tokio::test]
async fn test_api_key_query_falls_back_to_welcome_stream() {
    let (router, state) = test_router(NO_BACKEND);

    let response = send(&router, sse_request(None, Some("legacy-key"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();

    let endpoint = String::from_utf8(stream.next().await.unwrap().unwrap().to_vec()).unwrap();
    assert!(endpoint.contains("event: endpoint"));
    assert!(endpoint.contains("data: /message\n"));

    let welcome = String::from_utf8(stream.next().await.unwrap().unwrap().to_vec()).unwrap();
    assert!(welcome.contains("event: connection"));
    let data_line = welcome.lines().find_map(|l| l.strip_prefix("data: ")).unwrap();
    let data: Value = serde_json::from_str(data_line).unwrap();
    assert_eq!(data["method"], json!("notifications/welcome"));
    assert_eq!(data["params"]["server"], json!("MCP-SSE-Server/1.0"));

    assert_eq!(state.connections.active_count(), 1);

    let ping = String::from_utf8(stream.next().await.unwrap().unwrap().to_vec()).unwrap();
    assert!(ping.contains("event: ping"));
}
