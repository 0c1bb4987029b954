//! Service banner, health, and OAuth stub endpoint tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;

use common::{initialize_session, json_body, send, test_router};

const NO_BACKEND: &str = "http://127.0.0.1:1";

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_root_banner() {
    let (router, _state) = test_router(NO_BACKEND);

    let response = send(&router, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["name"], json!("MCP Ticket Server"));
    assert_eq!(body["version"], json!("1.0.0"));
    assert_eq!(body["transport"], json!(["Streamable HTTP", "SSE"]));
}

#[tokio::test]
async fn test_health_reports_session_counts() {
    let (router, _state) = test_router(NO_BACKEND);

    let before = json_body(send(&router, get("/health")).await).await;
    assert_eq!(before["status"], json!("healthy"));
    assert_eq!(before["transport"]["streamable_sessions"], json!(0));
    assert_eq!(before["auth_provider"], json!("api_key"));
    assert_eq!(before["endpoints"], json!(["/mcp", "/sse", "/messages", "/message"]));

    initialize_session(&router).await;

    let after = json_body(send(&router, get("/health")).await).await;
    assert_eq!(after["transport"]["streamable_sessions"], json!(1));
    assert_eq!(after["transport"]["total_active"], json!(1));
}

#[tokio::test]
async fn test_oauth_discovery_document() {
    let (router, _state) = test_router(NO_BACKEND);

    let request = Request::builder()
        .method("GET")
        .uri("/.well-known/oauth-authorization-server")
        .header(header::HOST, "gateway.example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let body = json_body(send(&router, request).await).await;

    assert_eq!(body["issuer"], json!("https://gateway.example.com"));
    assert_eq!(
        body["authorization_endpoint"],
        json!("https://gateway.example.com/oauth/authorize")
    );
    assert_eq!(body["token_endpoint"], json!("https://gateway.example.com/oauth/token"));
    assert_eq!(body["code_challenge_methods_supported"], json!(["S256"]));
}

#[tokio::test]
async fn test_oauth_protected_resource_document() {
    let (router, _state) = test_router(NO_BACKEND);

    let body = json_body(send(&router, get("/.well-known/oauth-protected-resource")).await).await;
    assert_eq!(body["scopes_supported"], json!(["mcp", "read", "write"]));
    assert_eq!(body["bearer_methods_supported"], json!(["header", "query"]));
}

#[tokio::test]
async fn test_client_registration_stub() {
    let (router, _state) = test_router(NO_BACKEND);

    let request =
        Request::builder().method("POST").uri("/register").body(Body::empty()).unwrap();
    let body = json_body(send(&router, request).await).await;

    assert!(body["client_id"].as_str().unwrap().starts_with("mcp-client-"));
    assert_eq!(body["client_secret"], json!("mcp-secret"));
    assert_eq!(body["response_types"], json!(["code"]));
}

#[tokio::test]
async fn test_authorize_redirects_with_code() {
    let (router, _state) = test_router(NO_BACKEND);

    let uri = "/oauth/authorize?response_type=code&client_id=c1\
               &redirect_uri=http://127.0.0.1:6274/callback&state=xyz";
    let response = send(&router, get(uri)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("http://127.0.0.1:6274/callback?code=auth-"));
    assert!(location.ends_with("&state=xyz"));
}

#[tokio::test]
async fn test_authorize_rejects_wrong_response_type() {
    let (router, _state) = test_router(NO_BACKEND);

    let response =
        send(&router, get("/oauth/authorize?response_type=token&redirect_uri=http://x")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_endpoint_issues_configured_key() {
    let (router, _state) = test_router(NO_BACKEND);

    let request = Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("grant_type=authorization_code&code=auth-1&client_id=c1"))
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["access_token"], json!("mcp-secret"));
    assert_eq!(body["token_type"], json!("Bearer"));
    assert_eq!(body["expires_in"], json!(3600));
}
