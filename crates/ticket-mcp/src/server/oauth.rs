//! OAuth surface: static discovery documents and a development token shim.
//!
//! These endpoints exist so inspector clients that insist on an OAuth
//! handshake can connect. The token endpoint hands out the configured MCP API
//! key as the access token. This is not an authorization server; the auth
//! factory still rejects `oauth` as a provider.

use std::sync::Arc;

use axum::Form;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use super::HttpState;

/// `GET /.well-known/oauth-authorization-server` (RFC 8414 shape).
pub async fn handle_authorization_server_metadata(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Response {
    let base_url = base_url(&state, &headers);

    Json(json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{base_url}/oauth/authorize"),
        "token_endpoint": format!("{base_url}/oauth/token"),
        "registration_endpoint": format!("{base_url}/register"),
        "scopes_supported": ["mcp", "read", "write"],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "client_credentials"],
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256"],
        "revocation_endpoint": format!("{base_url}/oauth/revoke"),
        "introspection_endpoint": format!("{base_url}/oauth/introspect")
    }))
    .into_response()
}

/// `GET /.well-known/oauth-protected-resource` (RFC 9728 shape).
pub async fn handle_protected_resource_metadata(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Response {
    let base_url = base_url(&state, &headers);

    Json(json!({
        "resource_server": base_url,
        "authorization_servers": [base_url],
        "scopes_supported": ["mcp", "read", "write"],
        "bearer_methods_supported": ["header", "query"],
        "resource_documentation": format!("{base_url}/docs"),
        "introspection_endpoint": format!("{base_url}/oauth/introspect"),
        "revocation_endpoint": format!("{base_url}/oauth/revoke")
    }))
    .into_response()
}

/// `POST /register` (RFC 7591 shape): every registration succeeds.
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Response {
    let base_url = base_url(&state, &headers);
    let client_id = format!("mcp-client-{}", &uuid::Uuid::new_v4().to_string()[..8]);

    tracing::info!(client_id = %client_id, "Registered OAuth client");

    Json(json!({
        "client_id": client_id,
        "client_secret": state.config.mcp_api_key.clone().unwrap_or_else(|| "fallback-secret".to_string()),
        "registration_access_token": format!("access-{}", uuid::Uuid::new_v4()),
        "registration_client_uri": format!("{base_url}/clients/{client_id}"),
        "client_id_issued_at": chrono::Utc::now().timestamp(),
        "grant_types": ["authorization_code", "client_credentials"],
        "response_types": ["code"],
        "scope": "mcp read write",
        "token_endpoint_auth_method": "client_secret_post"
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

/// `GET /oauth/authorize`: no login page, immediately redirect with a code.
pub async fn handle_authorize(Query(query): Query<AuthorizeQuery>) -> Response {
    if query.response_type.as_deref() != Some("code") {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "unsupported_response_type"})))
            .into_response();
    }

    let Some(redirect_uri) = query.redirect_uri else {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "redirect_uri is required"})))
            .into_response();
    };

    let code = format!("auth-{}", uuid::Uuid::new_v4());

    let mut redirect_url = format!("{redirect_uri}?code={code}");
    if let Some(oauth_state) = query.state {
        redirect_url.push_str(&format!("&state={}", super::guard::url_encode(&oauth_state)));
    }

    tracing::info!("Auto-approved authorization request");
    (StatusCode::FOUND, [(header::LOCATION, redirect_url)]).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
}

/// `POST /oauth/token`: development shim issuing the configured MCP key.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    Form(form): Form<TokenRequest>,
) -> Response {
    tracing::info!(
        grant_type = form.grant_type.as_deref().unwrap_or("none"),
        client_id = form.client_id.as_deref().unwrap_or("none"),
        "OAuth token request"
    );

    let Some(grant_type) = form.grant_type else {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "missing_grant_type"})))
            .into_response();
    };

    if !matches!(grant_type.as_str(), "authorization_code" | "client_credentials") {
        // Accepted anyway for inspector compatibility.
        tracing::warn!(grant_type = %grant_type, "Unsupported grant type");
    }

    let access_token =
        state.config.mcp_api_key.clone().unwrap_or_else(|| "fallback-secret".to_string());

    Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "mcp read write",
        "refresh_token": format!("refresh-{}", uuid::Uuid::new_v4())
    }))
    .into_response()
}

/// The externally visible base URL for metadata documents.
fn base_url(state: &HttpState, headers: &HeaderMap) -> String {
    state.config.public_url.as_ref().map_or_else(
        || {
            let uri = axum::http::Uri::from_static("/");
            super::guard::real_url(headers, &uri).trim_end_matches('/').to_string()
        },
        |url| url.trim_end_matches('/').to_string(),
    )
}

