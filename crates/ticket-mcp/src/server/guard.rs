//! Origin validation and CORS.
//!
//! DNS-rebinding protection: requests carrying an `Origin` header are only
//! admitted when the origin is on the allow-list. Requests without `Origin`
//! (direct API calls) pass. The CORS layer must expose `Mcp-Session-Id`;
//! inspector clients read it from the response headers.

use axum::http::{HeaderMap, HeaderName, Method, Uri, header};
use tower_http::cors::{Any, CorsLayer};

/// The session header, lower-cased for header-map use.
pub const MCP_SESSION_ID: &str = "mcp-session-id";

/// Check the `Origin` header against the allow-list.
#[must_use]
pub fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
        // No Origin means a direct API call, not a browser context.
        return true;
    };

    let is_allowed = allowed_origins.iter().any(|o| o == origin);
    if !is_allowed {
        tracing::warn!(origin = %origin, "Rejected request from invalid origin");
    }
    is_allowed
}

/// CORS layer for all routes.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(MCP_SESSION_ID),
        ])
        .expose_headers([HeaderName::from_static(MCP_SESSION_ID)])
}

/// Explicit preflight headers for the `/mcp` OPTIONS handler.
#[must_use]
pub fn preflight_headers() -> [(&'static str, &'static str); 4] {
    [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
        ("Access-Control-Allow-Headers", "Authorization, Content-Type, Mcp-Session-Id"),
        ("Access-Control-Expose-Headers", "Mcp-Session-Id"),
    ]
}

/// Percent-encode a string for use in URL query parameters.
///
/// Session IDs span the whole visible-ASCII range, so they must be encoded
/// before they appear in the legacy endpoint payload.
#[must_use]
pub fn url_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}

/// Reconstruct the externally visible URL behind a terminating proxy.
///
/// Cloud Run (and most load balancers) terminate TLS and forward plain HTTP,
/// so the real scheme and host arrive in `X-Forwarded-*` headers.
#[must_use]
pub fn real_url(headers: &HeaderMap, uri: &Uri) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{proto}://{host}{}", uri.path())
}
