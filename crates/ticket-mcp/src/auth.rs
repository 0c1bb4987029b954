//! Pluggable authentication for the MCP edge.
//!
//! Providers validate credential format locally and derive the headers an
//! authenticated call would carry; real key validation is the backend's job.
//! Credential extraction is centralised here so transports never pick tokens
//! out of requests themselves.

use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::config::{AuthProviderKind, defaults};

/// Credentials extracted from an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// API key or bearer token, whichever the client presented.
    pub api_key: Option<String>,
}

impl Credentials {
    /// Build credentials from a bare token.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self { api_key: Some(token.into()) }
    }

    /// Extract credentials from request headers and the optional `api_key`
    /// query parameter.
    ///
    /// Precedence: `Authorization: Bearer <token>`, then `?api_key=`, then the
    /// `x-mcp-api-key` header.
    #[must_use]
    pub fn extract(headers: &HeaderMap, query_api_key: Option<&str>) -> Self {
        let bearer = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let api_key = bearer
            .map(str::to_string)
            .or_else(|| query_api_key.map(str::to_string))
            .or_else(|| {
                headers
                    .get(defaults::MCP_API_KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            });

        Self { api_key }
    }

    /// The presented token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

/// Result of an authentication attempt. Never carries the credential itself.
#[derive(Debug, Clone, Default)]
pub struct AuthResult {
    pub success: bool,
    pub user_id: Option<String>,
    pub user_info: HashMap<String, String>,
    pub error_message: Option<String>,
}

impl AuthResult {
    fn ok(user_id: &str, auth_method: &str) -> Self {
        Self {
            success: true,
            user_id: Some(user_id.to_string()),
            user_info: HashMap::from([("auth_method".to_string(), auth_method.to_string())]),
            error_message: None,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            user_id: None,
            user_info: HashMap::new(),
            error_message: Some(message.to_string()),
        }
    }
}

/// Authentication provider behaviour.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Provider name, reported by `/health`.
    fn name(&self) -> &'static str;

    /// Authenticate the presented credentials.
    async fn authenticate(&self, credentials: &Credentials) -> AuthResult;

    /// Headers an authenticated request would carry.
    fn auth_headers(&self, credentials: &Credentials) -> HashMap<String, String>;

    /// Validate credential format without external calls.
    fn validate(&self, credentials: &Credentials) -> bool;
}

/// API-key provider. Accepts any non-empty key; the backend rejects bad ones.
pub struct ApiKeyAuthProvider {
    header_name: String,
}

impl ApiKeyAuthProvider {
    #[must_use]
    pub fn new(header_name: impl Into<String>) -> Self {
        Self { header_name: header_name.into() }
    }
}

impl Default for ApiKeyAuthProvider {
    fn default() -> Self {
        Self::new(defaults::MCP_API_KEY_HEADER)
    }
}

#[async_trait::async_trait]
impl AuthProvider for ApiKeyAuthProvider {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn authenticate(&self, credentials: &Credentials) -> AuthResult {
        if !self.validate(credentials) {
            return AuthResult::failed("API key not provided");
        }
        AuthResult::ok("api_key_user", "api_key")
    }

    fn auth_headers(&self, credentials: &Credentials) -> HashMap<String, String> {
        let Some(key) = credentials.token() else {
            return HashMap::new();
        };
        HashMap::from([
            (self.header_name.clone(), key.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ])
    }

    fn validate(&self, credentials: &Credentials) -> bool {
        credentials.token().is_some_and(|key| !key.trim().is_empty())
    }
}

/// Provider that admits everyone as `anonymous`.
pub struct NoAuthProvider;

#[async_trait::async_trait]
impl AuthProvider for NoAuthProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn authenticate(&self, _credentials: &Credentials) -> AuthResult {
        AuthResult::ok("anonymous", "none")
    }

    fn auth_headers(&self, _credentials: &Credentials) -> HashMap<String, String> {
        HashMap::from([("Content-Type".to_string(), "application/json".to_string())])
    }

    fn validate(&self, _credentials: &Credentials) -> bool {
        true
    }
}

/// Unified front over the configured provider.
pub struct AuthManager {
    provider: Box<dyn AuthProvider>,
}

impl AuthManager {
    #[must_use]
    pub fn new(provider: Box<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    /// Provider name, reported by `/health`.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Authenticate using the configured provider.
    pub async fn authenticate(&self, credentials: &Credentials) -> AuthResult {
        self.provider.authenticate(credentials).await
    }

    /// Headers an authenticated request would carry.
    #[must_use]
    pub fn auth_headers(&self, credentials: &Credentials) -> HashMap<String, String> {
        self.provider.auth_headers(credentials)
    }

    /// Validate credential format.
    #[must_use]
    pub fn validate(&self, credentials: &Credentials) -> bool {
        self.provider.validate(credentials)
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager").field("provider", &self.provider_name()).finish()
    }
}

/// Build an auth manager for the configured provider kind.
///
/// # Errors
///
/// Returns error for the declared-but-unimplemented `oauth` provider.
pub fn create_auth_manager(kind: AuthProviderKind) -> anyhow::Result<AuthManager> {
    match kind {
        AuthProviderKind::ApiKey => Ok(AuthManager::new(Box::new(ApiKeyAuthProvider::default()))),
        AuthProviderKind::None => Ok(AuthManager::new(Box::new(NoAuthProvider))),
        AuthProviderKind::OAuth => {
            anyhow::bail!("OAuth authentication not yet implemented")
        }
    }
}
