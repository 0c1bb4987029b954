//! MCP server: transports, sessions, dispatch.
//!
//! The Streamable HTTP transport (`/mcp`) is the primary surface; the legacy
//! SSE + messages endpoints remain for older clients. Both share one router,
//! one dispatcher, and per-transport session managers.

pub mod connection;
pub mod dispatch;
pub mod guard;
pub mod legacy;
pub mod oauth;
pub mod session;
pub mod sse;
pub mod stdio;
pub mod streamable;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthManager, create_auth_manager};
use crate::client::TicketApiClient;
use crate::config::{Config, defaults};
use crate::tools::TicketTools;
use connection::ConnectionManager;
use dispatch::Dispatcher;
use session::SessionManager;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub config: Config,
    pub auth: AuthManager,
    pub dispatcher: Dispatcher,
    /// Sessions minted by Streamable HTTP `initialize` (30-minute age limit).
    pub streamable_sessions: Arc<SessionManager>,
    /// Sessions minted by the legacy `/sse` endpoint (15-minute idle sweep).
    pub legacy_sessions: Arc<SessionManager>,
    /// Pre-session stream connections for the legacy welcome/ping path.
    pub connections: Arc<ConnectionManager>,
}

/// The MCP ticket gateway.
pub struct McpServer {
    state: Arc<HttpState>,
}

impl McpServer {
    /// Build the server from configuration.
    ///
    /// # Errors
    ///
    /// Returns error when the backend client or auth provider cannot be built.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = TicketApiClient::new(&config)?;
        let dispatcher = Dispatcher::new(TicketTools::new(Arc::new(client)));
        let auth = create_auth_manager(config.auth_provider)?;

        let streamable_sessions =
            Arc::new(SessionManager::new(config.session_max_age, config.session_max_age));
        let legacy_sessions =
            Arc::new(SessionManager::new(config.session_max_age, config.legacy_idle_timeout));
        let connections = Arc::new(ConnectionManager::new(config.stream_timeout));

        let state = Arc::new(HttpState {
            config,
            auth,
            dispatcher,
            streamable_sessions,
            legacy_sessions,
            connections,
        });

        Ok(Self { state })
    }

    /// Run the server in stdio mode.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        tracing::info!("Starting MCP server in stdio mode");
        stdio::run_stdio(self.state.dispatcher.clone()).await
    }

    /// Run the server in HTTP mode.
    ///
    /// # Errors
    ///
    /// Returns error on bind or serve failure.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let host = self.state.config.host.clone();
        let port = self.state.config.port;

        Arc::clone(&self.state.streamable_sessions).start_cleanup_task();
        Arc::clone(&self.state.legacy_sessions).start_cleanup_task();
        Arc::clone(&self.state.connections).start_cleanup_task();

        let router = create_router(Arc::clone(&self.state));

        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid listen address {host}:{port}"))?;

        tracing::info!("HTTP server listening on http://{addr}");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    /// Shared handler state, exposed for tests.
    #[must_use]
    pub fn state(&self) -> Arc<HttpState> {
        Arc::clone(&self.state)
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").field("auth", &self.state.auth.provider_name()).finish()
    }
}

/// Build the HTTP router over shared state.
pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        // Streamable HTTP transport - single endpoint
        .route(
            defaults::MCP_ENDPOINT,
            get(streamable::handle_mcp_get)
                .post(streamable::handle_mcp_post)
                .options(streamable::handle_mcp_options),
        )
        // Legacy SSE transport for backward compatibility
        .route("/sse", get(legacy::handle_sse))
        .route("/messages", post(legacy::handle_messages))
        .route("/message", post(legacy::handle_message))
        // OAuth discovery stubs
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::handle_authorization_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(oauth::handle_protected_resource_metadata),
        )
        .route("/register", post(oauth::handle_register))
        .route("/oauth/authorize", get(oauth::handle_authorize))
        .route("/oauth/token", post(oauth::handle_token))
        .layer(guard::cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_root() -> impl IntoResponse {
    Json(json!({
        "name": defaults::SERVER_NAME,
        "version": defaults::SERVER_VERSION,
        "transport": ["Streamable HTTP", "SSE"],
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn handle_health(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let sse_connections = state.connections.active_count();
    let streamable_sessions = state.streamable_sessions.active_count();
    let legacy_sessions = state.legacy_sessions.active_count();

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "transport": {
            "sse_connections": sse_connections,
            "streamable_sessions": streamable_sessions,
            "legacy_sessions": legacy_sessions,
            "total_active": sse_connections + streamable_sessions + legacy_sessions
        },
        "auth_provider": state.auth.provider_name(),
        "endpoints": ["/mcp", "/sse", "/messages", "/message"]
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    tracing::info!("Received shutdown signal");
}
