//! Configuration for the MCP ticket gateway.

use std::time::Duration;

/// Protocol and timing constants.
pub mod defaults {
    use std::time::Duration;

    /// MCP protocol version advertised by `initialize`.
    pub const PROTOCOL_VERSION: &str = "2025-03-26";

    /// Server name advertised by `initialize`.
    pub const SERVER_NAME: &str = "MCP Ticket Server";

    /// Server version advertised by `initialize`.
    pub const SERVER_VERSION: &str = "1.0.0";

    /// Streamable HTTP endpoint path.
    pub const MCP_ENDPOINT: &str = "/mcp";

    /// Base URL for the ticket REST backend.
    pub const API_BASE_URL: &str = "http://localhost:8080";

    /// Backend request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Backend connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Header carrying the backend API key.
    pub const BACKEND_API_KEY_HEADER: &str = "x-api-key";

    /// Header carrying the MCP API key (api-key auth provider).
    pub const MCP_API_KEY_HEADER: &str = "x-mcp-api-key";

    /// Maximum session age for the Streamable HTTP transport.
    pub const SESSION_MAX_AGE: Duration = Duration::from_secs(30 * 60);

    /// Inactivity limit used by the legacy transport's cleanup sweep.
    pub const LEGACY_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

    /// Stream connection lifetime (Cloud Run caps requests at 14 minutes).
    pub const STREAM_TIMEOUT: Duration = Duration::from_secs(840);

    /// Interval between SSE keep-alive frames.
    pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

    /// How long a legacy stream blocks on its queue before a keep-alive.
    pub const QUEUE_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Interval between session/connection cleanup sweeps.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

    /// Session ID length in characters.
    pub const SESSION_ID_LEN: usize = 32;

    /// Per-session legacy message queue capacity.
    pub const QUEUE_CAPACITY: usize = 64;

    /// Result limit passed to the backend by the `search` tool.
    pub const SEARCH_LIMIT: u32 = 20;

    /// Origins admitted by default: MCP Inspector on its usual ports.
    pub const INSPECTOR_ORIGINS: &[&str] = &[
        "http://127.0.0.1:6274",
        "http://127.0.0.1:6277",
        "http://localhost:6274",
        "http://localhost:6277",
        "https://127.0.0.1:6274",
        "https://127.0.0.1:6277",
        "https://localhost:6274",
        "https://localhost:6277",
    ];
}

/// Authentication provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthProviderKind {
    /// API-key credential checked for format only; the backend does the real validation.
    #[default]
    #[value(name = "api_key")]
    ApiKey,
    /// No authentication; every caller is `anonymous`.
    None,
    /// Declared but not implemented.
    #[value(name = "oauth")]
    OAuth,
}

impl AuthProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::None => "none",
            Self::OAuth => "oauth",
        }
    }
}

impl std::str::FromStr for AuthProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api_key" => Ok(Self::ApiKey),
            "none" => Ok(Self::None),
            "oauth" => Ok(Self::OAuth),
            other => anyhow::bail!("unsupported authentication type: {other}"),
        }
    }
}

/// Primary transport selection. Both endpoint families are always routed;
/// this only records which one the deployment advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransportType {
    #[value(name = "sse")]
    Sse,
    #[default]
    #[value(name = "streamable_http")]
    StreamableHttp,
}

impl std::str::FromStr for TransportType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sse" => Ok(Self::Sse),
            "streamable_http" => Ok(Self::StreamableHttp),
            other => anyhow::bail!("unsupported transport type: {other}"),
        }
    }
}

/// Server configuration, immutable after startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ticket REST backend.
    pub api_base_url: String,

    /// Backend API key, sent as `x-api-key` on every backend call.
    pub api_key: Option<String>,

    /// API key clients must present to this gateway (api-key auth mode).
    pub mcp_api_key: Option<String>,

    /// Authentication provider for the MCP edge.
    pub auth_provider: AuthProviderKind,

    /// Advertised transport.
    pub transport_type: TransportType,

    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Streamable session maximum age.
    pub session_max_age: Duration,

    /// Legacy session inactivity limit.
    pub legacy_idle_timeout: Duration,

    /// Stream connection lifetime.
    pub stream_timeout: Duration,

    /// Backend request timeout.
    pub request_timeout: Duration,

    /// Origins admitted by the DNS-rebinding guard.
    pub allowed_origins: Vec<String>,

    /// Public base URL, used in OAuth discovery documents.
    pub public_url: Option<String>,

    /// Deployment environment name.
    pub node_env: String,

    /// Set when running behind a cloud request proxy (Cloud Run and friends).
    pub cloud_mode: bool,
}

impl Config {
    /// Create a configuration with the given backend coordinates and defaults
    /// for everything else.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let public_url: Option<String> = None;
        Self {
            api_base_url: api_base_url.into(),
            api_key,
            mcp_api_key: None,
            auth_provider: AuthProviderKind::default(),
            transport_type: TransportType::default(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            session_max_age: defaults::SESSION_MAX_AGE,
            legacy_idle_timeout: defaults::LEGACY_IDLE_TIMEOUT,
            stream_timeout: defaults::STREAM_TIMEOUT,
            request_timeout: defaults::REQUEST_TIMEOUT,
            allowed_origins: default_origins(public_url.as_deref()),
            public_url,
            node_env: "development".to_string(),
            cloud_mode: false,
        }
    }

    /// Create configuration from `MCP_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but unparseable.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url =
            env_var("MCP_API_BASE_URL").unwrap_or_else(|| defaults::API_BASE_URL.to_string());
        let mut config = Self::new(api_base_url, env_var("MCP_API_KEY"));

        config.mcp_api_key = env_var("MCP_MCP_API_KEY");

        if let Some(provider) = env_var("MCP_AUTH_PROVIDER") {
            config.auth_provider = provider.parse()?;
        }
        if let Some(transport) = env_var("MCP_TRANSPORT_TYPE") {
            config.transport_type = transport.parse()?;
        }
        if let Some(host) = env_var("MCP_HOST") {
            config.host = host;
        }
        if let Some(port) = env_var("MCP_PORT") {
            config.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("MCP_PORT is not a valid port number: {port}"))?;
        }
        if let Some(env) = env_var("MCP_NODE_ENV") {
            config.node_env = env;
        }
        config.cloud_mode = env_var("MCP_CLOUD_MODE").is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(config)
    }

    /// Create a test configuration pointed at a mock backend.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        let mut config = Self::new(base_url, None);
        config.request_timeout = Duration::from_secs(5);
        config.session_max_age = Duration::from_secs(60);
        config.legacy_idle_timeout = Duration::from_secs(60);
        config
    }

    /// Check if a backend API key is configured.
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Check if the gateway runs in production mode.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.node_env == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(defaults::API_BASE_URL, None)
    }
}

/// Build the default origin allow-list, including the public URL if known.
#[must_use]
pub fn default_origins(public_url: Option<&str>) -> Vec<String> {
    let mut origins: Vec<String> =
        defaults::INSPECTOR_ORIGINS.iter().map(|o| (*o).to_string()).collect();
    if let Some(url) = public_url {
        origins.push(url.trim_end_matches('/').to_string());
    }
    origins
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_base_url, defaults::API_BASE_URL);
        assert!(!config.has_api_key());
        assert_eq!(config.auth_provider, AuthProviderKind::ApiKey);
        assert_eq!(config.transport_type, TransportType::StreamableHttp);
        assert_eq!(config.session_max_age, Duration::from_secs(1800));
        assert_eq!(config.legacy_idle_timeout, Duration::from_secs(900));
        assert_eq!(config.stream_timeout, Duration::from_secs(840));
    }

    #[test]
    fn test_config_with_api_key() {
        let config = Config::new("http://backend:9000", Some("test-key".to_string()));
        assert!(config.has_api_key());
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_auth_provider_parse() {
        assert_eq!("api_key".parse::<AuthProviderKind>().unwrap(), AuthProviderKind::ApiKey);
        assert_eq!("none".parse::<AuthProviderKind>().unwrap(), AuthProviderKind::None);
        assert_eq!("oauth".parse::<AuthProviderKind>().unwrap(), AuthProviderKind::OAuth);
        assert!("saml".parse::<AuthProviderKind>().is_err());
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("sse".parse::<TransportType>().unwrap(), TransportType::Sse);
        assert_eq!(
            "streamable_http".parse::<TransportType>().unwrap(),
            TransportType::StreamableHttp
        );
        assert!("websocket".parse::<TransportType>().is_err());
    }

    #[test]
    fn test_default_origins_include_inspector() {
        let origins = default_origins(None);
        assert!(origins.contains(&"http://127.0.0.1:6274".to_string()));
        assert!(origins.contains(&"https://localhost:6277".to_string()));
    }

    #[test]
    fn test_default_origins_append_public_url() {
        let origins = default_origins(Some("https://gateway.example.com/"));
        assert!(origins.contains(&"https://gateway.example.com".to_string()));
    }
}
