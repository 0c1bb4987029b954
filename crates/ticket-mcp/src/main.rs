//! MCP Ticket Gateway - Entry Point
//!
//! Provides both stdio (for desktop hosts) and HTTP transports.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ticket_mcp::config::{AuthProviderKind, Config, TransportType};
use ticket_mcp::server::McpServer;

#[derive(Parser, Debug)]
#[command(name = "ticket-mcp")]
#[command(about = "MCP gateway for a ticket-management REST backend")]
#[command(version)]
struct Cli {
    /// Ticket backend base URL
    #[arg(long, env = "MCP_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Backend API key, sent as x-api-key on every backend call
    #[arg(long, env = "MCP_API_KEY")]
    api_key: Option<String>,

    /// Transport mode: stdio or http
    #[arg(long, default_value = "http")]
    transport: Transport,

    /// Advertised HTTP transport flavour
    #[arg(long, value_enum, env = "MCP_TRANSPORT_TYPE")]
    transport_type: Option<TransportType>,

    /// Authentication provider for the MCP edge
    #[arg(long, value_enum, env = "MCP_AUTH_PROVIDER")]
    auth_provider: Option<AuthProviderKind>,

    /// HTTP listen host (only used with --transport http)
    #[arg(long, env = "MCP_HOST")]
    host: Option<String>,

    /// HTTP listen port (only used with --transport http)
    #[arg(long, env = "MCP_PORT")]
    port: Option<u16>,

    /// Public base URL for OAuth discovery and origin allow-listing
    #[arg(long, env = "MCP_PUBLIC_URL")]
    public_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Transport {
    /// Standard input/output (for desktop MCP hosts)
    Stdio,
    /// HTTP with Streamable HTTP and SSE endpoints
    #[default]
    Http,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }
    if let Some(transport_type) = cli.transport_type {
        config.transport_type = transport_type;
    }
    if let Some(provider) = cli.auth_provider {
        config.auth_provider = provider;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.public_url {
        config.allowed_origins.push(url.trim_end_matches('/').to_string());
        config.public_url = Some(url);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cli.transport,
        auth_provider = config.auth_provider.as_str(),
        cloud_mode = config.cloud_mode,
        "Starting MCP ticket gateway"
    );

    let server = McpServer::new(config)?;

    match cli.transport {
        Transport::Stdio => {
            tracing::info!("Running in stdio mode");
            server.run_stdio().await?;
        }
        Transport::Http => {
            server.run_http().await?;
        }
    }

    Ok(())
}
