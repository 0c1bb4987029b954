//! MCP Ticket Gateway
//!
//! A Model Context Protocol (MCP) server in front of a ticket-management REST
//! backend. Exposes the Deep-Research `search`/`fetch` tool pair over the
//! Streamable HTTP transport, with a legacy SSE + messages transport and a
//! stdio adapter for desktop hosts.
//!
//! # Example
//!
//! ```no_run
//! use ticket_mcp::{config::Config, server::McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = McpServer::new(config)?;
//!     server.run_http().await
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use client::TicketApiClient;
pub use config::Config;
pub use error::{ClientError, ToolError};
