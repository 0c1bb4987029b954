//! MCP tools: `search` and `fetch` over the ticket backend.
//!
//! Tool calls arrive as a typed [`ToolCall`] decoded at the dispatcher
//! boundary; unknown names never reach the adapter. Results are reshaped into
//! the Deep-Research `search`/`fetch` format. `search` swallows every backend
//! failure into an empty result set; `fetch` turns them into a single
//! "Failed to fetch ticket" error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::client::TicketApiClient;
use crate::config::defaults;
use crate::error::{ToolError, ToolResult};
use crate::models::{
    FetchResult, HistoryEntry, SearchResultItem, SearchResults, TicketDetail, TicketSummary,
};

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Search { query: String },
    Fetch { id: String },
}

impl ToolCall {
    /// Decode a `tools/call` name + arguments pair.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::UnknownTool` for names outside the fixed set.
    pub fn parse(name: &str, arguments: &serde_json::Value) -> ToolResult<Self> {
        match name {
            "search" => Ok(Self::Search { query: string_arg(arguments, "query") }),
            "fetch" => Ok(Self::Fetch { id: string_arg(arguments, "id") }),
            other => Err(ToolError::unknown_tool(other)),
        }
    }
}

fn string_arg(arguments: &serde_json::Value, key: &str) -> String {
    arguments.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

/// Tool metadata for `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// The fixed tool set advertised by `tools/list`.
#[must_use]
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "search",
            description: "Searches for resources using the provided query string and returns \
                          matching results.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query."}
                },
                "required": ["query"]
            }),
        },
        ToolDescriptor {
            name: "fetch",
            description: "Retrieves detailed content for a specific resource identified by the \
                          given ID.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string", "description": "ID of the resource to fetch."}
                },
                "required": ["id"]
            }),
        },
    ]
}

/// Tool execution over the ticket backend.
#[derive(Debug, Clone)]
pub struct TicketTools {
    client: Arc<TicketApiClient>,
}

impl TicketTools {
    #[must_use]
    pub fn new(client: Arc<TicketApiClient>) -> Self {
        Self { client }
    }

    /// Execute a decoded tool call, returning the raw result value that the
    /// dispatcher JSON-stringifies into the `content` block.
    ///
    /// # Errors
    ///
    /// Returns error only for `fetch` failures; `search` never fails.
    pub async fn execute(&self, call: ToolCall) -> ToolResult<serde_json::Value> {
        match call {
            ToolCall::Search { query } => {
                let results = self.search(&query).await;
                Ok(serde_json::to_value(results)?)
            }
            ToolCall::Fetch { id } => {
                let result = self.fetch(&id).await?;
                Ok(serde_json::to_value(result)?)
            }
        }
    }

    /// Search tickets. Backend or parse failures yield an empty result set.
    pub async fn search(&self, query: &str) -> SearchResults {
        match self.client.list_tickets(query, defaults::SEARCH_LIMIT).await {
            Ok(payload) => {
                let results: Vec<SearchResultItem> =
                    payload.into_tickets().iter().map(search_item).collect();
                tracing::info!(count = results.len(), "Search tool returning results");
                SearchResults { results }
            }
            Err(e) => {
                tracing::error!(error = %e, "Search tool backend call failed");
                SearchResults::empty()
            }
        }
    }

    /// Fetch one ticket with its history.
    ///
    /// # Errors
    ///
    /// Any failure maps to `ToolError::FetchFailed` carrying the requested ID.
    pub async fn fetch(&self, ticket_id: &str) -> ToolResult<FetchResult> {
        let payload = self.client.ticket_detail(ticket_id).await.map_err(|e| {
            tracing::error!(ticket_id = %ticket_id, error = %e, "Fetch tool backend call failed");
            ToolError::fetch_failed(ticket_id)
        })?;

        let mut detail = payload.into_detail();

        // The backend reports not-found as a 200 with a null or empty ticket.
        if detail.is_empty() {
            tracing::warn!(ticket_id = %ticket_id, "Fetch tool got an empty ticket");
            return Err(ToolError::fetch_failed(ticket_id));
        }

        // The detail payload usually embeds history; older backends serve it
        // from a separate endpoint. Failures here degrade to an empty history.
        if detail.history.is_empty() {
            detail.history = self.fetch_history(ticket_id).await;
        }

        let metadata = detail_metadata(&detail);
        tracing::info!(ticket_id = %ticket_id, "Fetch tool returning ticket data");

        Ok(FetchResult {
            id: detail.id_string_or(ticket_id),
            title: detail.title.clone().unwrap_or_default(),
            text: detail_text(&detail),
            url: None,
            metadata,
        })
    }

    async fn fetch_history(&self, ticket_id: &str) -> Vec<HistoryEntry> {
        let Ok(value) = self.client.ticket_history(ticket_id).await else {
            return Vec::new();
        };
        value
            .get("history")
            .cloned()
            .and_then(|h| serde_json::from_value(h).ok())
            .unwrap_or_default()
    }
}

/// Build one search result row from a ticket listing entry.
fn search_item(ticket: &TicketSummary) -> SearchResultItem {
    SearchResultItem {
        id: ticket.id_string(),
        title: ticket.title.clone(),
        text: summary_text(ticket),
        url: None,
    }
}

/// Join the non-empty summary fields with " | ", falling back to the title.
fn summary_text(ticket: &TicketSummary) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(description) = non_empty(ticket.description.as_deref()) {
        parts.push(description.to_string());
    }
    if let Some(status) = non_empty(ticket.status_name.as_deref()) {
        parts.push(format!("Status: {status}"));
    }
    if let Some(category) = non_empty(ticket.category_name.as_deref()) {
        parts.push(format!("Category: {category}"));
    }
    if let Some(account) = non_empty(ticket.account_name.as_deref()) {
        parts.push(format!("Account: {account}"));
    }

    if parts.is_empty() { ticket.title.clone() } else { parts.join(" | ") }
}

/// Build the fetch text: description, then a blank line and the history list.
fn detail_text(detail: &TicketDetail) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(description) = non_empty(detail.description.as_deref()) {
        parts.push(format!("Description: {description}"));
    }

    if !detail.history.is_empty() {
        parts.push("\nHistory:".to_string());
        for entry in &detail.history {
            parts.push(format!("- {}: {} (by {})", entry.created_at, entry.content, entry.user_name));
        }
    }

    parts.join("\n")
}

/// Collect the non-empty metadata fields, or `None` when all are empty.
fn detail_metadata(detail: &TicketDetail) -> Option<BTreeMap<String, String>> {
    let fields = [
        ("status_name", &detail.status_name),
        ("category_name", &detail.category_name),
        ("account_name", &detail.account_name),
        ("person_in_charge_name", &detail.person_in_charge_name),
        ("priority", &detail.priority),
        ("created_at", &detail.created_at),
        ("updated_at", &detail.updated_at),
    ];

    let metadata: BTreeMap<String, String> = fields
        .into_iter()
        .filter_map(|(key, value)| {
            non_empty(value.as_deref()).map(|v| (key.to_string(), v.to_string()))
        })
        .collect();

    if metadata.is_empty() { None } else { Some(metadata) }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
