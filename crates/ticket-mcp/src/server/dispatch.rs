//! JSON-RPC 2.0 message types, classification, and method dispatch.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Value, json};

use crate::config::defaults;
use crate::tools::{TicketTools, ToolCall, tool_descriptors};

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// JSON-RPC version constant.
    const VERSION: &'static str = "2.0";

    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: Cow::Borrowed(Self::VERSION), result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: None }),
            id,
        }
    }

    #[must_use]
    pub fn error_with_data(
        id: Option<Value>,
        code: i32,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(Self::VERSION),
            result: None,
            error: Some(JsonRpcError { code, message: message.into(), data: Some(data) }),
            id,
        }
    }
}

/// Syntactic JSON-RPC message kind, decided purely on field presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    Invalid,
}

/// Classify a parsed body.
#[must_use]
pub fn classify(body: &Value) -> MessageKind {
    let Some(obj) = body.as_object() else {
        return MessageKind::Invalid;
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return MessageKind::Invalid;
    }

    let has_id = obj.contains_key("id");
    let has_method = obj.contains_key("method");
    let has_result_or_error = obj.contains_key("result") || obj.contains_key("error");

    if has_method && has_id {
        MessageKind::Request
    } else if has_method {
        MessageKind::Notification
    } else if has_result_or_error && has_id {
        MessageKind::Response
    } else {
        MessageKind::Invalid
    }
}

/// Routes JSON-RPC requests to method handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tools: TicketTools,
}

impl Dispatcher {
    #[must_use]
    pub fn new(tools: TicketTools) -> Self {
        Self { tools }
    }

    /// Dispatch a request body to its method handler.
    pub async fn dispatch(&self, body: &Value) -> JsonRpcResponse {
        let method = body.get("method").and_then(Value::as_str).unwrap_or_default();
        let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
        let id = body.get("id").cloned();

        tracing::debug!(method = %method, "Dispatching request");

        match method {
            "initialize" => JsonRpcResponse::success(id, initialize_result()),
            "tools/list" => JsonRpcResponse::success(id, json!({"tools": tool_descriptors()})),
            "tools/call" => self.handle_tools_call(id, &params).await,
            "ping" => JsonRpcResponse::success(
                id,
                json!({"status": "pong", "timestamp": chrono::Utc::now().to_rfc3339()}),
            ),
            other => JsonRpcResponse::error(id, -32601, format!("Method not found: {other}")),
        }
    }

    /// Log side effects of client-originated notifications and responses.
    pub fn handle_client_message(&self, body: &Value, session_id: &str) {
        match classify(body) {
            MessageKind::Notification => {
                let method = body.get("method").and_then(Value::as_str).unwrap_or_default();
                if method == "notifications/cancelled" {
                    let request_id = body
                        .get("params")
                        .and_then(|p| p.get("requestId"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    let reason = body
                        .get("params")
                        .and_then(|p| p.get("reason"))
                        .and_then(Value::as_str)
                        .unwrap_or("Client cancelled");
                    tracing::info!(
                        session_id = %session_id,
                        request_id = %request_id,
                        reason = %reason,
                        "Cancellation notification"
                    );
                } else {
                    tracing::info!(session_id = %session_id, method = %method, "Notification");
                }
            }
            MessageKind::Response => {
                // Accepted for future server->client requests (e.g. sampling).
                let id = body.get("id").cloned().unwrap_or(Value::Null);
                tracing::info!(session_id = %session_id, id = %id, "Client response");
            }
            _ => {}
        }
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: &Value) -> JsonRpcResponse {
        let tool_name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let call = match ToolCall::parse(tool_name, &arguments) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(tool = %tool_name, "Rejected tool call");
                return JsonRpcResponse::error_with_data(
                    id,
                    -32603,
                    e.to_string(),
                    json!(e.to_string()),
                );
            }
        };

        tracing::info!(tool = %tool_name, "Executing tool");

        match self.tools.execute(call).await {
            Ok(result) => {
                let text = serde_json::to_string(&result).unwrap_or_default();
                JsonRpcResponse::success(id, json!({"content": [{"type": "text", "text": text}]}))
            }
            Err(e) => {
                tracing::error!(tool = %tool_name, error = %e, "Tool execution failed");
                JsonRpcResponse::error_with_data(id, -32603, e.to_string(), json!(e.to_string()))
            }
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": defaults::PROTOCOL_VERSION,
        "serverName": defaults::SERVER_NAME,
        "serverVersion": defaults::SERVER_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {},
            "logging": {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::client::TicketApiClient;
    use crate::config::Config;

    fn dispatcher() -> Dispatcher {
        let config = Config::for_testing("http://127.0.0.1:1");
        let client = TicketApiClient::new(&config).unwrap();
        Dispatcher::new(TicketTools::new(Arc::new(client)))
    }

    #[test]
    fn test_classify_request() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        assert_eq!(classify(&body), MessageKind::Request);
    }

    #[test]
    fn test_classify_notification() {
        let body = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert_eq!(classify(&body), MessageKind::Notification);
    }

    #[test]
    fn test_classify_response() {
        assert_eq!(
            classify(&json!({"jsonrpc": "2.0", "id": 1, "result": {}})),
            MessageKind::Response
        );
        assert_eq!(
            classify(&json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -1, "message": "x"}})),
            MessageKind::Response
        );
    }

    #[test]
    fn test_classify_invalid() {
        assert_eq!(classify(&json!({"jsonrpc": "2.0"})), MessageKind::Invalid);
        assert_eq!(classify(&json!({"jsonrpc": "1.0", "id": 1, "method": "m"})), MessageKind::Invalid);
        assert_eq!(classify(&json!({"id": 1, "method": "m"})), MessageKind::Invalid);
        assert_eq!(classify(&json!([1, 2])), MessageKind::Invalid);
        assert_eq!(classify(&json!("text")), MessageKind::Invalid);
        // A response shape without an id is not a valid message either.
        assert_eq!(classify(&json!({"jsonrpc": "2.0", "result": {}})), MessageKind::Invalid);
    }

    #[tokio::test]
    async fn test_initialize_result() {
        let response = dispatcher()
            .dispatch(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!("2025-03-26"));
        assert_eq!(result["serverName"], json!("MCP Ticket Server"));
        assert_eq!(result["serverVersion"], json!("1.0.0"));
        assert_eq!(
            result["capabilities"],
            json!({"tools": {}, "resources": {}, "prompts": {}, "logging": {}})
        );
        assert_eq!(response.id, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = dispatcher()
            .dispatch(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}}))
            .await;

        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], json!("search"));
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["query"]));
        assert_eq!(tools[1]["name"], json!("fetch"));
        assert_eq!(tools[1]["inputSchema"]["required"], json!(["id"]));
    }

    #[tokio::test]
    async fn test_ping_result() {
        let response =
            dispatcher().dispatch(&json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).await;

        let result = response.result.unwrap();
        assert_eq!(result["status"], json!("pong"));
        // RFC 3339 timestamp.
        let timestamp = result["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = dispatcher()
            .dispatch(&json!({"jsonrpc": "2.0", "id": 4, "method": "resources/list"}))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("resources/list"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let response = dispatcher()
            .dispatch(&json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "tools/call",
                "params": {"name": "drop_tables", "arguments": {}}
            }))
            .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "Unknown tool: drop_tables");
        assert_eq!(error.data, Some(json!("Unknown tool: drop_tables")));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = JsonRpcResponse::error(Some(Value::Null), -32700, "Parse error");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], json!(-32700));
        assert!(value.get("result").is_none());
    }
}
