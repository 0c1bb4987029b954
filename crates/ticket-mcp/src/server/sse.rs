//! SSE frame encoding.
//!
//! The single place SSE bytes are produced; transports never concatenate
//! frame text themselves. Payloads that are not already JSON-RPC shaped are
//! wrapped into JSON-RPC 2.0 notifications/responses before framing.

use serde_json::{Value, json};

/// One SSE event: `id:` / `event:` / `data:` lines terminated by a blank line.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub id: String,
    pub event: String,
    pub data: Value,
}

impl SseFrame {
    /// Create a frame with a fresh UUID event ID.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), event: event.into(), data }
    }

    /// Create a frame with an explicit event ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), event: event.into(), data }
    }

    /// Encode the frame as SSE wire text.
    ///
    /// Object payloads go through the JSON-RPC wrapping rule; string payloads
    /// are emitted verbatim (the legacy endpoint event is a bare path).
    #[must_use]
    pub fn to_sse_format(&self) -> String {
        let payload = match &self.data {
            Value::String(s) => s.clone(),
            Value::Object(_) => {
                let wrapped = wrap_jsonrpc(&self.data);
                serde_json::to_string(&wrapped).unwrap_or_else(|_| "{}".to_string())
            }
            other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
        };

        format!("id: {}\nevent: {}\ndata: {}\n\n", self.id, self.event, payload)
    }
}

/// Encode an SSE comment line, used as a keep-alive.
#[must_use]
pub fn comment(text: &str) -> String {
    format!(": {text}\n\n")
}

/// Event types that map to `notifications/<type>`.
const NOTIFICATION_TYPES: &[&str] = &["welcome", "ping", "error", "connection"];

/// Wrap an arbitrary object payload into JSON-RPC 2.0 shape.
///
/// Payloads already carrying `jsonrpc` pass through untouched.
fn wrap_jsonrpc(data: &Value) -> Value {
    if data.get("jsonrpc").is_some() {
        return data.clone();
    }

    if let Some(kind) = data.get("type").and_then(Value::as_str) {
        if NOTIFICATION_TYPES.contains(&kind) {
            let mut params = data.clone();
            if let Some(map) = params.as_object_mut() {
                map.remove("type");
            }
            return json!({
                "jsonrpc": "2.0",
                "method": format!("notifications/{kind}"),
                "params": params
            });
        }
    }

    if data.get("result").is_some() && data.get("id").is_some() {
        return json!({
            "jsonrpc": "2.0",
            "id": data["id"],
            "result": data["result"]
        });
    }

    if let Some(error) = data.get("error") {
        if data.get("id").is_some() {
            let error = if error.is_object() {
                error.clone()
            } else {
                json!({"code": -32000, "message": error_text(error)})
            };
            return json!({
                "jsonrpc": "2.0",
                "id": data["id"],
                "error": error
            });
        }
    }

    json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": data
    })
}

fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
