//! Stdio transport: JSON-RPC 2.0 over stdin/stdout.
//!
//! One process, one implicit session, direct dispatch. Notifications produce
//! no output; everything else gets a response line.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::dispatch::{Dispatcher, JsonRpcResponse, MessageKind, classify};

/// Run the MCP protocol over stdio until EOF.
///
/// # Errors
///
/// Returns error on I/O failure.
pub async fn run_stdio(dispatcher: Dispatcher) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    tracing::info!("MCP stdio server ready, waiting for requests...");

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            tracing::info!("Stdin closed, shutting down");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let message: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(e) => {
                let error_response = JsonRpcResponse::error_with_data(
                    Some(serde_json::Value::Null),
                    -32700,
                    "Parse error",
                    serde_json::json!(e.to_string()),
                );
                write_response(&mut stdout, &error_response).await?;
                continue;
            }
        };

        match classify(&message) {
            MessageKind::Notification | MessageKind::Response => {
                dispatcher.handle_client_message(&message, "stdio");
            }
            MessageKind::Request => {
                let response = dispatcher.dispatch(&message).await;
                write_response(&mut stdout, &response).await?;
            }
            MessageKind::Invalid => {
                let error_response = JsonRpcResponse::error(
                    message.get("id").cloned().or(Some(serde_json::Value::Null)),
                    -32600,
                    "Invalid JSON-RPC message format",
                );
                write_response(&mut stdout, &error_response).await?;
            }
        }
    }

    Ok(())
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> anyhow::Result<()> {
    let response_json = serde_json::to_string(response)?;
    stdout.write_all(response_json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
