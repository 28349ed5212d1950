//! Stdio transport: newline-delimited JSON-RPC over stdin/stdout.
//!
//! One message per line in, at most one response per line out.
//! Notifications produce no output line. Logging goes to stderr so stdout
//! carries nothing but protocol frames.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::mcp::McpServer;
use crate::protocol::{RpcError, RpcErrorCode};

/// Serve the protocol over stdin/stdout until EOF.
pub async fn run() -> anyhow::Result<()> {
    let mut engine = McpServer::with_builtin_tools()?;
    info!("{} running on stdio", crate::SERVER_NAME);

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(stdin, stdout, &mut engine).await
}

/// Pump messages from `reader` through the engine, writing one response line
/// per request. Blank lines are skipped; unparseable lines are answered with
/// a `-32700` envelope. Returns at EOF.
async fn serve_lines<R, W>(reader: R, mut writer: W, engine: &mut McpServer) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => engine.handle_message(message).await,
            Err(err) => {
                warn!("unparseable input line: {err}");
                Some(RpcError::from_code(RpcErrorCode::ParseError).to_response(None))
            }
        };

        if let Some(response) = response {
            let encoded = serde_json::to_vec(&response)?;
            writer.write_all(&encoded).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Feed a raw protocol script through `serve_lines` and collect the
    /// response lines.
    async fn pump(script: String) -> Vec<Value> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_rx, server_tx) = tokio::io::split(server);
        let (mut client_rx, mut client_tx) = tokio::io::split(client);

        let worker = tokio::spawn(async move {
            let mut engine = McpServer::with_builtin_tools().unwrap();
            serve_lines(BufReader::new(server_rx), server_tx, &mut engine)
                .await
                .unwrap();
        });

        client_tx.write_all(script.as_bytes()).await.unwrap();
        client_tx.shutdown().await.unwrap();

        let mut output = String::new();
        client_rx.read_to_string(&mut output).await.unwrap();
        worker.await.unwrap();

        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn initialize_line() -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "0.0.0"}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_initialize_and_tool_call_over_lines() {
        let call = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "get_current_time",
                "arguments": {"format": "timestamp"}
            }
        });
        let script = format!("{}\n{}\n", initialize_line(), call);

        let responses = pump(script).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0]["result"]["serverInfo"]["name"],
            crate::SERVER_NAME
        );
        let text = responses[1]["result"]["content"][0]["text"]
            .as_str()
            .unwrap();
        assert!(text.parse::<i64>().is_ok(), "not a timestamp: {text}");
    }

    #[tokio::test]
    async fn test_notifications_produce_no_output_line() {
        let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let ping = json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
        let script = format!("{}\n{}\n{}\n", initialize_line(), notification, ping);

        let responses = pump(script).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 0);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_blank_and_malformed_lines() {
        let script = format!("\n{{oops\n{}\n", initialize_line());

        let responses = pump(script).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[0]["id"], Value::Null);
        assert!(responses[1].get("result").is_some());
    }
}
