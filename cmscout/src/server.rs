//! Line-delimited JSON-RPC 2.0 over stdin/stdout.
//!
//! One request per line in, one response per line out. Notifications (requests
//! without an `id`) are consumed without a reply. Logging goes to stderr, so
//! stdout carries protocol traffic only.

use anyhow::Result;
use cmscout_core::Toolbox;
use cmscout_core::tools::{render_outcome, tool_definitions};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "cmscout";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn success(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn failure(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message.into()}
    })
}

/// Handle one protocol line. `None` means nothing is written back.
pub async fn handle_message(toolbox: &Toolbox, line: &str) -> Option<Value> {
    let raw: Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Unparseable message: {}", e);
            return Some(failure(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)));
        }
    };

    let request: Request = match serde_json::from_value(raw.clone()) {
        Ok(request) => request,
        Err(e) => {
            let id = raw.get("id").cloned().unwrap_or(Value::Null);
            return Some(failure(id, INVALID_REQUEST, format!("Invalid request: {}", e)));
        }
    };

    let Some(id) = request.id else {
        debug!("Notification {}", request.method);
        return None;
    };

    debug!("Request {} ({})", request.method, id);
    let response = match request.method.as_str() {
        "initialize" => success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
            }),
        ),
        "ping" => success(id, json!({})),
        "tools/list" => success(id, json!({"tools": tool_definitions()})),
        "tools/call" => match serde_json::from_value::<CallParams>(request.params) {
            Ok(params) => {
                let outcome = toolbox.dispatch(&params.name, &params.arguments).await;
                let text = render_outcome(&params.name, &outcome);
                success(
                    id,
                    json!({
                        "content": [{"type": "text", "text": text}],
                        "isError": outcome.is_err()
                    }),
                )
            }
            Err(e) => failure(id, INVALID_PARAMS, format!("Invalid params: {}", e)),
        },
        other => failure(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    };
    Some(response)
}

/// Serve requests from `reader` until end of input.
pub async fn serve<R, W>(toolbox: &Toolbox, reader: R, mut writer: W) -> Result<()>
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

        if let Some(response) = handle_message(toolbox, line).await {
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

pub async fn serve_stdio(toolbox: &Toolbox) -> Result<()> {
    info!("Serving tools on stdio");
    serve(toolbox, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!("Input closed, shutting down");
    Ok(())
}
