use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::server::McpServer;

/// Transport 1: one JSON-RPC request per line on stdin, one response per
/// line on stdout. All diagnostics go to stderr via tracing; stdout carries
/// nothing but responses.
pub async fn serve(server: Arc<McpServer>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!("stdio transport ready");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => {
                info!("stdio transport shutting down");
                return Ok(());
            }
        };

        let Some(line) = line else {
            debug!("stdin closed");
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => server.handle(request).await,
            Err(e) => {
                error!(error = %e, "unparseable request line");
                Some(JsonRpcResponse::parse_error(e))
            }
        };

        if let Some(response) = response {
            let mut body = serde_json::to_string(&response)?;
            body.push('\n');
            stdout.write_all(body.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
}
