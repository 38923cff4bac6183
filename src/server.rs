// ABOUTME: Newline-delimited JSON-RPC transport between the MCP client and McpServer
// ABOUTME: Reads client lines concurrently and serializes all writes through one task

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::mcp::McpServer;

/// Serve MCP over `reader`/`writer` until the client closes its side.
///
/// Every line is handled in its own task so a tool call waiting on Discord
/// never blocks the sampling responses the bridge is waiting for. After the
/// client closes its side, requests already read still get their responses
/// before this returns.
pub async fn serve<R, W>(
    server: Arc<McpServer>,
    outbound: mpsc::UnboundedReceiver<String>,
    reader: R,
    writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (stop_tx, stop_rx) = oneshot::channel();
    let writer_task = tokio::spawn(write_loop(outbound, writer, stop_rx));
    let mut lines = BufReader::new(reader).lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from MCP client")?
    {
        if line.trim().is_empty() {
            continue;
        }

        let server = Arc::clone(&server);
        in_flight.spawn(async move {
            if let Some(response) = server.handle_line(&line).await {
                if let Err(e) = server.peer().send_response(&response) {
                    tracing::warn!(error = %e, "Failed to queue MCP response");
                }
            }
        });

        // Reap finished handlers
        while let Some(done) = in_flight.try_join_next() {
            if let Err(e) = done {
                tracing::error!(error = %e, "MCP request handler panicked");
            }
        }
    }

    tracing::info!(
        in_flight = in_flight.len(),
        "MCP client closed the connection"
    );
    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            tracing::error!(error = %e, "MCP request handler panicked");
        }
    }

    // Nobody is left to answer our own requests
    let abandoned = server.peer().close_pending();
    if abandoned > 0 {
        tracing::warn!(abandoned, "Dropped requests still waiting on the MCP client");
    }

    // Peer clones held elsewhere keep the channel open, so stop the writer explicitly
    let _ = stop_tx.send(());
    if let Err(e) = writer_task.await {
        tracing::error!(error = %e, "MCP writer task panicked");
    }
    Ok(())
}

/// Write queued lines until the channel closes or `stop` fires, then flush
/// whatever is already queued.
async fn write_loop<W>(
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut writer: W,
    mut stop: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            line = outbound.recv() => {
                let Some(line) = line else { break };
                if let Err(e) = write_line(&mut writer, &line).await {
                    tracing::error!(error = %e, "Failed to write to MCP client");
                    return;
                }
            }
            _ = &mut stop => {
                while let Ok(line) = outbound.try_recv() {
                    if let Err(e) = write_line(&mut writer, &line).await {
                        tracing::error!(error = %e, "Failed to write to MCP client");
                        return;
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(error = %e, "Failed to close MCP output");
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
