// ABOUTME: MCP (Model Context Protocol) JSON-RPC handling for the Discord server
// ABOUTME: Answers client requests and issues sampling requests back to the client

use anyhow::{Context, Result};
use async_trait::async_trait;
use discord_mcp_core::traits::{SamplingPeer, SamplingRequest, SamplingResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::tools::DiscordTools;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "discord-mcp";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;

// =============================================================================
// Wire types
// =============================================================================

/// JSON-RPC request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Tool definition for MCP
#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

// =============================================================================
// Peer: outbound requests to the MCP client
// =============================================================================

type PendingReply = oneshot::Sender<std::result::Result<Value, JsonRpcError>>;

struct PeerInner {
    outbound: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<u64, PendingReply>>,
    next_id: AtomicU64,
    client_sampling: AtomicBool,
}

/// Writes messages to the MCP client and correlates the client's responses
/// to requests we sent.
#[derive(Clone)]
pub struct McpPeer {
    inner: Arc<PeerInner>,
}

/// Removes a pending entry however the waiting request ends
struct PendingGuard<'a> {
    inner: &'a PeerInner,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

impl McpPeer {
    /// `outbound` receives one serialized JSON message per line to write
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                outbound,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                client_sampling: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_client_sampling(&self, supported: bool) {
        self.inner.client_sampling.store(supported, Ordering::SeqCst);
    }

    pub fn client_supports_sampling(&self) -> bool {
        self.inner.client_sampling.load(Ordering::SeqCst)
    }

    /// Requests still waiting for the client
    pub fn pending_count(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Fail every request still waiting on the client, returning how many
    /// there were. Waiters see the connection as closed.
    pub fn close_pending(&self) -> usize {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let count = pending.len();
        pending.clear();
        count
    }

    fn write<T: Serialize>(&self, message: &T) -> Result<()> {
        let line = serde_json::to_string(message).context("Failed to serialize MCP message")?;
        self.inner
            .outbound
            .send(line)
            .map_err(|_| anyhow::anyhow!("MCP output closed"))
    }

    pub fn send_response(&self, response: &JsonRpcResponse) -> Result<()> {
        self.write(response)
    }

    /// Send a request to the client and wait for its response
    pub async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        let _guard = PendingGuard {
            inner: &self.inner,
            id,
        };

        self.write(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))?;
        tracing::debug!(id, method, "Sent request to MCP client");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => anyhow::bail!(
                "MCP client returned error {} for {}: {}",
                error.code,
                method,
                error.message
            ),
            Ok(Err(_)) => anyhow::bail!("MCP connection closed while waiting for {}", method),
            Err(_) => anyhow::bail!(
                "MCP client did not answer {} within {}ms",
                method,
                timeout.as_millis()
            ),
        }
    }

    /// Route a response from the client to the request waiting for it.
    /// Returns false when no request is waiting on that id.
    pub fn complete(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.id.as_ref().and_then(Value::as_u64) else {
            tracing::warn!(id = ?response.id, "Ignoring MCP response without a numeric id");
            return false;
        };
        let waiter = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        let Some(waiter) = waiter else {
            tracing::warn!(id, "Ignoring MCP response for unknown request");
            return false;
        };

        let outcome = match (response.result, response.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        // The requester may have given up already
        let _ = waiter.send(outcome);
        true
    }
}

#[async_trait]
impl SamplingPeer for McpPeer {
    async fn create_message(&self, request: SamplingRequest) -> Result<SamplingResponse> {
        if !self.client_supports_sampling() {
            anyhow::bail!("MCP client did not declare sampling support");
        }
        let params = serde_json::to_value(&request).context("Failed to encode sampling request")?;
        let result = self
            .request("sampling/createMessage", params, request.timeout)
            .await?;
        serde_json::from_value(result).context("Malformed sampling response")
    }
}

// =============================================================================
// Server: inbound messages from the MCP client
// =============================================================================

pub struct McpServer {
    peer: McpPeer,
    tools: DiscordTools,
    sampling_enabled: bool,
}

impl McpServer {
    pub fn new(peer: McpPeer, tools: DiscordTools, sampling_enabled: bool) -> Self {
        Self {
            peer,
            tools,
            sampling_enabled,
        }
    }

    pub fn peer(&self) -> &McpPeer {
        &self.peer
    }

    /// Handle one line from the client. Returns the response to write, if any.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed JSON from MCP client");
                return Some(JsonRpcResponse::failure(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        // Responses to our own requests carry no method
        if value.get("method").is_none() {
            return match serde_json::from_value::<JsonRpcResponse>(value) {
                Ok(response) => {
                    self.peer.complete(response);
                    None
                }
                Err(e) => Some(JsonRpcResponse::failure(
                    None,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                )),
            };
        }

        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                None,
                INVALID_REQUEST,
                format!("Invalid request: {}", e),
            )),
        }
    }

    /// Handle MCP JSON-RPC requests
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!(method = %request.method, "MCP request received");

        // Notifications never get a response
        if request.id.is_none() {
            if request.method == "notifications/initialized" {
                tracing::info!("MCP client initialized");
            } else {
                tracing::debug!(method = %request.method, "Ignoring MCP notification");
            }
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request),
            "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
            "tools/list" => self.handle_tools_list(&request),
            "tools/call" => self.handle_tools_call(&request).await,
            _ => JsonRpcResponse::failure(
                request.id.clone(),
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };
        Some(response)
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let client_sampling = request
            .params
            .get("capabilities")
            .and_then(|c| c.get("sampling"))
            .is_some();
        self.peer.set_client_sampling(client_sampling);

        let client_name = request
            .params
            .get("clientInfo")
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(client = %client_name, client_sampling, "MCP initialize request received");
        if self.sampling_enabled && !client_sampling {
            tracing::warn!("Sampling is enabled but the MCP client does not support it");
        }

        let mut capabilities = json!({ "tools": {} });
        if self.sampling_enabled {
            capabilities["sampling"] = json!({});
        }

        JsonRpcResponse::success(
            request.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(
            request.id.clone(),
            json!({ "tools": DiscordTools::definitions() }),
        )
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let params = &request.params;
        let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        tracing::info!(tool = %tool_name, "MCP tool call");

        let result = self.tools.call(tool_name, arguments).await;
        discord_mcp_core::metrics::record_tool_call(tool_name, result.is_ok());

        match result {
            Ok(content) => JsonRpcResponse::success(
                request.id.clone(),
                json!({
                    "content": [{ "type": "text", "text": content }]
                }),
            ),
            Err(error) => {
                tracing::warn!(tool = %tool_name, error = %error, "MCP tool call failed");
                JsonRpcResponse::success(
                    request.id.clone(),
                    json!({
                        "content": [{ "type": "text", "text": error }],
                        "isError": true
                    }),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discord_mcp_core::testing::MockChatClient;

    fn server(sampling_enabled: bool) -> (McpServer, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tools = DiscordTools::new(Arc::new(MockChatClient::new("bot")));
        (McpServer::new(McpPeer::new(tx), tools, sampling_enabled), rx)
    }

    #[tokio::test]
    async fn test_initialize_advertises_sampling_when_enabled() {
        let (server, _rx) = server(true);
        let response = server
            .handle_line(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":{"sampling":{}},"clientInfo":{"name":"test"}}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["sampling"].is_object());
        assert!(server.peer().client_supports_sampling());
    }

    #[tokio::test]
    async fn test_initialize_without_sampling() {
        let (server, _rx) = server(false);
        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert!(result["capabilities"].get("sampling").is_none());
        assert!(!server.peer().client_supports_sampling());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let (server, _rx) = server(false);
        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (server, _rx) = server(false);
        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#)
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert_eq!(response.id, Some(json!("a")));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let (server, _rx) = server(false);
        let response = server.handle_line("{not json").await.unwrap();
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
        assert!(response.id.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let (server, _rx) = server(false);
        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_peer_request_round_trip() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = McpPeer::new(tx);

        let waiting = {
            let peer = peer.clone();
            tokio::spawn(async move {
                peer.request("sampling/createMessage", json!({}), Duration::from_secs(5))
                    .await
            })
        };

        let sent: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(sent["method"], "sampling/createMessage");
        let id = sent["id"].clone();

        assert!(peer.complete(JsonRpcResponse::success(Some(id), json!({"ok": true}))));
        let result = waiting.await.unwrap().unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert_eq!(peer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_peer_error_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = McpPeer::new(tx);

        let waiting = {
            let peer = peer.clone();
            tokio::spawn(async move { peer.request("x", json!({}), Duration::from_secs(5)).await })
        };

        let sent: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        peer.complete(JsonRpcResponse::failure(
            Some(sent["id"].clone()),
            -1,
            "User rejected sampling request",
        ));

        let err = waiting.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("User rejected sampling request"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_timeout_clears_pending() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = McpPeer::new(tx);

        let err = peer
            .request("sampling/createMessage", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not answer"));
        assert_eq!(peer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_pending_wakes_waiters() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = McpPeer::new(tx);

        let waiting = {
            let peer = peer.clone();
            tokio::spawn(async move {
                peer.request("sampling/createMessage", json!({}), Duration::from_secs(60))
                    .await
            })
        };
        rx.recv().await.unwrap();

        assert_eq!(peer.close_pending(), 1);
        let err = waiting.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection closed"));
        assert_eq!(peer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_response_id_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = McpPeer::new(tx);
        assert!(!peer.complete(JsonRpcResponse::success(Some(json!(99)), json!({}))));
    }

    #[tokio::test]
    async fn test_sampling_requires_client_support() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = McpPeer::new(tx);

        let err = peer
            .create_message(SamplingRequest::user_text("hi", 10, Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sampling support"));
    }
}
