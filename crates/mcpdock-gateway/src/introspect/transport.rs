//! Tool-listing wire clients.
//!
//! Two transports exist in the wild for the same JSON-RPC `tools/list`
//! call: a plain request/response POST, and a streaming variant where the
//! response comes back framed as Server-Sent Events. Which one a connection
//! speaks is a property of the connection record.

use mcpdock_core::ToolTransport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    fn tools_list() -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Uuid::new_v4().to_string(),
            method: "tools/list".to_string(),
            params: None,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RpcError {
    pub code: i64,
    pub message: String,
}

/// One tool descriptor as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

/// Client for the tool-listing call, parameterized by transport.
pub struct ToolListingClient {
    http_client: reqwest::Client,
    transport: ToolTransport,
}

impl ToolListingClient {
    pub fn new(http_client: reqwest::Client, transport: ToolTransport) -> Self {
        Self {
            http_client,
            transport,
        }
    }

    /// Issue `tools/list` against `server_url` with a bearer token.
    pub async fn list_tools(
        &self,
        server_url: &str,
        access_token: &str,
    ) -> anyhow::Result<Vec<ToolDescriptor>> {
        let request = RpcRequest::tools_list();
        debug!(
            "Listing tools at {} over {} (request id {})",
            server_url,
            self.transport.as_str(),
            request.id
        );

        let response = match self.transport {
            ToolTransport::Http => self.send_json(server_url, access_token, &request).await?,
            ToolTransport::Sse => self.send_sse(server_url, access_token, &request).await?,
        };

        if let Some(error) = response.error {
            anyhow::bail!(
                "server rejected tools/list: {} (code {})",
                error.message,
                error.code
            );
        }

        let result = response
            .result
            .ok_or_else(|| anyhow::anyhow!("empty response from tools/list"))?;

        let tools_value = result
            .get("tools")
            .ok_or_else(|| anyhow::anyhow!("missing 'tools' field in tools/list response"))?;

        let tools: Vec<ToolDescriptor> = serde_json::from_value(tools_value.clone())
            .map_err(|e| anyhow::anyhow!("invalid tool descriptor format: {}", e))?;

        info!("Retrieved {} tools from {}", tools.len(), server_url);
        Ok(tools)
    }

    /// Plain request/response POST.
    async fn send_json(
        &self,
        server_url: &str,
        access_token: &str,
        request: &RpcRequest,
    ) -> anyhow::Result<RpcResponse> {
        let response = self
            .http_client
            .post(server_url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {} from tool server: {}", status, body);
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("invalid JSON-RPC response: {}", e))?;
        Ok(rpc)
    }

    /// Streaming POST: the response arrives as SSE frames; the JSON-RPC
    /// reply is carried in `data:` lines.
    async fn send_sse(
        &self,
        server_url: &str,
        access_token: &str,
        request: &RpcRequest,
    ) -> anyhow::Result<RpcResponse> {
        let response = self
            .http_client
            .post(server_url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {} from tool server: {}", status, body);
        }

        let body = response.text().await?;

        for data in sse_data_payloads(&body) {
            if let Ok(rpc) = serde_json::from_str::<RpcResponse>(&data) {
                if rpc.result.is_some() || rpc.error.is_some() {
                    return Ok(rpc);
                }
            }
            debug!("Skipping non-response SSE frame ({} bytes)", data.len());
        }

        anyhow::bail!("stream ended without a tools/list response")
    }
}

/// Collect the `data:` payload of each SSE event, joining multi-line data
/// fields per the SSE spec.
fn sse_data_payloads(body: &str) -> Vec<String> {
    let mut payloads = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !current.is_empty() {
                payloads.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
        // event:/id:/retry:/comment lines carry no payload for us
    }

    if !current.is_empty() {
        payloads.push(current.join("\n"));
    }

    payloads
}
