//! MCP tool bridge
//!
//! Speaks JSON-RPC 2.0 to an MCP server: `initialize` and
//! `notifications/initialized` once, then `tools/list` and `tools/call`.
//! The server is reached either over streamable HTTP or by launching it as a
//! child process and exchanging newline-delimited messages on its stdio.

mod http;
mod stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

use self::http::HttpChannel;
use self::stdio::StdioChannel;
use super::ToolBridge;
use crate::agents::config::{McpBridgeSettings, McpTransport};
use crate::agents::domain::{ToolDescriptor, ToolExecutionResult, ToolExecutionStatus, ToolInvocation};
use crate::agents::error::{BridgeError, BridgeResult};

const PROTOCOL_VERSION: &str = "2025-03-26";
const INVALID_PARAMS: i64 = -32602;

/// MCP JSON-RPC request; a notification when `id` is `None`
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    fn new(id: Option<u64>, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// MCP JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Tool information from an MCP server
#[derive(Debug, Deserialize)]
struct McpTool {
    name: String,
    description: Option<String>,
    #[serde(rename = "inputSchema")]
    input_schema: Option<Value>,
    #[serde(rename = "_meta")]
    meta: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
}

/// One way of moving JSON-RPC messages to and from a server
#[async_trait]
trait RpcChannel: Send + Sync {
    /// Send a request and wait for the response carrying its id
    async fn request(&self, request: &JsonRpcRequest<'_>) -> BridgeResult<JsonRpcResponse>;

    /// Send a notification; nothing comes back
    async fn notify(&self, notification: &JsonRpcRequest<'_>) -> BridgeResult<()>;

    /// Human-readable server location for logs
    fn target(&self) -> &str;
}

struct ToolCache {
    fetched_at: Instant,
    tools: Vec<ToolDescriptor>,
}

/// Tool bridge backed by an MCP server
pub struct McpBridge {
    channel: Box<dyn RpcChannel>,
    request_id: AtomicU64,
    initialized: OnceCell<()>,
    list_timeout: Duration,
    call_timeout: Duration,
    cache_ttl: Duration,
    tools_cache: RwLock<Option<ToolCache>>,
}

impl McpBridge {
    /// Create a bridge from settings. Nothing is sent, and no process is
    /// launched, until first use.
    pub fn new(settings: McpBridgeSettings) -> BridgeResult<Self> {
        let list_timeout = timeout_setting("list_timeout_seconds", settings.list_timeout_seconds)?;
        let call_timeout = timeout_setting("call_timeout_seconds", settings.call_timeout_seconds)?;
        let cache_ttl = cache_setting(settings.tool_cache_seconds)?;

        let channel: Box<dyn RpcChannel> = match settings.transport() {
            McpTransport::Http => Box::new(HttpChannel::new(&settings)?),
            McpTransport::Stdio => Box::new(StdioChannel::new(&settings)?),
        };

        Ok(Self {
            channel,
            request_id: AtomicU64::new(0),
            initialized: OnceCell::new(),
            list_timeout,
            call_timeout,
            cache_ttl,
            tools_cache: RwLock::new(None),
        })
    }

    /// Endpoint URL or launch command of the server
    pub fn target(&self) -> &str {
        self.channel.target()
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> BridgeResult<Value> {
        let request = JsonRpcRequest::new(Some(self.next_id()), method, params);
        let response = self.channel.request(&request).await?;

        if let Some(error) = response.error {
            return Err(BridgeError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| BridgeError::Protocol(format!("No result in MCP response to {}", method)))
    }

    /// Run the handshake once; concurrent callers wait for the first one
    async fn ensure_initialized(&self) -> BridgeResult<()> {
        self.initialized
            .get_or_try_init(|| self.initialize())
            .await
            .map(|_| ())
    }

    async fn initialize(&self) -> BridgeResult<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result = with_timeout(self.list_timeout, self.send_request("initialize", Some(params)))
            .await?;

        let server_name = result
            .get("serverInfo")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!("Connected to MCP server '{}' at {}", server_name, self.target());

        let initialized = JsonRpcRequest::new(None, "notifications/initialized", None);
        with_timeout(self.list_timeout, self.channel.notify(&initialized)).await
    }

    async fn fetch_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        self.ensure_initialized().await?;
        let mut descriptors = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = with_timeout(self.list_timeout, self.send_request("tools/list", params))
                .await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            descriptors.extend(page.tools.into_iter().map(descriptor_from_mcp));

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!("Listed {} tools from {}", descriptors.len(), self.target());
        Ok(descriptors)
    }
}

#[async_trait]
impl ToolBridge for McpBridge {
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        if let Some(cache) = self.tools_cache.read().await.as_ref() {
            if cache.fetched_at.elapsed() < self.cache_ttl {
                return Ok(cache.tools.clone());
            }
        }

        let tools = self.fetch_tools().await?;
        *self.tools_cache.write().await = Some(ToolCache {
            fetched_at: Instant::now(),
            tools: tools.clone(),
        });
        Ok(tools)
    }

    async fn call_tool(&self, invocation: &ToolInvocation) -> BridgeResult<ToolExecutionResult> {
        let tools = self.list_tools().await?;
        if !tools.iter().any(|tool| tool.name == invocation.tool_name) {
            return Err(BridgeError::Rpc {
                code: INVALID_PARAMS,
                message: format!("Tool '{}' is not available", invocation.tool_name),
            });
        }

        self.ensure_initialized().await?;
        let params = json!({
            "name": invocation.tool_name,
            "arguments": invocation.payload,
        });

        debug!("Calling MCP tool '{}' ({})", invocation.tool_name, invocation.call_id);
        let result = with_timeout(self.call_timeout, self.send_request("tools/call", Some(params)))
            .await?;

        Ok(tool_result_from_mcp(&invocation.tool_name, result))
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> BridgeResult<T>
where
    F: Future<Output = BridgeResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout(limit.as_secs_f64().ceil() as u64)),
    }
}

/// Positive, finite timeout
fn timeout_setting(field: &str, seconds: f64) -> BridgeResult<Duration> {
    if seconds.is_nan() || seconds <= 0.0 {
        return Err(BridgeError::Protocol(format!(
            "{} must be positive, got {}",
            field, seconds
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| BridgeError::Protocol(format!("{} is out of range: {}", field, e)))
}

/// Non-negative, finite cache lifetime; zero disables caching
fn cache_setting(seconds: f64) -> BridgeResult<Duration> {
    if seconds.is_nan() || seconds < 0.0 {
        return Err(BridgeError::Protocol(format!(
            "tool_cache_seconds must not be negative, got {}",
            seconds
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| BridgeError::Protocol(format!("tool_cache_seconds is out of range: {}", e)))
}

fn descriptor_from_mcp(tool: McpTool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name,
        description: tool.description,
        input_schema: tool.input_schema,
        metadata: tool.meta.unwrap_or_default(),
    }
}

/// Map a `tools/call` result onto a tool execution result
fn tool_result_from_mcp(tool_name: &str, result: Value) -> ToolExecutionResult {
    let content: Vec<Value> = result
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let structured_content = result
        .get("structuredContent")
        .filter(|v| !v.is_null())
        .cloned();
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let error_message = if is_error {
        content.iter().find_map(|item| {
            if item.get("type").and_then(Value::as_str) == Some("text") {
                item.get("text").and_then(Value::as_str).map(str::to_string)
            } else {
                None
            }
        })
    } else {
        None
    };

    ToolExecutionResult {
        tool_name: tool_name.to_string(),
        status: if is_error {
            ToolExecutionStatus::Error
        } else {
            ToolExecutionStatus::Success
        },
        content,
        structured_content,
        error_message,
        raw_result: Some(result),
        is_error,
    }
}
