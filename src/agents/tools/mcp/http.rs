//! Streamable HTTP channel
//!
//! Every message is a POST to one endpoint. Responses come back as plain JSON
//! or as a server-sent event stream; the session id handed out on
//! `initialize` is echoed on every later request.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{JsonRpcRequest, JsonRpcResponse, RpcChannel};
use crate::agents::config::McpBridgeSettings;
use crate::agents::error::{BridgeError, BridgeResult};

const SESSION_HEADER: &str = "Mcp-Session-Id";

pub(super) struct HttpChannel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    session_id: RwLock<Option<String>>,
}

impl HttpChannel {
    pub(super) fn new(settings: &McpBridgeSettings) -> BridgeResult<Self> {
        let endpoint = settings.endpoint().ok_or_else(|| {
            BridgeError::Transport(
                "HTTP transport requires either a URL or host and port".to_string(),
            )
        })?;

        let api_key = settings
            .api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok())
            .filter(|key| !key.is_empty());

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            session_id: RwLock::new(None),
        })
    }

    /// POST one JSON-RPC message and return the raw response
    async fn post(&self, message: &JsonRpcRequest<'_>) -> BridgeResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json, text/event-stream")
            .json(message);

        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Some(session_id) = self.session_id.read().await.as_deref() {
            builder = builder.header(SESSION_HEADER, session_id);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Transport(format!(
                "MCP server returned error {}: {}",
                status, text
            )));
        }

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(session_id.to_string());
        }
        Ok(response)
    }
}

#[async_trait]
impl RpcChannel for HttpChannel {
    async fn request(&self, request: &JsonRpcRequest<'_>) -> BridgeResult<JsonRpcResponse> {
        let response = self.post(request).await?;
        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        if is_event_stream {
            parse_event_stream(&body, request.id)
        } else {
            Ok(serde_json::from_str::<JsonRpcResponse>(&body)?)
        }
    }

    async fn notify(&self, notification: &JsonRpcRequest<'_>) -> BridgeResult<()> {
        self.post(notification).await.map(|_| ())
    }

    fn target(&self) -> &str {
        &self.endpoint
    }
}

/// Pick the JSON-RPC response out of an event-stream body.
///
/// Prefers the message whose id matches `id`; falls back to the last message
/// carrying a result or an error.
fn parse_event_stream(body: &str, id: Option<u64>) -> BridgeResult<JsonRpcResponse> {
    let mut fallback = None;

    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        let Ok(message) = serde_json::from_str::<JsonRpcResponse>(data) else {
            continue;
        };
        if message.result.is_none() && message.error.is_none() {
            continue;
        }
        if id.is_some() && message.id.as_ref().and_then(Value::as_u64) == id {
            return Ok(message);
        }
        fallback = Some(message);
    }

    fallback.ok_or_else(|| BridgeError::Protocol("No JSON-RPC response in event stream".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_event_stream_matches_id() {
        let body = "event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"tools\":[]}}\n\n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":8,\"result\":{\"other\":true}}\n\n";
        let response = parse_event_stream(body, Some(7)).unwrap();
        assert_eq!(response.result, Some(json!({"tools": []})));
    }

    #[test]
    fn test_parse_event_stream_without_response() {
        let err = parse_event_stream("event: ping\n\n", Some(1)).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }
}
