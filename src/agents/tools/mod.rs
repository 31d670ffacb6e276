//! Tool bridge
//!
//! The agent loop reaches external tools only through [`ToolBridge`].
//! [`McpBridge`] is the shipped adapter for MCP servers, reached over HTTP
//! or by launching them and talking over stdio.

mod mcp;

pub use mcp::McpBridge;

use async_trait::async_trait;
use futures::future::join_all;

use crate::agents::domain::{ToolCallRecord, ToolDescriptor, ToolExecutionResult, ToolInvocation};
use crate::agents::error::{BridgeError, BridgeResult};

pub use crate::agents::domain::format_tool_result;

/// Placeholder marking where tool descriptions go in a tool prompt template
pub const TOOL_DESCRIPTIONS_PLACEHOLDER: &str = "{tool_descriptions}";

/// Access to a registry of callable tools
#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// List the tools currently offered
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>>;

    /// Invoke a single tool
    async fn call_tool(&self, invocation: &ToolInvocation) -> BridgeResult<ToolExecutionResult>;

    /// Describe the available tools for the system prompt.
    ///
    /// Returns the prompt and the registry it was built from. Disabled tools,
    /// a missing template, or a failed listing all yield `(None, [])`.
    async fn resolve_tool_prompt(
        &self,
        agent_id: &str,
        enable_tools: bool,
        template: Option<&str>,
        include_schemas: bool,
    ) -> (Option<String>, Vec<ToolDescriptor>) {
        let template = match template.filter(|t| !t.is_empty()) {
            Some(template) if enable_tools => template,
            _ => return (None, Vec::new()),
        };

        match self.list_tools().await {
            Ok(tools) => (build_tool_prompt(&tools, Some(template), include_schemas), tools),
            Err(e) => {
                tracing::warn!(agent_id = agent_id, error = %e, "agent_tool_prompt_list_failed");
                (None, Vec::new())
            }
        }
    }

    /// Run a batch of invocations, keeping submission order in the result.
    ///
    /// A tool-level RPC error becomes an error result the model can see.
    /// Transport, protocol and timeout failures fail the whole batch.
    async fn execute_tool_calls(
        &self,
        invocations: Vec<ToolInvocation>,
        session_id: Option<&str>,
    ) -> BridgeResult<Vec<ToolCallRecord>> {
        let invocations: Vec<ToolInvocation> = invocations
            .into_iter()
            .map(|mut invocation| {
                if invocation.session_id.is_none() {
                    invocation.session_id = session_id.map(str::to_string);
                }
                invocation
            })
            .collect();

        let results = join_all(invocations.iter().map(|inv| self.call_tool(inv))).await;

        let mut records = Vec::with_capacity(invocations.len());
        for (invocation, result) in invocations.iter().zip(results) {
            let response = match result {
                Ok(response) => response,
                Err(BridgeError::Rpc { code, message }) => {
                    tracing::debug!(
                        tool = %invocation.tool_name,
                        code = code,
                        "Tool call returned an RPC error"
                    );
                    ToolExecutionResult::failure(invocation.tool_name.clone(), message)
                }
                Err(e) => return Err(e),
            };
            records.push(ToolCallRecord::new(invocation, response));
        }
        Ok(records)
    }
}

/// Bridge offering no tools, for agents running without a tool server
#[derive(Debug, Default, Clone, Copy)]
pub struct NoToolBridge;

#[async_trait]
impl ToolBridge for NoToolBridge {
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        Ok(Vec::new())
    }

    async fn call_tool(&self, invocation: &ToolInvocation) -> BridgeResult<ToolExecutionResult> {
        Err(BridgeError::Rpc {
            code: -32601,
            message: format!("Tool '{}' is not available", invocation.tool_name),
        })
    }
}

/// Render tools as a bullet list, optionally with their input schemas
pub fn format_tool_descriptions(tools: &[ToolDescriptor], include_schemas: bool) -> String {
    let mut lines: Vec<String> = Vec::new();
    for tool in tools {
        let description = tool
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("No description provided.")
            .trim();
        lines.push(format!("- {}: {}", tool.name, description));

        let schema = tool
            .input_schema
            .as_ref()
            .filter(|s| !s.is_null() && s.as_object().map_or(true, |o| !o.is_empty()));
        if let (true, Some(schema)) = (include_schemas, schema) {
            // serde_json::Value objects keep keys sorted
            let pretty = serde_json::to_string_pretty(schema).unwrap_or_default();
            lines.push("  JSON schema:".to_string());
            lines.extend(pretty.lines().map(|line| format!("    {}", line)));
        }
    }
    lines.join("\n").trim().to_string()
}

/// Compose the tool section of the system prompt.
///
/// The descriptions replace `{tool_descriptions}` in the template, or are
/// appended on a new line when the template lacks it.
pub fn build_tool_prompt(
    tools: &[ToolDescriptor],
    template: Option<&str>,
    include_schemas: bool,
) -> Option<String> {
    let template = template.filter(|t| !t.is_empty())?;
    if tools.is_empty() {
        return None;
    }

    let descriptions = format_tool_descriptions(tools, include_schemas);
    if descriptions.is_empty() {
        return None;
    }

    let prompt = if template.contains(TOOL_DESCRIPTIONS_PLACEHOLDER) {
        template.replace(TOOL_DESCRIPTIONS_PLACEHOLDER, &descriptions)
    } else {
        format!("{}\n{}", template, descriptions)
    };
    Some(prompt.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    struct StubBridge {
        tools: BridgeResult<Vec<ToolDescriptor>>,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl StubBridge {
        fn new(tools: Vec<ToolDescriptor>) -> Self {
            Self {
                tools: Ok(tools),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                tools: Err(BridgeError::Transport("connection refused".to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolBridge for StubBridge {
        async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
            match &self.tools {
                Ok(tools) => Ok(tools.clone()),
                Err(_) => Err(BridgeError::Transport("connection refused".to_string())),
            }
        }

        async fn call_tool(&self, invocation: &ToolInvocation) -> BridgeResult<ToolExecutionResult> {
            self.calls.lock().unwrap().push(invocation.clone());
            match invocation.tool_name.as_str() {
                "missing" => Err(BridgeError::Rpc {
                    code: -32602,
                    message: "Tool 'missing' is not available".to_string(),
                }),
                "slow" => Err(BridgeError::Timeout(60)),
                name => Ok(ToolExecutionResult::success(
                    name,
                    vec![json!({"type": "text", "text": "ok"})],
                )),
            }
        }
    }

    fn invocation(name: &str, call_id: &str) -> ToolInvocation {
        ToolInvocation {
            tool_name: name.to_string(),
            payload: Map::new(),
            call_id: call_id.to_string(),
            session_id: None,
        }
    }

    fn sum_tool() -> ToolDescriptor {
        ToolDescriptor::new(
            "sum-two-numbers",
            json!({"type": "object", "properties": {"b": {"type": "integer"}, "a": {"type": "integer"}}}),
        )
        .with_description("Add two numbers")
    }

    #[test]
    fn test_format_tool_descriptions_with_schema() {
        let text = format_tool_descriptions(&[sum_tool()], true);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "- sum-two-numbers: Add two numbers");
        assert_eq!(lines[1], "  JSON schema:");
        assert_eq!(lines[2], "    {");
        assert_eq!(lines[3], "      \"properties\": {");
        assert_eq!(lines[4], "        \"a\": {");
        assert!(text.ends_with("    }"));
    }

    #[test]
    fn test_format_tool_descriptions_defaults() {
        let tool = ToolDescriptor {
            name: "ping".to_string(),
            description: None,
            input_schema: None,
            metadata: Map::new(),
        };
        assert_eq!(
            format_tool_descriptions(&[tool], true),
            "- ping: No description provided."
        );
    }

    #[test]
    fn test_build_tool_prompt_substitutes_or_appends() {
        let tools = vec![sum_tool()];

        let prompt = build_tool_prompt(&tools, Some("Tools:\n{tool_descriptions}\nEnd."), false);
        assert_eq!(prompt.as_deref(), Some("Tools:\n- sum-two-numbers: Add two numbers\nEnd."));

        let prompt = build_tool_prompt(&tools, Some("Use these tools."), false);
        assert_eq!(prompt.as_deref(), Some("Use these tools.\n- sum-two-numbers: Add two numbers"));

        assert!(build_tool_prompt(&[], Some("x"), false).is_none());
        assert!(build_tool_prompt(&tools, None, false).is_none());
    }

    #[tokio::test]
    async fn test_resolve_tool_prompt_returns_registry() {
        let bridge = StubBridge::new(vec![sum_tool()]);
        let (prompt, tools) = bridge
            .resolve_tool_prompt("agent", true, Some("{tool_descriptions}"), false)
            .await;
        assert_eq!(prompt.as_deref(), Some("- sum-two-numbers: Add two numbers"));
        assert_eq!(tools.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_tool_prompt_disabled_or_failing() {
        let bridge = StubBridge::new(vec![sum_tool()]);
        let (prompt, tools) = bridge.resolve_tool_prompt("agent", false, Some("x"), true).await;
        assert!(prompt.is_none() && tools.is_empty());

        let (prompt, tools) = bridge.resolve_tool_prompt("agent", true, None, true).await;
        assert!(prompt.is_none() && tools.is_empty());

        let bridge = StubBridge::failing();
        let (prompt, tools) = bridge.resolve_tool_prompt("agent", true, Some("x"), true).await;
        assert!(prompt.is_none() && tools.is_empty());
    }

    #[tokio::test]
    async fn test_execute_tool_calls_keeps_order_and_surfaces_rpc_errors() {
        let bridge = StubBridge::new(vec![]);
        let records = bridge
            .execute_tool_calls(
                vec![
                    invocation("first", "c1"),
                    invocation("missing", "c2"),
                    invocation("third", "c3"),
                ],
                Some("session-9"),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.request.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(!records[0].response.is_error);
        assert!(records[1].response.is_error);
        assert_eq!(
            records[1].response.error_message.as_deref(),
            Some("Tool 'missing' is not available")
        );

        let calls = bridge.calls.lock().unwrap();
        assert!(calls.iter().all(|c| c.session_id.as_deref() == Some("session-9")));
    }

    #[tokio::test]
    async fn test_execute_tool_calls_fails_batch_on_timeout() {
        let bridge = StubBridge::new(vec![]);
        let err = bridge
            .execute_tool_calls(vec![invocation("first", "c1"), invocation("slow", "c2")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(60)));
    }
}
