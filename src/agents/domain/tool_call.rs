//! Tool call types for agent interactions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Arguments as emitted by the model: either raw text or already-parsed JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArguments {
    Text(String),
    Structured(Value),
}

impl From<&str> for RawArguments {
    fn from(text: &str) -> Self {
        RawArguments::Text(text.to_string())
    }
}

impl From<String> for RawArguments {
    fn from(text: String) -> Self {
        RawArguments::Text(text)
    }
}

impl From<Value> for RawArguments {
    fn from(value: Value) -> Self {
        RawArguments::Structured(value)
    }
}

/// An untrusted tool call as emitted by the completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallCandidate {
    /// Provider-issued identifier for this call
    pub call_id: String,
    /// Tool name exactly as the model wrote it
    pub raw_tool_name: String,
    /// Arguments exactly as the model wrote them
    pub raw_arguments: RawArguments,
}

impl ToolCallCandidate {
    pub fn new(
        call_id: impl Into<String>,
        raw_tool_name: impl Into<String>,
        raw_arguments: impl Into<RawArguments>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            raw_tool_name: raw_tool_name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    /// Generate an identifier for a call the provider left unnamed
    pub fn generate_id() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("call_{}", &hex[hex.len() - 10..])
    }

    /// Raw arguments rendered as the text a provider expects back
    pub fn arguments_text(&self) -> String {
        match &self.raw_arguments {
            RawArguments::Text(text) => text.clone(),
            RawArguments::Structured(value) => value.to_string(),
        }
    }
}

/// A tool call after name and argument repair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedToolCall {
    pub call_id: String,
    /// Best-effort tool name; not guaranteed to be a registry member
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// Registry entry describing a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Canonical (lower-kebab) tool identifier
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: Some(input_schema),
            metadata: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Property names declared by the input schema.
    ///
    /// `None` when the schema has no `properties` object.
    pub fn declared_keys(&self) -> Option<BTreeSet<&str>> {
        self.input_schema
            .as_ref()?
            .get("properties")?
            .as_object()
            .map(|props| props.keys().map(String::as_str).collect())
    }
}

/// Payload sent to the tool bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ToolInvocation {
    pub fn from_resolved(call: ResolvedToolCall, session_id: Option<String>) -> Self {
        Self {
            tool_name: call.tool_name,
            payload: call.arguments,
            call_id: call.call_id,
            session_id,
        }
    }
}

/// Outcome of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolExecutionStatus {
    Success,
    Error,
}

/// Result of executing a tool through the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool_name: String,
    pub status: ToolExecutionStatus,
    /// Content items returned by the tool
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unmodified result document from the tool server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_result: Option<Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolExecutionResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, content: Vec<Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ToolExecutionStatus::Success,
            content,
            structured_content: None,
            error_message: None,
            raw_result: None,
            is_error: false,
        }
    }

    /// Create a failed result carrying an error message as text content
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            tool_name: tool_name.into(),
            status: ToolExecutionStatus::Error,
            content: vec![serde_json::json!({ "type": "text", "text": error })],
            structured_content: None,
            error_message: Some(error),
            raw_result: None,
            is_error: true,
        }
    }

    pub fn with_structured_content(mut self, value: Value) -> Self {
        self.structured_content = Some(value);
        self
    }

    pub fn with_raw_result(mut self, value: Value) -> Self {
        self.raw_result = Some(value);
        self
    }
}

/// Request side of a logged tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequestLog {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// A tool call request paired with its response, kept for auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub request: ToolCallRequestLog,
    pub response: ToolExecutionResult,
}

impl ToolCallRecord {
    pub fn new(invocation: &ToolInvocation, response: ToolExecutionResult) -> Self {
        Self {
            request: ToolCallRequestLog {
                tool_call_id: invocation.call_id.clone(),
                tool_name: invocation.tool_name.clone(),
                arguments: invocation.payload.clone(),
            },
            response,
        }
    }
}

/// Render a tool result as message content.
///
/// Precedence: `raw_result`, then `structured_content`, then `content`.
pub fn format_tool_result(result: &ToolExecutionResult) -> String {
    let rendered = if let Some(raw) = &result.raw_result {
        serde_json::to_string_pretty(raw)
    } else if let Some(structured) = &result.structured_content {
        serde_json::to_string_pretty(structured)
    } else {
        serde_json::to_string_pretty(&result.content)
    };
    rendered.unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_arguments_untagged() {
        let text: RawArguments = serde_json::from_value(json!("{\"a\": 1}")).unwrap();
        assert_eq!(text, RawArguments::Text("{\"a\": 1}".to_string()));

        let structured: RawArguments = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(structured, RawArguments::Structured(json!({"a": 1})));
    }

    #[test]
    fn test_generate_id_shape() {
        let id = ToolCallCandidate::generate_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), "call_".len() + 10);
    }

    #[test]
    fn test_declared_keys() {
        let tool = ToolDescriptor::new(
            "sum-two-numbers",
            json!({"type": "object", "properties": {"a": {}, "b": {}}}),
        );
        let keys = tool.declared_keys().unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

        let bare = ToolDescriptor::new("bare", json!({"type": "object"}));
        assert!(bare.declared_keys().is_none());
    }

    #[test]
    fn test_format_prefers_raw_result() {
        let result = ToolExecutionResult::success("demo", vec![json!({"type": "text", "text": "fallback"})])
            .with_structured_content(json!({"foo": "bar"}))
            .with_raw_result(json!({"raw": true}));
        assert_eq!(format_tool_result(&result), serde_json::to_string_pretty(&json!({"raw": true})).unwrap());
    }

    #[test]
    fn test_format_prefers_structured_content_over_content() {
        let result = ToolExecutionResult::success("demo", vec![json!({"type": "text", "text": "fallback"})])
            .with_structured_content(json!({"foo": "bar"}));
        assert_eq!(format_tool_result(&result), "{\n  \"foo\": \"bar\"\n}");
    }

    #[test]
    fn test_format_falls_back_to_content() {
        let content = vec![json!({"type": "text", "text": "value"})];
        let result = ToolExecutionResult::success("demo", content.clone());
        assert_eq!(format_tool_result(&result), serde_json::to_string_pretty(&content).unwrap());
    }

    #[test]
    fn test_failure_marks_error() {
        let result = ToolExecutionResult::failure("demo", "boom");
        assert!(result.is_error);
        assert_eq!(result.status, ToolExecutionStatus::Error);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
    }
}
