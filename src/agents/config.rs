//! Configuration types for the agent toolkit

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use super::domain::ToolDescriptor;

/// Model used when neither the request nor the settings name one
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Per-request completion parameters. Every field is optional; `None` inherits.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Provider response format, passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Allow the model to request several tool calls per turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_tool_expansion: Option<bool>,
    /// Tools advertised to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<ToolDescriptor>>,
}

/// Settings for the completion service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelClientSettings {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Environment variable containing the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: f64,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    /// Completion parameters applied when a request leaves them unset
    #[serde(default = "default_completion_config")]
    pub default_config: CompletionConfig,
}

impl Default for ModelClientSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: None,
            default_model: default_model(),
            timeout_seconds: default_model_timeout(),
            extra_headers: HashMap::new(),
            default_config: default_completion_config(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_model_timeout() -> f64 {
    30.0
}

fn default_completion_config() -> CompletionConfig {
    CompletionConfig {
        enable_tool_expansion: Some(true),
        ..Default::default()
    }
}

/// Turn budget for the agent loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentLoopConfig {
    pub max_iterations: NonZeroU32,
}

impl AgentLoopConfig {
    pub fn new(max_iterations: NonZeroU32) -> Self {
        Self { max_iterations }
    }
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> NonZeroU32 {
    NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN)
}

/// Reusable prompt definition rendered into the system prompt
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PromptSettings {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Behaviour of an agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSettings {
    /// Identifier reported in responses and logs
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
    /// Plain system prompt, used when no prompt definition is configured
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
    /// Versioned prompt definition; takes precedence over `system_prompt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptSettings>,
    #[serde(default = "default_true")]
    pub enable_tools: bool,
    /// Template for the tool listing; `{tool_descriptions}` marks where it goes
    #[serde(default = "default_tool_prompt_template")]
    pub tool_prompt_template: Option<String>,
    #[serde(default = "default_true")]
    pub include_tool_schemas_in_prompt: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: NonZeroU32,
    /// Completion parameters for this agent, layered over the client defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionConfig>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            system_prompt: default_system_prompt(),
            prompt: None,
            enable_tools: true,
            tool_prompt_template: default_tool_prompt_template(),
            include_tool_schemas_in_prompt: true,
            max_iterations: default_max_iterations(),
            completion: None,
        }
    }
}

impl AgentSettings {
    pub fn loop_config(&self) -> AgentLoopConfig {
        AgentLoopConfig::new(self.max_iterations)
    }
}

fn default_agent_id() -> String {
    "agent".to_string()
}

fn default_system_prompt() -> Option<String> {
    Some("You are a helpful agent built with agent-toolkit.".to_string())
}

fn default_tool_prompt_template() -> Option<String> {
    Some(
        "You can call the following MCP tools when helpful. \
         Return tool calls with arguments that match the provided JSON schema.\n\
         {tool_descriptions}"
            .to_string(),
    )
}

fn default_true() -> bool {
    true
}

/// How the bridge reaches the MCP server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum McpTransport {
    /// Launch `command` and exchange newline-delimited JSON-RPC over its stdio
    Stdio,
    /// Streamable HTTP at `url`, or `http://host:port/mcp`; `tcp` is accepted too
    Http,
}

impl TryFrom<String> for McpTransport {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "stdio" => Ok(McpTransport::Stdio),
            "http" | "tcp" => Ok(McpTransport::Http),
            other => Err(format!(
                "unknown MCP transport '{}', expected stdio or http",
                other
            )),
        }
    }
}

/// Connection settings for the MCP tool server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpBridgeSettings {
    /// Inferred when absent: stdio if `command` is set, HTTP otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<McpTransport>,
    /// Server executable for the stdio transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the launched server
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Working directory for the launched server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Full endpoint URL; built from `host` and `port` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Environment variable containing a bearer token (HTTP only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_tool_cache_seconds")]
    pub tool_cache_seconds: f64,
    #[serde(default = "default_list_timeout")]
    pub list_timeout_seconds: f64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: f64,
}

impl Default for McpBridgeSettings {
    fn default() -> Self {
        Self {
            transport: None,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            url: None,
            host: None,
            port: None,
            api_key_env: None,
            tool_cache_seconds: default_tool_cache_seconds(),
            list_timeout_seconds: default_list_timeout(),
            call_timeout_seconds: default_call_timeout(),
        }
    }
}

impl McpBridgeSettings {
    /// Transport in effect
    pub fn transport(&self) -> McpTransport {
        match self.transport {
            Some(transport) => transport,
            None if self.command().is_some() => McpTransport::Stdio,
            None => McpTransport::Http,
        }
    }

    /// Launch command, ignoring an empty string
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.is_empty())
    }

    /// Endpoint URL, if one can be derived
    pub fn endpoint(&self) -> Option<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        match (self.host.as_deref(), self.port) {
            (Some(host), Some(port)) if !host.is_empty() => {
                Some(format!("http://{}:{}/mcp", host, port))
            }
            _ => None,
        }
    }

    /// Whether the selected transport has what it needs to connect
    pub fn is_configured(&self) -> bool {
        match self.transport() {
            McpTransport::Stdio => self.command().is_some(),
            McpTransport::Http => self.endpoint().is_some(),
        }
    }
}

fn default_tool_cache_seconds() -> f64 {
    30.0
}

fn default_list_timeout() -> f64 {
    10.0
}

fn default_call_timeout() -> f64 {
    60.0
}

impl CompletionConfig {
    /// Field-wise overlay: values set here win, unset ones come from `base`.
    ///
    /// Empty strings and empty tool lists count as unset.
    pub fn layered_over(&self, base: &CompletionConfig) -> CompletionConfig {
        CompletionConfig {
            model: non_empty(&self.model).or_else(|| non_empty(&base.model)),
            temperature: self.temperature.or(base.temperature),
            max_output_tokens: self.max_output_tokens.or(base.max_output_tokens),
            response_format: self
                .response_format
                .clone()
                .or_else(|| base.response_format.clone()),
            tool_choice: non_empty(&self.tool_choice).or_else(|| non_empty(&base.tool_choice)),
            enable_tool_expansion: self.enable_tool_expansion.or(base.enable_tool_expansion),
            available_tools: non_empty_tools(&self.available_tools)
                .or_else(|| non_empty_tools(&base.available_tools)),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn non_empty_tools(value: &Option<Vec<ToolDescriptor>>) -> Option<Vec<ToolDescriptor>> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Merge request-level overrides with the client defaults.
///
/// Each field takes the override, then `settings.default_config`, and for the
/// model finally `settings.default_model`. Empty strings and empty tool lists
/// count as unset. `enable_tool_expansion` ends up `Some(true)` when nobody
/// sets it.
pub fn merge_config(
    settings: &ModelClientSettings,
    override_config: Option<&CompletionConfig>,
) -> CompletionConfig {
    let base = &settings.default_config;
    let mut merged = match override_config {
        Some(over) => over.layered_over(base),
        None => base.layered_over(&CompletionConfig::default()),
    };

    merged.model = Some(
        merged
            .model
            .or_else(|| Some(settings.default_model.clone()).filter(|m| !m.is_empty()))
            .unwrap_or_else(default_model),
    );
    merged.enable_tool_expansion = Some(merged.enable_tool_expansion.unwrap_or(true));
    merged
}
