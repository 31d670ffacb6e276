//! Agent runner: wires settings, the completion service and the tool bridge
//! around the agent loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::config::{AgentSettings, CompletionConfig};
use crate::agents::core::{AgentLoop, AgentLoopRequest, LoopObserver};
use crate::agents::domain::{build_conversation, AgentResponse, Conversation, Role};
use crate::agents::error::{AgentResult, ConfigError};
use crate::agents::llm::{CompletionService, OpenAiCompletionService};
use crate::agents::prompt::{create_agent_config, AgentConfig};
use crate::agents::tools::{McpBridge, NoToolBridge, ToolBridge};
use crate::config::Settings;

/// Incoming agent instruction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Overrides the configured agent id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub user_message: String,
    /// Conversation to continue; a new one is started when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,
    /// Session id for a new conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Completion overrides for this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionConfig>,
}

impl AgentRequest {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }
}

/// Runs agent requests end to end
pub struct AgentRunner {
    settings: AgentSettings,
    agent_config: Option<AgentConfig>,
    agent_loop: AgentLoop,
    bridge: Arc<dyn ToolBridge>,
}

impl AgentRunner {
    /// Create a runner. Renders the configured prompt definition up front so
    /// template problems surface before any request is served.
    pub fn new(
        settings: AgentSettings,
        completion: Arc<dyn CompletionService>,
        bridge: Arc<dyn ToolBridge>,
    ) -> AgentResult<Self> {
        let agent_config = match &settings.prompt {
            Some(prompt) => Some(create_agent_config(
                prompt.name.clone(),
                prompt.template.clone(),
                prompt.variables.clone(),
            )?),
            None => None,
        };

        if let Some(config) = &agent_config {
            tracing::info!("Loaded prompt configuration {}", config.qualified_name());
        }

        Ok(Self {
            agent_loop: AgentLoop::new(completion, bridge.clone()),
            settings,
            agent_config,
            bridge,
        })
    }

    /// Create a runner with the OpenAI-compatible service and, when tools are
    /// enabled and a server is configured, the MCP bridge.
    pub fn from_settings(settings: &Settings) -> AgentResult<Self> {
        let completion: Arc<dyn CompletionService> =
            Arc::new(OpenAiCompletionService::new(settings.model_client.clone())?);

        let bridge: Arc<dyn ToolBridge> = if !settings.agent.enable_tools {
            Arc::new(NoToolBridge)
        } else if settings.mcp_bridge.is_configured() || settings.mcp_bridge.transport.is_some() {
            let bridge = McpBridge::new(settings.mcp_bridge.clone())?;
            tracing::info!("Using MCP tool server {}", bridge.target());
            Arc::new(bridge)
        } else {
            tracing::warn!("Tools are enabled but no MCP server is configured");
            Arc::new(NoToolBridge)
        };

        Self::new(settings.agent.clone(), completion, bridge)
    }

    /// Replace the loop observer
    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.agent_loop = self.agent_loop.with_observer(observer);
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Prompt configuration used for the system prompt, if any
    pub fn agent_config(&self) -> Option<&AgentConfig> {
        self.agent_config.as_ref()
    }

    /// Run one user turn through the agent loop
    pub async fn run(&self, request: AgentRequest) -> AgentResult<AgentResponse> {
        if request.user_message.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "user_message".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        let agent_id = request
            .agent_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.settings.agent_id.clone());

        let (tool_prompt, tools) = self
            .bridge
            .resolve_tool_prompt(
                &agent_id,
                self.settings.enable_tools,
                self.settings.tool_prompt_template.as_deref(),
                self.settings.include_tool_schemas_in_prompt,
            )
            .await;

        let system_prompt = self
            .agent_config
            .as_ref()
            .map(|config| config.prompt.as_str())
            .or(self.settings.system_prompt.as_deref());

        let existing = request.conversation.map(|conversation| {
            match (&conversation.session_id, &request.session_id) {
                (None, Some(session_id)) => conversation.with_session_id(session_id.clone()),
                _ => conversation,
            }
        });
        let existing = existing.or_else(|| {
            request
                .session_id
                .as_ref()
                .map(|session_id| Conversation::new(Vec::new()).with_session_id(session_id.clone()))
        });

        let mut conversation = build_conversation(
            existing.as_ref(),
            &request.user_message,
            system_prompt,
            tool_prompt.as_deref(),
        );
        if conversation.agent_id.is_none() {
            conversation = conversation.with_agent_id(agent_id.clone());
        }

        let base_completion = self.settings.completion.clone().unwrap_or_default();
        let mut completion_config = match &request.completion {
            Some(overrides) => overrides.layered_over(&base_completion),
            None => base_completion,
        };
        if self.settings.enable_tools && !tools.is_empty() {
            completion_config.available_tools = Some(tools.clone());
        }

        let result = self
            .agent_loop
            .run(AgentLoopRequest {
                conversation,
                completion_config,
                loop_config: self.settings.loop_config(),
                enable_tools: self.settings.enable_tools,
                registry: tools,
            })
            .await;

        let assistant_message = result
            .conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .cloned();

        let tool_call_summaries: Vec<String> = result
            .tool_call_log
            .iter()
            .map(|record| {
                format!(
                    "{}:{}:{}",
                    record.request.tool_call_id,
                    record.request.tool_name,
                    if record.response.is_error { "error" } else { "success" }
                )
            })
            .collect();

        tracing::info!(
            agent_id = %agent_id,
            session_id = result.conversation.session_id.as_deref().unwrap_or_default(),
            outcome = ?result.outcome,
            turns = result.turns,
            tool_call_count = result.tool_call_log.len(),
            tool_calls = ?tool_call_summaries,
            "agent_run_completed"
        );

        Ok(AgentResponse {
            agent_id,
            conversation: result.conversation,
            assistant_message,
            tool_calls: result.tool_call_log,
            outcome: result.outcome,
            turns: result.turns,
            agent_config_version: self.agent_config.as_ref().map(|c| c.version.clone()),
        })
    }
}
