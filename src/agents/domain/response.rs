//! Completion and agent response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Conversation, Message, ToolCallCandidate, ToolCallRecord};

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens used in the prompt/input
    pub prompt_tokens: u32,
    /// Tokens generated in the response
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Reason a completion stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    /// Provider-specific reason not covered above
    Other(String),
}

impl FinishReason {
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Result of one call to a completion service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Input conversation with the assistant message appended
    pub conversation: Conversation,
    /// The assistant message produced by the model
    pub message: Message,
    /// Tool calls requested by the model, unresolved
    #[serde(default)]
    pub tool_calls: Vec<ToolCallCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub model: String,
    pub response_id: String,
    /// Creation time reported by the provider
    pub created_at: DateTime<Utc>,
}

/// How an agent run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    /// The model produced a final answer
    Completed,
    /// The turn budget ran out first
    Exhausted,
}

/// Final response from an agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,
    /// Full conversation after the run
    pub conversation: Conversation,
    /// Last assistant message, if the run produced one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<Message>,
    /// Tool calls made during the run, in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    pub outcome: LoopOutcome,
    /// Number of completion turns used
    pub turns: u32,
    /// Version of the prompt configuration used for the system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_config_version: Option<String>,
}
