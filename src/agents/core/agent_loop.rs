//! Turn-driven agent loop

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::observer::{LoopEvent, LoopObserver, TracingObserver};
use crate::agents::config::{AgentLoopConfig, CompletionConfig};
use crate::agents::domain::{
    format_tool_result, Completion, Conversation, LoopOutcome, Message, ToolCallRecord,
    ToolDescriptor, ToolInvocation,
};
use crate::agents::llm::{CompletionRequest, CompletionService};
use crate::agents::resolver;
use crate::agents::tools::ToolBridge;

/// Input for one loop run
#[derive(Debug, Clone)]
pub struct AgentLoopRequest {
    pub conversation: Conversation,
    pub completion_config: CompletionConfig,
    pub loop_config: AgentLoopConfig,
    /// Execute tool calls requested by the model
    pub enable_tools: bool,
    /// Tools that candidate calls are resolved against
    pub registry: Vec<ToolDescriptor>,
}

/// Output of one loop run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopResult {
    pub conversation: Conversation,
    /// Every executed tool call, in execution order
    pub tool_call_log: Vec<ToolCallRecord>,
    pub outcome: LoopOutcome,
    /// Turns consumed, failed ones included
    pub turns: u32,
}

/// Result of asking the completion service for one turn
#[derive(Debug, Clone)]
pub enum TurnStep {
    Completed(Completion),
    /// The turn failed in a way the model may recover from
    RetryableFailure(String),
}

/// Drives a conversation between a completion service and a tool bridge
pub struct AgentLoop {
    completion: Arc<dyn CompletionService>,
    bridge: Arc<dyn ToolBridge>,
    observer: Arc<dyn LoopObserver>,
}

impl AgentLoop {
    pub fn new(completion: Arc<dyn CompletionService>, bridge: Arc<dyn ToolBridge>) -> Self {
        Self {
            completion,
            bridge,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    async fn next_step(&self, conversation: &Conversation, config: &CompletionConfig) -> TurnStep {
        let request = CompletionRequest::new(conversation.clone()).with_config(config.clone());
        match self.completion.generate(request).await {
            Ok(completion) => TurnStep::Completed(completion),
            Err(e) => TurnStep::RetryableFailure(e.to_string()),
        }
    }

    fn diagnostic(reason: &str) -> Message {
        Message::system(format!("Error parsing response: {}", reason))
    }

    /// Run turns until the model answers or `max_iterations` is used up.
    ///
    /// Failures never escape: they are appended as system messages so the
    /// model can correct itself on the next turn.
    pub async fn run(&self, request: AgentLoopRequest) -> AgentLoopResult {
        let AgentLoopRequest {
            mut conversation,
            completion_config,
            loop_config,
            enable_tools,
            registry,
        } = request;

        let max_iterations = loop_config.max_iterations.get();
        let mut tool_call_log: Vec<ToolCallRecord> = Vec::new();
        let mut outcome = LoopOutcome::Exhausted;
        let mut turns = 0;

        while turns < max_iterations {
            turns += 1;

            let completion = match self.next_step(&conversation, &completion_config).await {
                TurnStep::Completed(completion) => completion,
                TurnStep::RetryableFailure(reason) => {
                    conversation = conversation.with_message(Self::diagnostic(&reason));
                    self.observer.on_event(&LoopEvent::TurnFailed { turn: turns, reason });
                    continue;
                }
            };

            if enable_tools && !completion.tool_calls.is_empty() {
                let session_id = completion.conversation.session_id.clone();
                let invocations: Vec<ToolInvocation> = completion
                    .tool_calls
                    .iter()
                    .map(|candidate| {
                        ToolInvocation::from_resolved(
                            resolver::resolve(candidate, &registry),
                            session_id.clone(),
                        )
                    })
                    .collect();

                match self
                    .bridge
                    .execute_tool_calls(invocations, session_id.as_deref())
                    .await
                {
                    Ok(records) => {
                        conversation = completion.conversation;
                        for record in &records {
                            conversation = conversation.with_message(Message::tool_result(
                                record.request.tool_call_id.clone(),
                                record.request.tool_name.clone(),
                                format_tool_result(&record.response),
                            ));
                        }
                        self.observer.on_event(&LoopEvent::ToolCallsExecuted {
                            turn: turns,
                            tool_names: records.iter().map(|r| r.request.tool_name.clone()).collect(),
                            error_count: records.iter().filter(|r| r.response.is_error).count(),
                        });
                        tool_call_log.extend(records);
                    }
                    Err(e) => {
                        // The assistant message is dropped with its unanswered tool calls
                        let reason = e.to_string();
                        conversation = conversation.with_message(Self::diagnostic(&reason));
                        self.observer.on_event(&LoopEvent::TurnFailed { turn: turns, reason });
                    }
                }
                continue;
            }

            conversation = completion.conversation;

            if completion.message.content.is_empty() {
                self.observer.on_event(&LoopEvent::EmptyCompletion { turn: turns });
                continue;
            }

            outcome = LoopOutcome::Completed;
            break;
        }

        self.observer.on_event(&LoopEvent::Finished { outcome, turns });

        AgentLoopResult {
            conversation,
            tool_call_log,
            outcome,
            turns,
        }
    }
}
