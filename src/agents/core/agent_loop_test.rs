use super::{AgentLoop, AgentLoopRequest, LoopEvent, LoopObserver, LoopOutcome};
use crate::agents::config::{AgentLoopConfig, CompletionConfig};
use crate::agents::domain::{
    Completion, Conversation, Message, Role, ToolCallCandidate, ToolDescriptor,
    ToolExecutionResult, ToolInvocation,
};
use crate::agents::error::{BridgeError, BridgeResult, ModelClientError, ModelClientResult};
use crate::agents::llm::{CompletionRequest, CompletionService};
use crate::agents::tools::ToolBridge;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

enum Scripted {
    Reply(&'static str, Vec<ToolCallCandidate>),
    Fail(ModelClientError),
}

/// Completion service that replays a fixed script, then repeats the last entry
struct ScriptedCompletion {
    script: Mutex<VecDeque<Scripted>>,
    fallback: &'static str,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    fn new(script: Vec<Scripted>, fallback: &'static str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn generate(&self, request: CompletionRequest) -> ModelClientResult<Completion> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        let (content, tool_calls) = match next {
            Some(Scripted::Fail(e)) => return Err(e),
            Some(Scripted::Reply(content, calls)) => (content, calls),
            None => (self.fallback, Vec::new()),
        };

        let message = Message::assistant_with_tools(content, tool_calls.clone());
        Ok(Completion {
            conversation: request.conversation.with_message(message.clone()),
            message,
            tool_calls,
            finish_reason: None,
            usage: None,
            model: "scripted".to_string(),
            response_id: "resp".to_string(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Default)]
struct RecordingBridge {
    calls: Mutex<Vec<ToolInvocation>>,
    fail_with_timeout: bool,
}

#[async_trait]
impl ToolBridge for RecordingBridge {
    async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        Ok(registry())
    }

    async fn call_tool(&self, invocation: &ToolInvocation) -> BridgeResult<ToolExecutionResult> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.fail_with_timeout {
            return Err(BridgeError::Timeout(60));
        }
        let a = invocation.payload.get("a").and_then(|v| v.as_i64()).unwrap_or(0);
        let b = invocation.payload.get("b").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(ToolExecutionResult::success(
            invocation.tool_name.clone(),
            vec![json!({"type": "text", "text": (a + b).to_string()})],
        )
        .with_structured_content(json!({"result": a + b})))
    }
}

#[derive(Default)]
struct CollectingObserver {
    events: Mutex<Vec<LoopEvent>>,
}

impl LoopObserver for CollectingObserver {
    fn on_event(&self, event: &LoopEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn registry() -> Vec<ToolDescriptor> {
    vec![ToolDescriptor::new(
        "sum-two-numbers",
        json!({"type": "object", "properties": {"a": {}, "b": {}}}),
    )]
}

fn request(max_iterations: u32, enable_tools: bool) -> AgentLoopRequest {
    AgentLoopRequest {
        conversation: Conversation::new(vec![
            Message::system("You are a calculator."),
            Message::user("What is 2 + 3?"),
        ])
        .with_session_id("session-1"),
        completion_config: CompletionConfig::default(),
        loop_config: AgentLoopConfig::new(NonZeroU32::new(max_iterations).unwrap()),
        enable_tools,
        registry: registry(),
    }
}

fn sum_call() -> ToolCallCandidate {
    ToolCallCandidate::new("call_1", "SumTwoNumbers", "{\"a\": 2, \"b\": 3}")
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let completion = Arc::new(ScriptedCompletion::new(
        vec![
            Scripted::Reply("", vec![sum_call()]),
            Scripted::Reply("2 + 3 = 5", vec![]),
        ],
        "unused",
    ));
    let bridge = Arc::new(RecordingBridge::default());
    let agent_loop = AgentLoop::new(completion.clone(), bridge.clone());

    let result = agent_loop.run(request(5, true)).await;

    assert_eq!(result.outcome, LoopOutcome::Completed);
    assert_eq!(result.turns, 2);
    assert_eq!(result.tool_call_log.len(), 1);
    assert_eq!(result.tool_call_log[0].request.tool_call_id, "call_1");
    assert_eq!(result.tool_call_log[0].request.tool_name, "sum-two-numbers");
    assert_eq!(completion.request_count(), 2);

    let roles: Vec<Role> = result.conversation.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );

    let tool_message = &result.conversation.messages()[3];
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(tool_message.name.as_deref(), Some("sum-two-numbers"));
    assert_eq!(tool_message.content, "{\n  \"result\": 5\n}");
    assert_eq!(result.conversation.last_message().unwrap().content, "2 + 3 = 5");

    let calls = bridge.calls.lock().unwrap();
    assert_eq!(calls[0].session_id.as_deref(), Some("session-1"));
}

#[tokio::test]
async fn test_empty_completions_exhaust_budget() {
    let completion = Arc::new(ScriptedCompletion::new(vec![], ""));
    let observer = Arc::new(CollectingObserver::default());
    let agent_loop = AgentLoop::new(completion.clone(), Arc::new(RecordingBridge::default()))
        .with_observer(observer.clone());

    let result = agent_loop.run(request(5, true)).await;

    assert_eq!(result.outcome, LoopOutcome::Exhausted);
    assert_eq!(result.turns, 5);
    assert_eq!(completion.request_count(), 5);
    assert!(result.tool_call_log.is_empty());

    let events = observer.events.lock().unwrap();
    let empty = events
        .iter()
        .filter(|e| matches!(e, LoopEvent::EmptyCompletion { .. }))
        .count();
    assert_eq!(empty, 5);
    assert_eq!(
        events.last(),
        Some(&LoopEvent::Finished {
            outcome: LoopOutcome::Exhausted,
            turns: 5
        })
    );
}

#[tokio::test]
async fn test_completion_error_becomes_system_message() {
    let completion = Arc::new(ScriptedCompletion::new(
        vec![
            Scripted::Fail(ModelClientError::Parse("bad tool call json".to_string())),
            Scripted::Reply("Recovered", vec![]),
        ],
        "unused",
    ));
    let agent_loop = AgentLoop::new(completion.clone(), Arc::new(RecordingBridge::default()));

    let result = agent_loop.run(request(3, true)).await;

    assert_eq!(result.outcome, LoopOutcome::Completed);
    assert_eq!(result.turns, 2);

    let messages = result.conversation.messages();
    assert_eq!(messages[2].role, Role::System);
    assert_eq!(
        messages[2].content,
        "Error parsing response: Parse error: bad tool call json"
    );
    assert_eq!(messages[3].content, "Recovered");

    let requests = completion.requests.lock().unwrap();
    let second = &requests[1];
    assert_eq!(second.conversation.len(), 3);
}

#[tokio::test]
async fn test_failures_on_every_turn_exhaust() {
    let script = (0..3)
        .map(|_| Scripted::Fail(ModelClientError::Timeout))
        .collect();
    let completion = Arc::new(ScriptedCompletion::new(script, "never reached"));
    let agent_loop = AgentLoop::new(completion, Arc::new(RecordingBridge::default()));

    let result = agent_loop.run(request(3, true)).await;

    assert_eq!(result.outcome, LoopOutcome::Exhausted);
    assert_eq!(result.turns, 3);
    let system_count = result
        .conversation
        .messages()
        .iter()
        .filter(|m| m.role == Role::System)
        .count();
    assert_eq!(system_count, 4);
}

#[tokio::test]
async fn test_bridge_failure_is_retried() {
    let completion = Arc::new(ScriptedCompletion::new(
        vec![
            Scripted::Reply("", vec![sum_call()]),
            Scripted::Reply("Could not reach the calculator.", vec![]),
        ],
        "unused",
    ));
    let bridge = Arc::new(RecordingBridge {
        fail_with_timeout: true,
        ..Default::default()
    });
    let observer = Arc::new(CollectingObserver::default());
    let agent_loop =
        AgentLoop::new(completion, bridge).with_observer(observer.clone());

    let result = agent_loop.run(request(4, true)).await;

    assert_eq!(result.outcome, LoopOutcome::Completed);
    assert_eq!(result.turns, 2);
    assert!(result.tool_call_log.is_empty());

    let messages = result.conversation.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].role, Role::System);
    assert!(messages[2].content.starts_with("Error parsing response: "));
    assert!(messages[2].content.contains("timed out"));

    let events = observer.events.lock().unwrap();
    assert!(matches!(events[0], LoopEvent::TurnFailed { turn: 1, .. }));
}

#[tokio::test]
async fn test_tools_disabled_skips_bridge() {
    let completion = Arc::new(ScriptedCompletion::new(
        vec![Scripted::Reply("I would call a tool.", vec![sum_call()])],
        "unused",
    ));
    let bridge = Arc::new(RecordingBridge::default());
    let agent_loop = AgentLoop::new(completion, bridge.clone());

    let result = agent_loop.run(request(3, false)).await;

    assert_eq!(result.outcome, LoopOutcome::Completed);
    assert_eq!(result.turns, 1);
    assert!(result.tool_call_log.is_empty());
    assert!(bridge.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_tool_log_spans_turns_in_order() {
    let completion = Arc::new(ScriptedCompletion::new(
        vec![
            Scripted::Reply(
                "",
                vec![
                    ToolCallCandidate::new("c1", "sum_two_numbers", "{\"a\": 1, \"b\": 1}"),
                    ToolCallCandidate::new("c2", "sum", json!({"input": {"a": 2, "b": 2}})),
                ],
            ),
            Scripted::Reply(
                "",
                vec![ToolCallCandidate::new("c3", "SumTwoNumbers", "{\"a\": 3, \"b\": 3}")],
            ),
            Scripted::Reply("done", vec![]),
        ],
        "unused",
    ));
    let agent_loop = AgentLoop::new(completion, Arc::new(RecordingBridge::default()));

    let result = agent_loop.run(request(10, true)).await;

    let ids: Vec<&str> = result
        .tool_call_log
        .iter()
        .map(|r| r.request.tool_call_id.as_str())
        .collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert_eq!(result.tool_call_log[1].request.arguments["a"], 2);
    assert_eq!(result.turns, 3);
    assert_eq!(result.outcome, LoopOutcome::Completed);
}
