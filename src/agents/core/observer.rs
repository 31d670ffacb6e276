//! Loop telemetry

use crate::agents::domain::LoopOutcome;

/// Something worth reporting while the loop runs
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// A completion or tool batch failed; the loop will retry
    TurnFailed { turn: u32, reason: String },
    /// Tool calls ran and their results were appended
    ToolCallsExecuted {
        turn: u32,
        tool_names: Vec<String>,
        error_count: usize,
    },
    /// The model returned neither content nor tool calls
    EmptyCompletion { turn: u32 },
    /// The loop stopped
    Finished { outcome: LoopOutcome, turns: u32 },
}

/// Passive sink for loop events
pub trait LoopObserver: Send + Sync {
    fn on_event(&self, event: &LoopEvent);
}

/// Reports loop events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LoopObserver for TracingObserver {
    fn on_event(&self, event: &LoopEvent) {
        match event {
            LoopEvent::TurnFailed { turn, reason } => {
                tracing::warn!(turn = *turn, reason = %reason, "agent_turn_failed");
            }
            LoopEvent::ToolCallsExecuted {
                turn,
                tool_names,
                error_count,
            } => {
                tracing::info!(
                    turn = *turn,
                    tools = ?tool_names,
                    errors = *error_count,
                    "agent_tool_calls_executed"
                );
            }
            LoopEvent::EmptyCompletion { turn } => {
                tracing::warn!(turn = *turn, "agent_empty_completion");
            }
            LoopEvent::Finished { outcome, turns } => {
                tracing::debug!(outcome = ?outcome, turns = *turns, "agent_loop_finished");
            }
        }
    }
}
