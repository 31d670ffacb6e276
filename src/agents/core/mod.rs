//! Agent loop
//!
//! The turn-by-turn driver that alternates between the completion service
//! and the tool bridge until the model answers or the budget runs out.

mod agent_loop;
mod observer;

#[cfg(test)]
mod agent_loop_test;

pub use agent_loop::{AgentLoop, AgentLoopRequest, AgentLoopResult, TurnStep};
pub use observer::{LoopEvent, LoopObserver, TracingObserver};
pub use crate::agents::domain::LoopOutcome;
