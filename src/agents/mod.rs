//! Tool-calling agents
//!
//! An agent run sends a conversation to a [`llm::CompletionService`], resolves
//! the tool calls the model asks for against the registry offered by a
//! [`tools::ToolBridge`], executes them and feeds the results back until the
//! model answers or the turn budget runs out.
//!
//! ## Architecture
//!
//! - `domain/` - Messages, conversations, tool calls and responses
//! - `core/` - The agent loop and its observer hook
//! - `resolver` - Maps model-proposed tool calls onto registered tools
//! - `prompt` - Prompt templates and configuration versions
//! - `llm/` - OpenAI-compatible completion service
//! - `tools/` - Tool bridge trait and the MCP adapter (HTTP and stdio)
//! - `handler` - [`AgentRunner`], the end-to-end entry point

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod handler;
pub mod llm;
pub mod prompt;
pub mod resolver;
pub mod tools;

// Re-export commonly used types
pub use self::config::*;
pub use domain::*;
pub use error::*;
pub use handler::{AgentRequest, AgentRunner};
