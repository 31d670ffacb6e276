//! # Agent Toolkit
//!
//! A small runtime for tool-calling LLM agents. It drives a bounded
//! completion loop against an OpenAI-compatible model and executes the
//! requested tools through an MCP server.
//!
//! ## Features
//!
//! - **Agent loop**: bounded turns, recoverable failures fed back to the model
//! - **Tool resolution**: tolerant matching of tool names and argument shapes
//! - **Prompt versions**: deterministic content hashes for prompt configurations
//! - **MCP bridge**: JSON-RPC over HTTP (sessions, SSE) or a launched server's stdio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_toolkit::agents::llm::OpenAiCompletionService;
//! use agent_toolkit::agents::tools::NoToolBridge;
//! use agent_toolkit::agents::{AgentRequest, AgentRunner};
//! use agent_toolkit::config::Settings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     let completion = Arc::new(OpenAiCompletionService::new(settings.model_client.clone())?);
//!     let runner = AgentRunner::new(settings.agent.clone(), completion, Arc::new(NoToolBridge))?;
//!
//!     let response = runner.run(AgentRequest::new("What is 2 + 3?")).await?;
//!     println!("{:?}", response.assistant_message);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod cli;
pub mod config;
