//! Completion services
//!
//! The agent loop talks to language models only through [`CompletionService`].
//! [`OpenAiCompletionService`] is the shipped adapter for OpenAI-compatible
//! chat completion endpoints.

mod openai;

pub use openai::OpenAiCompletionService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::config::CompletionConfig;
use crate::agents::domain::{Completion, Conversation};
use crate::agents::error::ModelClientResult;

/// A language-model backend able to continue a conversation
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce the next assistant message for `request.conversation`.
    ///
    /// The returned `Completion::conversation` is the input conversation with
    /// the assistant message appended.
    async fn generate(&self, request: CompletionRequest) -> ModelClientResult<Completion>;
}

/// Request for one completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub conversation: Conversation,
    /// Overrides merged over the service defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CompletionConfig>,
}

impl CompletionRequest {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            config: None,
        }
    }

    pub fn with_config(mut self, config: CompletionConfig) -> Self {
        self.config = Some(config);
        self
    }
}
