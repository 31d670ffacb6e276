//! OpenAI-compatible chat completion service

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

use super::{CompletionRequest, CompletionService};
use crate::agents::config::{merge_config, CompletionConfig, ModelClientSettings};
use crate::agents::domain::{
    Completion, Conversation, FinishReason, Message, RawArguments, ToolCallCandidate,
    ToolDescriptor, Usage,
};
use crate::agents::error::{ModelClientError, ModelClientResult};

/// Completion service for any endpoint speaking the OpenAI chat API
pub struct OpenAiCompletionService {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    settings: ModelClientSettings,
}

impl OpenAiCompletionService {
    /// Create a service from settings, reading the API key from `api_key_env`
    pub fn new(settings: ModelClientSettings) -> ModelClientResult<Self> {
        let api_key = match &settings.api_key_env {
            Some(env_var) => Some(env::var(env_var).map_err(|_| {
                ModelClientError::Authentication(format!(
                    "Environment variable {} not set",
                    env_var
                ))
            })?),
            None => None,
        };
        Self::with_api_key(settings, api_key)
    }

    /// Create a service with an explicit API key
    pub fn with_api_key(
        settings: ModelClientSettings,
        api_key: Option<String>,
    ) -> ModelClientResult<Self> {
        if settings.timeout_seconds.is_nan() || settings.timeout_seconds <= 0.0 {
            return Err(ModelClientError::InvalidRequest(format!(
                "timeout_seconds must be positive, got {}",
                settings.timeout_seconds
            )));
        }
        let timeout = Duration::try_from_secs_f64(settings.timeout_seconds).map_err(|e| {
            ModelClientError::InvalidRequest(format!("timeout_seconds is out of range: {}", e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelClientError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            settings,
        })
    }

    pub fn settings(&self) -> &ModelClientSettings {
        &self.settings
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, conversation: &Conversation, config: &CompletionConfig) -> Value {
        let mut body = json!({
            "model": config.model.as_deref().unwrap_or(&self.settings.default_model),
            "messages": convert_messages(conversation.messages()),
        });

        if let Some(temperature) = config.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(max_tokens) = config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(response_format) = &config.response_format {
            body["response_format"] = response_format.clone();
        }

        if let Some(tool_choice) = &config.tool_choice {
            body["tool_choice"] = json!(tool_choice);
        }

        body["parallel_tool_calls"] = json!(config.enable_tool_expansion.unwrap_or(true));

        if let Some(tools) = &config.available_tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools.iter().map(tool_definition).collect::<Vec<_>>());
            }
        }

        body
    }

    /// Turn a provider payload into a completion
    fn parse_response(
        &self,
        conversation: &Conversation,
        response: OpenAiResponse,
        config: &CompletionConfig,
    ) -> ModelClientResult<Completion> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ModelClientError::Parse("Missing choices in completion response".to_string())
        })?;

        let tool_calls: Vec<ToolCallCandidate> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(candidate_from_openai)
            .collect();

        let content = choice.message.content.unwrap_or_default();
        let message = Message::assistant_with_tools(content, tool_calls.clone());

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let created_at: DateTime<Utc> = response
            .created
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        let model = response
            .model
            .or_else(|| config.model.clone())
            .unwrap_or_default();

        Ok(Completion {
            conversation: conversation.with_message(message.clone()),
            message,
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_provider),
            usage,
            model,
            response_id: response.id.unwrap_or_default(),
            created_at,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn generate(&self, request: CompletionRequest) -> ModelClientResult<Completion> {
        let config = merge_config(&self.settings, request.config.as_ref());
        let body = self.build_request_body(&request.conversation, &config);

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        for (name, value) in &self.settings.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        tracing::debug!(
            model = config.model.as_deref().unwrap_or_default(),
            messages = request.conversation.len(),
            "Sending completion request"
        );

        let response = builder.json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() >= 400 {
            return Err(ModelClientError::Api {
                status: status.as_u16(),
                message: provider_error_message(&text),
            });
        }

        let payload: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            ModelClientError::Parse(format!("Failed to parse response: {}", e))
        })?;

        self.parse_response(&request.conversation, payload, &config)
    }
}

/// Convert internal messages to OpenAI format
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": m.role.as_str(),
                "content": m.content,
            });

            if let Some(tool_calls) = &m.tool_calls {
                msg["tool_calls"] = json!(tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.call_id,
                            "type": "function",
                            "function": {
                                "name": tc.raw_tool_name,
                                "arguments": tc.arguments_text(),
                            }
                        })
                    })
                    .collect::<Vec<_>>());
            }

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(name) = &m.name {
                msg["name"] = json!(name);
            }

            msg
        })
        .collect()
}

/// Function definition for a registry entry.
///
/// OpenAI requires at minimum `{"type": "object"}` for function parameters.
fn tool_definition(tool: &ToolDescriptor) -> Value {
    let params = match &tool.input_schema {
        Some(Value::Object(schema)) if !schema.is_empty() => {
            let mut schema = schema.clone();
            schema
                .entry("type".to_string())
                .or_insert_with(|| json!("object"));
            Value::Object(schema)
        }
        _ => json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    };

    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description.clone().unwrap_or_default(),
            "parameters": params
        }
    })
}

fn candidate_from_openai(tool_call: OpenAiToolCall) -> ToolCallCandidate {
    let call_id = tool_call
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(ToolCallCandidate::generate_id);
    let (name, arguments) = match tool_call.function {
        Some(function) => (function.name.unwrap_or_default(), function.arguments),
        None => (String::new(), None),
    };
    let raw_arguments = match arguments {
        Some(Value::String(text)) => RawArguments::Text(text),
        Some(other) => RawArguments::Structured(other),
        None => RawArguments::Structured(Value::Null),
    };

    ToolCallCandidate {
        call_id,
        raw_tool_name: name,
        raw_arguments,
    }
}

fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Model provider returned an error".to_string())
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    id: Option<String>,
    model: Option<String>,
    created: Option<i64>,
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: Option<String>,
    function: Option<OpenAiFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: Option<String>,
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
