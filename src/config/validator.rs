use std::collections::HashSet;
use thiserror::Error;

use crate::agents::config::{
    AgentSettings, CompletionConfig, McpBridgeSettings, McpTransport, ModelClientSettings,
};
use crate::agents::prompt::create_agent_config;
use crate::config::Settings;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Cross-reference error: {0}")]
    CrossReference(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

/// Upper bound for every timeout and cache lifetime: one day
const MAX_SECONDS: f64 = 86_400.0;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_model_client(&settings.model_client) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_agent(&settings.agent) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_mcp_bridge(&settings.mcp_bridge) {
            errors.extend(e);
        }

        if let Err(e) = Self::validate_cross_references(settings) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_model_client(client: &ModelClientSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if client.api_base.is_empty() {
            errors.push(ValidationError::MissingField("model_client.api_base".to_string()));
        } else if !client.api_base.starts_with("http://") && !client.api_base.starts_with("https://") {
            errors.push(ValidationError::InvalidValue {
                field: "model_client.api_base".to_string(),
                reason: "must be an http(s) URL".to_string(),
            });
        }

        if client.default_model.is_empty() {
            errors.push(ValidationError::MissingField("model_client.default_model".to_string()));
        }

        errors.extend(Self::validate_seconds(
            "model_client.timeout_seconds",
            client.timeout_seconds,
            false,
        ));

        let mut seen = HashSet::new();
        for name in client.extra_headers.keys() {
            if !seen.insert(name.to_ascii_lowercase()) {
                errors.push(ValidationError::Duplicate(format!(
                    "model_client.extra_headers: {}",
                    name
                )));
            }
        }

        errors.extend(Self::validate_completion("model_client.default_config", &client.default_config));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_completion(field: &str, config: &CompletionConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if let Some(temperature) = config.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                errors.push(ValidationError::InvalidValue {
                    field: format!("{}.temperature", field),
                    reason: "Temperature must be between 0 and 2".to_string(),
                });
            }
        }
        if config.max_output_tokens == Some(0) {
            errors.push(ValidationError::InvalidValue {
                field: format!("{}.max_output_tokens", field),
                reason: "must be greater than 0".to_string(),
            });
        }
        errors
    }

    fn validate_agent(agent: &AgentSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if agent.agent_id.trim().is_empty() {
            errors.push(ValidationError::MissingField("agent.agent_id".to_string()));
        }

        if let Some(prompt) = &agent.prompt {
            if prompt.name.is_empty() {
                errors.push(ValidationError::MissingField("agent.prompt.name".to_string()));
            }
            if let Err(e) = create_agent_config(
                prompt.name.clone(),
                prompt.template.clone(),
                prompt.variables.clone(),
            ) {
                errors.push(ValidationError::InvalidValue {
                    field: "agent.prompt".to_string(),
                    reason: e.to_string(),
                });
            }
        }

        if let Some(completion) = &agent.completion {
            errors.extend(Self::validate_completion("agent.completion", completion));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_mcp_bridge(bridge: &McpBridgeSettings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("mcp_bridge.list_timeout_seconds", bridge.list_timeout_seconds),
            ("mcp_bridge.call_timeout_seconds", bridge.call_timeout_seconds),
        ] {
            errors.extend(Self::validate_seconds(field, value, false));
        }
        errors.extend(Self::validate_seconds(
            "mcp_bridge.tool_cache_seconds",
            bridge.tool_cache_seconds,
            true,
        ));

        match bridge.transport {
            Some(McpTransport::Stdio) if bridge.command().is_none() => {
                errors.push(ValidationError::MissingField("mcp_bridge.command".to_string()));
            }
            Some(McpTransport::Http) if bridge.endpoint().is_none() => {
                errors.push(ValidationError::MissingField("mcp_bridge.url".to_string()));
            }
            _ => {}
        }

        if bridge.port.is_some() && bridge.host.is_none() && bridge.url.is_none() {
            errors.push(ValidationError::MissingField("mcp_bridge.host".to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Finite, at most [`MAX_SECONDS`], and positive (or zero when allowed)
    fn validate_seconds(field: &str, value: f64, allow_zero: bool) -> Option<ValidationError> {
        let reason = if !value.is_finite() {
            "must be a finite number of seconds"
        } else if allow_zero && value < 0.0 {
            "must not be negative"
        } else if !allow_zero && value <= 0.0 {
            "Timeout must be greater than 0"
        } else if value > MAX_SECONDS {
            "must not exceed 86400 seconds"
        } else {
            return None;
        };
        Some(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        })
    }

    fn validate_cross_references(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let requires_tools = settings
            .agent
            .completion
            .as_ref()
            .and_then(|c| c.tool_choice.as_deref())
            == Some("required");
        if requires_tools && !settings.agent.enable_tools {
            errors.push(ValidationError::CrossReference(
                "agent.completion.tool_choice is 'required' but agent.enable_tools is false"
                    .to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
