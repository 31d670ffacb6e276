use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod validator;

use crate::agents::config::{AgentSettings, McpBridgeSettings, ModelClientSettings, DEFAULT_MODEL};
use crate::cli::Cli;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "agent-toolkit.toml";

/// Prefix for environment overrides, e.g. `AGENT_TOOLKIT__AGENT__AGENT_ID`
pub const ENV_PREFIX: &str = "AGENT_TOOLKIT";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub model_client: ModelClientSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub mcp_bridge: McpBridgeSettings,
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_path(DEFAULT_CONFIG_FILE)
    }

    /// Create settings from CLI arguments (config file, environment, then CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::load(&cli.config)?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);

        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a config file. A missing file is not an error.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let settings = Self::load(path.as_ref())?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("model_client.default_model", DEFAULT_MODEL)?
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(settings)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    /// Apply CLI argument overrides to settings
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(agent_id) = &cli.agent_id {
            self.agent.agent_id = agent_id.clone();
        }
        if let Some(max_iterations) = cli.max_iterations {
            self.agent.max_iterations = max_iterations;
        }
        if cli.no_tools {
            self.agent.enable_tools = false;
        }
        if let Some(model) = &cli.model {
            self.model_client.default_model = model.clone();
        }
    }
}
