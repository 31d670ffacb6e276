use clap::Parser;
use std::num::NonZeroU32;
use std::path::PathBuf;

/// Agent Toolkit - run a tool-calling agent against an OpenAI-compatible model
#[derive(Parser, Debug, Clone)]
#[command(name = "agent-toolkit", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "AGENT_TOOLKIT_CONFIG", default_value = "agent-toolkit.toml")]
    pub config: PathBuf,

    /// User message to send to the agent
    #[arg(short, long, required_unless_present = "print_config_version")]
    pub message: Option<String>,

    /// Conversation JSON file to continue
    #[arg(long)]
    pub conversation: Option<PathBuf>,

    /// Agent id override
    #[arg(long, env = "AGENT_TOOLKIT_AGENT_ID")]
    pub agent_id: Option<String>,

    /// Session id for a new conversation
    #[arg(long)]
    pub session_id: Option<String>,

    /// Maximum number of model turns
    #[arg(long)]
    pub max_iterations: Option<NonZeroU32>,

    /// Model override
    #[arg(long, env = "AGENT_TOOLKIT_MODEL")]
    pub model: Option<String>,

    /// Run without calling tools
    #[arg(long)]
    pub no_tools: bool,

    /// Print the version of the configured prompt and exit
    #[arg(long)]
    pub print_config_version: bool,
}
