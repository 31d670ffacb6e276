use agent_toolkit::agents::domain::Conversation;
use agent_toolkit::agents::{AgentRequest, AgentRunner};
use agent_toolkit::cli::Cli;
use agent_toolkit::config::Settings;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;

    let runner = AgentRunner::from_settings(&settings)?;

    if cli.print_config_version {
        match runner.agent_config() {
            Some(config) => println!("{}", config.qualified_name()),
            None => println!("No prompt configuration"),
        }
        return Ok(());
    }

    let conversation = match &cli.conversation {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Some(serde_json::from_str::<Conversation>(&raw)?)
        }
        None => None,
    };

    let request = AgentRequest {
        agent_id: cli.agent_id.clone(),
        user_message: cli.message.clone().unwrap_or_default(),
        conversation,
        session_id: cli.session_id.clone(),
        completion: None,
    };

    let response = runner.run(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
