//! Cosmic chat CLI
//!
//! Main entry point for the `cosmic` command-line tool: a documentation
//! assistant for the Cosmic journal system, answering from ingested manuals.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, HistoryCommand, IngestCommand};
use cosmic_core::config::{AppConfig, BackendKind};
use cosmic_core::logging::{self, LogFormat};
use cosmic_core::AppResult;
use std::path::PathBuf;

/// Cosmic chat - answers questions from the Cosmic documentation
#[derive(Parser, Debug)]
#[command(name = "cosmic")]
#[command(about = "Documentation assistant for the Cosmic journal system", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "COSMIC_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "COSMIC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Answer backend (local, remote)
    #[arg(short, long, global = true, env = "COSMIC_BACKEND", value_parser = parse_backend)]
    backend: Option<BackendKind>,

    /// Local model identifier
    #[arg(short, long, global = true, env = "COSMIC_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat with saved history
    Chat(ChatCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Ingest documentation into the passage index
    Ingest(IngestCommand),

    /// List a user's saved conversations
    History(HistoryCommand),
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    BackendKind::parse(s).ok_or_else(|| format!("unknown backend '{}' (expected local or remote)", s))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // Workspace and config file decide which YAML is read
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    let config = config.with_overrides(
        None,
        None,
        cli.backend,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let format = config
        .log_format
        .as_deref()
        .map(LogFormat::parse)
        .unwrap_or(LogFormat::Pretty);
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    // Missing remote settings are fatal before any command runs
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e);
    }

    tracing::info!("Cosmic chat starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Backend: {}", config.backend.as_str());
    tracing::debug!("Model: {}", config.local.model);

    config.ensure_cosmic_dir()?;

    let command_name = match &cli.command {
        Commands::Chat(_) => "chat",
        Commands::Ask(_) => "ask",
        Commands::Ingest(_) => "ingest",
        Commands::History(_) => "history",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::History(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_backend() {
        let cli = Cli::try_parse_from(["cosmic", "--backend", "remote", "chat", "--user", "anna"])
            .unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Remote));
        assert!(matches!(cli.command, Commands::Chat(ref c) if c.user == "anna"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Cli::try_parse_from(["cosmic", "--backend", "cloud", "history", "--user", "a"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from(["cosmic", "ingest", "docs", "--reset"]).unwrap();
        match cli.command {
            Commands::Ingest(cmd) => {
                assert_eq!(cmd.path, PathBuf::from("docs"));
                assert!(cmd.reset);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
