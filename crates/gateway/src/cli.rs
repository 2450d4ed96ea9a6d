//! Command-line interface.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use relay_domain::config::Config;

#[derive(Parser)]
#[command(name = "chatrelay", version, about = "Conversational turn orchestrator")]
pub struct Cli {
    /// Path to the TOML config file. A missing file means defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (the default when no command is given).
    Serve,
    /// Resolve a single turn from the command line and print the reply.
    Run {
        /// The user message.
        #[arg(long)]
        message: String,
        /// Existing conversation to continue.
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Config helpers.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Validate the config file and report every issue found.
    Validate,
}

/// Load config from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_validate_subcommand_parses() {
        let cli = Cli::parse_from(["chatrelay", "config", "validate"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Validate))
        ));
    }

    #[test]
    fn bare_invocation_defaults_to_serve() {
        let cli = Cli::parse_from(["chatrelay"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }
}
