//! CLI command dispatch and execution

use agent_team_controller_core::config::{Config, ConfigOverrides, resolve_config};
use agent_team_controller_core::home::get_home_dir;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config_cmd;
mod inbox;
mod run;

/// atc - controller for a team of worker CLI agents
#[derive(Parser, Debug)]
#[command(
    name = "atc",
    version,
    about = "Controller for a team of worker CLI agents",
    long_about = "Spawns worker agents and coordinates them through file mailboxes under ~/.claude/teams/"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Storage root (default: ~/.claude)
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a team, spawn agents and stream events as JSON lines
    Run(run::RunArgs),

    /// Show effective configuration
    Config(config_cmd::ConfigArgs),

    /// Print an agent's mailbox
    Inbox(inbox::InboxArgs),
}

/// Resolved configuration plus the home directory it was resolved against
pub(crate) struct Resolved {
    pub config: Config,
    pub home_dir: PathBuf,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        if self.verbose {
            agent_team_controller_core::logging::init_with_level(tracing::Level::DEBUG);
        } else {
            agent_team_controller_core::logging::init();
        }

        let team = match &self.command {
            Commands::Run(args) => args.team.clone(),
            Commands::Inbox(args) => args.team.clone(),
            Commands::Config(_) => None,
        };
        let ctx = self.resolve(team)?;

        match self.command {
            Commands::Run(args) => run::execute(args, ctx).await,
            Commands::Config(args) => config_cmd::execute(args, ctx),
            Commands::Inbox(args) => inbox::execute(args, ctx),
        }
    }

    fn resolve(&self, team: Option<String>) -> Result<Resolved> {
        let home_dir = get_home_dir().context("Failed to determine home directory")?;
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;

        let overrides = ConfigOverrides {
            team,
            root: self.root.clone(),
            config_path: self.config.clone(),
            ..Default::default()
        };
        let config = resolve_config(&overrides, &current_dir, &home_dir)
            .context("Failed to resolve configuration")?;
        Ok(Resolved { config, home_dir })
    }
}
