//! Inbox command implementation

use agent_team_controller_core::paths::StorageLayout;
use agent_team_controller_core::{FileMailbox, InboxMessage, Mailbox, decode};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use super::Resolved;

/// Print an agent's mailbox without marking anything read
#[derive(Args, Debug)]
pub struct InboxArgs {
    /// Agent whose mailbox to print (default: controller)
    #[arg(long, default_value = agent_team_controller_core::CONTROLLER_NAME)]
    agent: String,

    /// Override default team
    #[arg(long)]
    pub team: Option<String>,

    /// Show only unread entries
    #[arg(long)]
    unread: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the inbox command
pub fn execute(args: InboxArgs, ctx: Resolved) -> Result<()> {
    let Resolved { config, home_dir } = ctx;
    let team = config.core.default_team.clone();
    let mailbox = FileMailbox::new(StorageLayout::new(config.storage_root(&home_dir)));

    let messages: Vec<InboxMessage> = mailbox
        .read_all(&team, &args.agent)
        .with_context(|| format!("Failed to read mailbox {}@{team}", args.agent))?
        .into_iter()
        .filter(|m| !args.unread || !m.read)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("No messages for {}@{team}", args.agent);
        return Ok(());
    }

    for message in &messages {
        let marker = if message.read { " " } else { "*" };
        let kind = decode(message).kind();
        println!(
            "{marker} {}  {:<12} [{kind}] {}",
            format_timestamp(&message.timestamp),
            message.from,
            message.summary.as_deref().unwrap_or(&message.text)
        );
    }
    Ok(())
}

fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
