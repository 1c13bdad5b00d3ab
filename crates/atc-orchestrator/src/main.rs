//! atc - controller for a team of worker CLI agents
//!
//! Spawns workers, relays their mailbox traffic as JSON event lines, and
//! inspects team configuration and mailboxes.

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
