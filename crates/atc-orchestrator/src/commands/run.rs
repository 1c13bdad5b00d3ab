//! Run command implementation

use anyhow::{Context, Result};
use atc_orchestrator::{Orchestrator, OrchestratorOptions, SpawnAgentOptions};
use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Resolved;

/// Start a team and stream its events
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Team name (default: core.default_team)
    #[arg(long)]
    pub team: Option<String>,

    /// Agent to spawn, as NAME or NAME:AGENT_TYPE (repeatable)
    #[arg(long = "spawn", value_name = "NAME[:TYPE]")]
    spawn: Vec<String>,

    /// Keep team storage on exit instead of deleting it
    #[arg(long)]
    keep: bool,
}

/// Execute the run command
pub async fn execute(args: RunArgs, ctx: Resolved) -> Result<()> {
    let options = OrchestratorOptions::from_config(&ctx.config, None, &ctx.home_dir);
    info!(team = %options.team, root = %options.root.display(), "Starting team");

    let orch = Orchestrator::new(options);
    let mut events = orch.subscribe();
    orch.init().await.context("Failed to initialize team")?;

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_signal(cancel.clone()));

    for spec in &args.spawn {
        let options = parse_spawn(spec);
        if let Err(e) = orch.spawn_agent(options).await {
            finish(&orch, args.keep).await?;
            return Err(e).with_context(|| format!("Failed to spawn '{spec}'"));
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => warn!("Event stream lagged, {skipped} events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    finish(&orch, args.keep).await
}

async fn finish(orch: &Orchestrator, keep: bool) -> Result<()> {
    if keep {
        for name in orch.running_agents() {
            orch.kill_agent(&name).await;
        }
        return Ok(());
    }
    orch.shutdown().await.context("Failed to shut down team")
}

async fn wait_for_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                if let Err(e) = ctrl_c.await {
                    warn!("Failed to listen for Ctrl+C: {e}");
                    return;
                }
                info!("Received SIGINT (Ctrl+C)");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            warn!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Received Ctrl+C");
    }

    cancel.cancel();
}

fn parse_spawn(spec: &str) -> SpawnAgentOptions {
    match spec.split_once(':') {
        Some((name, agent_type)) if !agent_type.is_empty() => {
            let mut options = SpawnAgentOptions::new(name);
            options.agent_type = Some(agent_type.to_string());
            options
        }
        Some((name, _)) => SpawnAgentOptions::new(name),
        None => SpawnAgentOptions::new(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spawn_name_only() {
        let options = parse_spawn("w1");
        assert_eq!(options.name, "w1");
        assert!(options.agent_type.is_none());
    }

    #[test]
    fn test_parse_spawn_with_type() {
        let options = parse_spawn("reviewer:Explore");
        assert_eq!(options.name, "reviewer");
        assert_eq!(options.agent_type.as_deref(), Some("Explore"));

        let options = parse_spawn("w2:");
        assert_eq!(options.name, "w2");
        assert!(options.agent_type.is_none());
    }
}
