//! Config command implementation

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::Resolved;

/// Show effective configuration
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the config command
pub fn execute(args: ConfigArgs, ctx: Resolved) -> Result<()> {
    let Resolved { config, home_dir } = ctx;
    let storage_root = config.storage_root(&home_dir);
    let global_config_path = home_dir.join(".config/atc/config.toml");

    if args.json {
        let output = json!({
            "storageRoot": storage_root.display().to_string(),
            "globalConfig": {
                "path": global_config_path.display().to_string(),
                "exists": global_config_path.exists(),
            },
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let global_status = if global_config_path.exists() {
            "(found)"
        } else {
            "(not found)"
        };
        println!("# storage root: {}", storage_root.display());
        println!("# global config: {} {global_status}", global_config_path.display());
        println!();
        print!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}
