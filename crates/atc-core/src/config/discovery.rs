//! Configuration discovery and resolution

use super::types::Config;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Environment variable holds a value of the wrong shape
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override default team
    pub team: Option<String>,
    /// Override storage root
    pub root: Option<PathBuf>,
    /// Override worker binary
    pub worker_binary: Option<PathBuf>,
    /// Override pty wrapper
    pub pty_wrapper: Option<PathBuf>,
    /// Override poll interval
    pub poll_interval_ms: Option<u64>,
    /// Explicit config file, loaded in place of the repo-local one
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables
/// 3. Repo-local config (.atc.toml in current dir or up to the git root)
/// 4. Global config (~/.config/atc/config.toml)
/// 5. Defaults
///
/// Unparseable config files are logged and skipped. An explicit
/// `config_path` that fails to load is an error.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    // 4. Try global config
    let global_config_path = home_dir.join(".config/atc/config.toml");
    if global_config_path.exists() {
        match load_config_file(&global_config_path) {
            Ok(file_config) => merge_config(&mut config, file_config),
            Err(e) => warn!("Failed to parse global config at {global_config_path:?}: {e}"),
        }
    }

    // 3. Explicit file, or repo-local config
    if let Some(ref path) = overrides.config_path {
        merge_config(&mut config, load_config_file(path)?);
    } else if let Some(repo_config) = find_repo_local_config(current_dir) {
        match load_config_file(&repo_config) {
            Ok(file_config) => merge_config(&mut config, file_config),
            Err(e) => warn!("Failed to parse repo config at {repo_config:?}: {e}"),
        }
    }

    // 2. Apply environment variables
    apply_env_overrides(&mut config)?;

    // 1. Apply command-line overrides
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Find repo-local config file
///
/// Searches current directory and parent directories up to git root
fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(".atc.toml");
        if config_path.exists() {
            return Some(config_path);
        }

        // Stop at git root
        if dir.join(".git").exists() {
            break;
        }

        dir = dir.parent()?;
    }

    None
}

/// Load config from a TOML file
fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

/// Merge file config into base config
fn merge_config(base: &mut Config, file: Config) {
    base.core.default_team = file.core.default_team;
    if file.core.root.is_some() {
        base.core.root = file.core.root;
    }

    base.worker.binary = file.worker.binary;
    base.worker.args = file.worker.args;
    if file.worker.pty_wrapper.is_some() {
        base.worker.pty_wrapper = file.worker.pty_wrapper;
    }
    // Later sources override individual keys
    base.worker.env.extend(file.worker.env);

    base.poller = file.poller;
    base.readiness = file.readiness;
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(team) = std::env::var("ATC_TEAM") {
        config.core.default_team = team;
    }

    if let Ok(binary) = std::env::var("ATC_WORKER_BINARY") {
        config.worker.binary = PathBuf::from(binary);
    }

    if let Ok(wrapper) = std::env::var("ATC_PTY_WRAPPER") {
        // An empty value disables a wrapper configured in a file
        config.worker.pty_wrapper = if wrapper.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(wrapper))
        };
    }

    if let Ok(raw) = std::env::var("ATC_POLL_INTERVAL_MS") {
        config.poller.interval_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: "ATC_POLL_INTERVAL_MS",
            value: raw.clone(),
        })?;
    }

    Ok(())
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut Config, overrides: &ConfigOverrides) {
    if let Some(ref team) = overrides.team {
        config.core.default_team = team.clone();
    }

    if let Some(ref root) = overrides.root {
        config.core.root = Some(root.clone());
    }

    if let Some(ref binary) = overrides.worker_binary {
        config.worker.binary = binary.clone();
    }

    if let Some(ref wrapper) = overrides.pty_wrapper {
        config.worker.pty_wrapper = Some(wrapper.clone());
    }

    if let Some(interval) = overrides.poll_interval_ms {
        config.poller.interval_ms = interval;
    }
}
