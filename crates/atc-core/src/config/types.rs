//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core configuration
    #[serde(default)]
    pub core: CoreConfig,
    /// Worker process configuration
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Inbox poller configuration
    #[serde(default)]
    pub poller: PollerConfig,
    /// Readiness heuristic configuration
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Default team name
    pub default_team: String,
    /// Storage root holding `teams/` and `tasks/`; `<home>/.claude` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_team: "default".to_string(),
            root: None,
        }
    }
}

/// Worker process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker CLI binary
    pub binary: PathBuf,
    /// Arguments placed before the identity flags
    pub args: Vec<String>,
    /// Pseudo-terminal wrapper; the worker is launched directly when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pty_wrapper: Option<PathBuf>,
    /// Extra environment for every worker
    pub env: BTreeMap<String, String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("claude"),
            args: Vec::new(),
            pty_wrapper: None,
            env: BTreeMap::new(),
        }
    }
}

/// Inbox poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Poll interval in milliseconds (default: 500)
    pub interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

/// Readiness heuristic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Treat `agent:spawned` as a readiness signal
    pub spawn_counts_as_ready: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            spawn_counts_as_ready: true,
        }
    }
}

impl Config {
    /// Storage root, falling back to `<home>/.claude`.
    pub fn storage_root(&self, home_dir: &Path) -> PathBuf {
        self.core
            .root
            .clone()
            .unwrap_or_else(|| home_dir.join(".claude"))
    }
}
