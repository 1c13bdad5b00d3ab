//! Worker process lifecycle
//!
//! [`ProcessManager`] owns every worker process it starts: one monitor task
//! per child reaps it and reports the exit exactly once.

mod command;
mod manager;
mod signal;

pub use command::{CommandLine, Launcher, SpawnRequest};
pub use manager::{KILL_GRACE_PERIOD, ProcessExit, ProcessHandle, ProcessManager};
pub use signal::{Signal, is_pid_alive};

use thiserror::Error;

/// Errors raised when starting a worker
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be started
    #[error("Failed to spawn agent '{name}' ({program}): {source}")]
    Spawn {
        name: String,
        program: String,
        source: std::io::Error,
    },

    /// A live process is already tracked under this name
    #[error("Agent '{0}' is already running")]
    AlreadyRunning(String),

    /// Name is empty, reserved, or not a single path component
    #[error("Invalid agent name: {0:?}")]
    InvalidName(String),
}
