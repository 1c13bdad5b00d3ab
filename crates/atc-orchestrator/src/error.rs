//! Error type for orchestrator operations

use crate::process::ProcessError;
use agent_team_controller_core::MailboxError;
use agent_team_controller_core::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`crate::Orchestrator`] operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// `init` called on an initialized instance
    #[error("Orchestrator for team '{0}' is already initialized")]
    AlreadyInitialized(String),

    /// Operation called before `init`
    #[error("Orchestrator for team '{0}' is not initialized")]
    NotInitialized(String),

    /// Operation called after `shutdown`
    #[error("Orchestrator for team '{0}' has shut down")]
    ShutDown(String),

    /// Team member, agent or correlation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Worker process could not be started
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Mailbox read or write failed
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    /// Team or task store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Agent exited before becoming ready
    #[error("Agent '{name}' exited before becoming ready (exit code {exit_code:?})")]
    AgentExited { name: String, exit_code: Option<i32> },

    /// Caller-imposed wait elapsed
    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    /// A blocking storage task panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl OrchestratorError {
    /// Whether this error means the named thing does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            OrchestratorError::NotFound(_) => true,
            OrchestratorError::Mailbox(e) => e.is_not_found(),
            OrchestratorError::Store(StoreError::NotFound(_)) => true,
            _ => false,
        }
    }
}
