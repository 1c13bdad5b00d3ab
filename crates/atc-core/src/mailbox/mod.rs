//! Per-agent mailboxes
//!
//! A mailbox is an append-only log of [`InboxMessage`] entries with exactly
//! one logical reader. [`Mailbox::read_unread`] is the read-and-mark-read
//! primitive: every unread entry is returned exactly once.

mod file;
mod memory;

pub use file::FileMailbox;
pub use memory::MemoryMailbox;

use crate::io::InboxError;
use crate::schema::InboxMessage;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by mailbox backends
#[derive(Debug, Error)]
pub enum MailboxError {
    /// Team or agent mailbox does not exist
    #[error("Mailbox not found: {agent}@{team}")]
    NotFound { team: String, agent: String },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mailbox document is not a valid message array
    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Another process held the mailbox lock for too long
    #[error("Timed out waiting for lock on {path}")]
    LockTimeout { path: PathBuf },
}

impl MailboxError {
    fn from_inbox(team: &str, agent: &str, err: InboxError) -> Self {
        match err {
            InboxError::NotFound { .. } => MailboxError::NotFound {
                team: team.to_string(),
                agent: agent.to_string(),
            },
            InboxError::LockTimeout { path, .. } => MailboxError::LockTimeout { path },
            InboxError::Io { path, source } => MailboxError::Io { path, source },
            InboxError::Json { path, source } => MailboxError::Json { path, source },
            InboxError::InvalidPath { path } => MailboxError::Io {
                path,
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            },
        }
    }

    /// Whether this is a [`MailboxError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, MailboxError::NotFound { .. })
    }
}

/// Storage backend for team mailboxes
///
/// Implementations are synchronous; async callers run them on a blocking
/// pool.
pub trait Mailbox: Send + Sync {
    /// Append `entry` (stored unread) to `agent`'s mailbox, creating it if needed.
    fn write(&self, team: &str, agent: &str, entry: &InboxMessage) -> Result<(), MailboxError>;

    /// Every entry in append order.
    fn read_all(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, MailboxError>;

    /// Unread entries in append order, marked read in the same step.
    fn read_unread(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, MailboxError>;

    /// Create an empty mailbox if missing.
    fn ensure_inbox(&self, team: &str, agent: &str) -> Result<(), MailboxError>;

    /// Delete every mailbox of `team`. Missing teams are not an error.
    fn remove_team(&self, team: &str) -> Result<(), MailboxError>;
}
