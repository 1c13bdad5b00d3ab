//! Core types and storage for agent-team-controller (atc)
//!
//! This crate provides the data structures and file-backed stores that a team
//! controller uses to coordinate worker agents through mailboxes under
//! `~/.claude/teams/` and `~/.claude/tasks/`.
//!
//! All schema types are designed to:
//! - Preserve unknown fields for forward compatibility
//! - Tolerate absent optional fields written by older peers
//! - Use camelCase on the wire
//!
//! The structured message protocol embedded in mailbox text lives in
//! [`protocol`]; the mailbox abstraction and its backends live in
//! [`mailbox`].

pub mod config;
pub mod home;
pub mod io;
pub mod logging;
pub mod mailbox;
pub mod paths;
pub mod protocol;
pub mod schema;
pub mod store;

pub use mailbox::{FileMailbox, Mailbox, MailboxError, MemoryMailbox};
pub use protocol::{StructuredMessage, decode, encode};
pub use schema::{AgentMember, InboxMessage, TaskItem, TaskStatus, TeamConfig};

/// Reserved member name of the synthetic controller in every team.
pub const CONTROLLER_NAME: &str = "controller";

/// Format an agent identity as `name@team`.
pub fn agent_id(name: &str, team: &str) -> String {
    format!("{name}@{team}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_joins_name_and_team() {
        assert_eq!(agent_id("w1", "alpha"), "w1@alpha");
        assert_eq!(agent_id(CONTROLLER_NAME, "alpha"), "controller@alpha");
    }
}
