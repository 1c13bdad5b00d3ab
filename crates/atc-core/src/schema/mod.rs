//! Schema types for the team storage layout
//!
//! This module contains the data structures persisted under a team's storage
//! root. All types preserve unknown fields for forward compatibility.

mod agent_member;
mod inbox_message;
mod task;
mod team_config;

pub use agent_member::AgentMember;
pub use inbox_message::InboxMessage;
pub use task::{TaskItem, TaskStatus};
pub use team_config::TeamConfig;

/// Current time as an ISO 8601 UTC timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
