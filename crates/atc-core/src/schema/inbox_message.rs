//! Inbox message schema for agent team communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message in an agent's inbox
///
/// Messages are stored in `<root>/teams/{team_name}/inboxes/{agent_name}.json`
/// as an array of InboxMessage objects. `text` is either prose or a JSON
/// document tagged by `type` (see [`crate::protocol`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Sender agent name
    pub from: String,

    /// Message content
    pub text: String,

    /// ISO 8601 UTC timestamp
    pub timestamp: String,

    /// Whether the message has been read
    #[serde(default)]
    pub read: bool,

    /// Sender's UI color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Brief summary (5-10 words)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl InboxMessage {
    /// Build an unread message stamped with the current time.
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            timestamp: super::now_timestamp(),
            read: false,
            color: None,
            summary: None,
            unknown_fields: HashMap::new(),
        }
    }

    /// Attach a summary.
    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    /// Identity used when merging concurrent writes.
    pub fn same_entry(&self, other: &InboxMessage) -> bool {
        self.from == other.from && self.text == other.text && self.timestamp == other.timestamp
    }
}
