//! Task schema types for agent team coordination

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Task status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created but not started
    Pending,
    /// Task currently being worked on
    InProgress,
    /// Task finished successfully
    Completed,
    /// Task cancelled or removed
    Deleted,
}

/// Task item for team coordination
///
/// Stored at `<root>/tasks/{team_name}/{id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    /// Unique task identifier (sequential string: "1", "2", "3")
    pub id: String,

    /// Brief imperative title (e.g., "Fix CI failure in backend")
    pub subject: String,

    /// Detailed requirements and acceptance criteria
    #[serde(default)]
    pub description: String,

    /// Present continuous form shown while in_progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,

    /// Current task status
    pub status: TaskStatus,

    /// Agent name assigned to this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Task IDs that depend on this task completing
    #[serde(default)]
    pub blocks: Vec<String>,

    /// Task IDs that must complete before this task can start
    #[serde(default)]
    pub blocked_by: Vec<String>,

    /// Custom key-value pairs for tracking
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// ISO 8601 timestamp when task was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// ISO 8601 timestamp when task was last updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}
