//! Agent member schema for team configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Agent member in a team
///
/// Represents a single agent in the team's member list within the team config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMember {
    /// Unique agent identifier (format: "{name}@{team_name}")
    pub agent_id: String,

    /// Agent instance name (unique within team)
    pub name: String,

    /// Agent capability type (e.g., "general-purpose", "Explore", "Plan")
    pub agent_type: String,

    /// Model identifier
    #[serde(default)]
    pub model: String,

    /// Custom prompt for specialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// UI color code (e.g., "blue", "green", "yellow")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Whether plan mode is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_mode_required: Option<bool>,

    /// Unix timestamp in milliseconds when agent joined
    pub joined_at: u64,

    /// Terminal pane ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_pane_id: Option<String>,

    /// Current working directory of agent
    #[serde(default)]
    pub cwd: String,

    /// Notification subscriptions (usually empty array)
    #[serde(default)]
    pub subscriptions: Vec<serde_json::Value>,

    /// Backend hosting the agent (e.g., "tmux", "in-process")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,

    /// Whether agent is currently running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl AgentMember {
    /// Build a member with identity `name@team`, joined now.
    pub fn new(name: &str, team: &str, agent_type: &str) -> Self {
        Self {
            agent_id: crate::agent_id(name, team),
            name: name.to_string(),
            agent_type: agent_type.to_string(),
            model: String::new(),
            prompt: None,
            color: None,
            plan_mode_required: None,
            joined_at: super::now_millis(),
            tmux_pane_id: None,
            cwd: String::new(),
            subscriptions: Vec::new(),
            backend_type: None,
            is_active: None,
            unknown_fields: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_identity() {
        let member = AgentMember::new("w1", "alpha", "general-purpose");
        assert_eq!(member.agent_id, "w1@alpha");
        assert_eq!(member.name, "w1");
        assert!(member.joined_at > 0);
    }

    #[test]
    fn test_member_tolerates_absent_optional_fields() {
        let json = r#"{
            "agentId": "w1@alpha",
            "name": "w1",
            "agentType": "general-purpose",
            "joinedAt": 1770765919076
        }"#;
        let member: AgentMember = serde_json::from_str(json).unwrap();
        assert_eq!(member.model, "");
        assert_eq!(member.cwd, "");
        assert!(member.subscriptions.is_empty());
        assert!(member.backend_type.is_none());
    }

    #[test]
    fn test_member_serializes_camel_case_and_preserves_unknown() {
        let json = r#"{
            "agentId": "w1@alpha",
            "name": "w1",
            "agentType": "Plan",
            "model": "m",
            "color": "green",
            "planModeRequired": true,
            "joinedAt": 1,
            "tmuxPaneId": "%3",
            "cwd": "/work",
            "subscriptions": [],
            "backendType": "in-process",
            "isActive": true,
            "lastActive": 99
        }"#;
        let member: AgentMember = serde_json::from_str(json).unwrap();
        assert_eq!(member.plan_mode_required, Some(true));
        assert_eq!(member.unknown_fields.get("lastActive"), Some(&serde_json::json!(99)));

        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value["agentId"], "w1@alpha");
        assert_eq!(value["tmuxPaneId"], "%3");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["lastActive"], 99);
    }
}
