//! Team configuration schema

use super::AgentMember;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Team configuration
///
/// Stored at `<root>/teams/{team_name}/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    /// Team name (matches directory name)
    pub name: String,

    /// Human-readable team purpose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unix timestamp in milliseconds when team was created
    #[serde(default)]
    pub created_at: u64,

    /// Lead agent ID (format: "controller@{team_name}")
    pub lead_agent_id: String,

    /// UUID of session that created the team
    pub lead_session_id: String,

    /// Team members, controller first
    #[serde(default)]
    pub members: Vec<AgentMember>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl TeamConfig {
    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&AgentMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Insert a member, replacing any existing member with the same name in place.
    pub fn upsert_member(&mut self, member: AgentMember) {
        match self.members.iter_mut().find(|m| m.name == member.name) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TeamConfig {
        serde_json::from_str(
            r#"{
                "name": "alpha",
                "createdAt": 1770765919076,
                "leadAgentId": "controller@alpha",
                "leadSessionId": "6075f866-f103-4be1-b2e9-8dbf66009eb9",
                "members": []
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_team_config_roundtrip_minimal() {
        let config = config();
        assert_eq!(config.name, "alpha");
        assert_eq!(config.lead_agent_id, "controller@alpha");
        assert!(config.description.is_none());

        let serialized = serde_json::to_string(&config).unwrap();
        assert!(serialized.contains("\"leadAgentId\""));
        let reparsed: TeamConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_team_config_preserves_unknown_fields() {
        let json = r#"{
            "name": "alpha",
            "createdAt": 1,
            "leadAgentId": "controller@alpha",
            "leadSessionId": "s",
            "members": [],
            "futureFeature": {"nested": "data"}
        }"#;
        let config: TeamConfig = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["futureFeature"]["nested"], "data");
    }

    #[test]
    fn test_upsert_member_replaces_in_place() {
        let mut config = config();
        config.upsert_member(AgentMember::new("controller", "alpha", "controller"));
        config.upsert_member(AgentMember::new("w1", "alpha", "general-purpose"));
        config.upsert_member(AgentMember::new("w1", "alpha", "Plan"));

        assert_eq!(config.members.len(), 2);
        assert_eq!(config.members[0].name, "controller");
        assert_eq!(config.member("w1").unwrap().agent_type, "Plan");
        assert!(config.member("w2").is_none());
    }
}
