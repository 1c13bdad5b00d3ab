//! Events published by the orchestrator

use agent_team_controller_core::InboxMessage;
use agent_team_controller_core::protocol::{
    IdleNotification, PermissionRequest, PlanApprovalRequest, ShutdownApproved,
};
use serde::Serialize;

/// One observable occurrence, serialized as `{"event": "<name>", ...payload}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum OrchestratorEvent {
    #[serde(rename = "agent:spawned")]
    AgentSpawned {
        agent_name: String,
        agent_id: String,
        pid: Option<u32>,
    },

    #[serde(rename = "agent:exited")]
    AgentExited {
        agent_name: String,
        exit_code: Option<i32>,
    },

    /// Any inbox entry without a dedicated event, passed through raw
    #[serde(rename = "message")]
    Message {
        agent_name: String,
        message: InboxMessage,
    },

    #[serde(rename = "idle")]
    Idle {
        agent_name: String,
        details: IdleNotification,
    },

    #[serde(rename = "shutdown:approved")]
    ShutdownApproved {
        agent_name: String,
        message: ShutdownApproved,
    },

    #[serde(rename = "plan:approval_request")]
    PlanApprovalRequest {
        agent_name: String,
        message: PlanApprovalRequest,
    },

    #[serde(rename = "permission:request")]
    PermissionRequest {
        agent_name: String,
        message: PermissionRequest,
    },
}

impl OrchestratorEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::AgentSpawned { .. } => "agent:spawned",
            OrchestratorEvent::AgentExited { .. } => "agent:exited",
            OrchestratorEvent::Message { .. } => "message",
            OrchestratorEvent::Idle { .. } => "idle",
            OrchestratorEvent::ShutdownApproved { .. } => "shutdown:approved",
            OrchestratorEvent::PlanApprovalRequest { .. } => "plan:approval_request",
            OrchestratorEvent::PermissionRequest { .. } => "permission:request",
        }
    }

    pub fn agent_name(&self) -> &str {
        match self {
            OrchestratorEvent::AgentSpawned { agent_name, .. }
            | OrchestratorEvent::AgentExited { agent_name, .. }
            | OrchestratorEvent::Message { agent_name, .. }
            | OrchestratorEvent::Idle { agent_name, .. }
            | OrchestratorEvent::ShutdownApproved { agent_name, .. }
            | OrchestratorEvent::PlanApprovalRequest { agent_name, .. }
            | OrchestratorEvent::PermissionRequest { agent_name, .. } => agent_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_json_shape() {
        let event = OrchestratorEvent::AgentExited {
            agent_name: "w1".into(),
            exit_code: None,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "agent:exited", "agentName": "w1", "exitCode": null})
        );
        assert_eq!(event.name(), "agent:exited");
        assert_eq!(event.agent_name(), "w1");
    }

    #[test]
    fn test_permission_event_carries_payload() {
        let event = OrchestratorEvent::PermissionRequest {
            agent_name: "w1".into(),
            message: PermissionRequest {
                request_id: "r1".into(),
                tool_name: Some("Bash".into()),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "permission:request");
        assert_eq!(value["message"]["requestId"], "r1");
        assert_eq!(value["message"]["toolName"], "Bash");
    }
}
