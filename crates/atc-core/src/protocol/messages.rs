//! Protocol message types

use serde::{Deserialize, Serialize};

/// A decoded inbox payload
///
/// Serialized form is internally tagged: `{"type": "<snake_case>", ...fields}`.
/// Only `requestId` (and the `approved`/`allow` verdicts and `taskId`) are
/// required on decode; every other field may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredMessage {
    TaskAssignment(TaskAssignment),
    TaskCompleted(TaskCompleted),
    ShutdownRequest(ShutdownRequest),
    ShutdownApproved(ShutdownApproved),
    IdleNotification(IdleNotification),
    PlanApprovalRequest(PlanApprovalRequest),
    PlanApprovalResponse(PlanApprovalResponse),
    PermissionRequest(PermissionRequest),
    PermissionResponse(PermissionResponse),
    SandboxPermissionRequest(SandboxPermissionRequest),
    SandboxPermissionResponse(SandboxPermissionResponse),
    /// Prose, or anything that failed to decode. Encodes as the raw text.
    #[serde(skip)]
    PlainText { text: String },
}

/// Discriminants accepted by the decoder.
pub(crate) const KNOWN_TYPES: [&str; 11] = [
    "task_assignment",
    "task_completed",
    "shutdown_request",
    "shutdown_approved",
    "idle_notification",
    "plan_approval_request",
    "plan_approval_response",
    "permission_request",
    "permission_response",
    "sandbox_permission_request",
    "sandbox_permission_response",
];

impl StructuredMessage {
    /// The wire discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            StructuredMessage::TaskAssignment(_) => "task_assignment",
            StructuredMessage::TaskCompleted(_) => "task_completed",
            StructuredMessage::ShutdownRequest(_) => "shutdown_request",
            StructuredMessage::ShutdownApproved(_) => "shutdown_approved",
            StructuredMessage::IdleNotification(_) => "idle_notification",
            StructuredMessage::PlanApprovalRequest(_) => "plan_approval_request",
            StructuredMessage::PlanApprovalResponse(_) => "plan_approval_response",
            StructuredMessage::PermissionRequest(_) => "permission_request",
            StructuredMessage::PermissionResponse(_) => "permission_response",
            StructuredMessage::SandboxPermissionRequest(_) => "sandbox_permission_request",
            StructuredMessage::SandboxPermissionResponse(_) => "sandbox_permission_response",
            StructuredMessage::PlainText { .. } => "plain_text",
        }
    }

    /// Correlation id carried by request and response variants.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            StructuredMessage::ShutdownRequest(m) => Some(&m.request_id),
            StructuredMessage::ShutdownApproved(m) => Some(&m.request_id),
            StructuredMessage::PlanApprovalRequest(m) => Some(&m.request_id),
            StructuredMessage::PlanApprovalResponse(m) => Some(&m.request_id),
            StructuredMessage::PermissionRequest(m) => Some(&m.request_id),
            StructuredMessage::PermissionResponse(m) => Some(&m.request_id),
            StructuredMessage::SandboxPermissionRequest(m) => Some(&m.request_id),
            StructuredMessage::SandboxPermissionResponse(m) => Some(&m.request_id),
            _ => None,
        }
    }

    /// Sender named inside the payload, when the variant carries one.
    pub fn sender(&self) -> Option<&str> {
        let from = match self {
            StructuredMessage::TaskCompleted(m) => &m.from,
            StructuredMessage::ShutdownRequest(m) => &m.from,
            StructuredMessage::ShutdownApproved(m) => &m.from,
            StructuredMessage::IdleNotification(m) => &m.from,
            StructuredMessage::PlanApprovalRequest(m) => &m.from,
            StructuredMessage::PermissionRequest(m) => &m.from,
            StructuredMessage::SandboxPermissionRequest(m) => &m.from,
            _ => return None,
        };
        from.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompleted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownApproved {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A worker finished its turn and awaits input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanApprovalRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanApprovalResponse {
    pub request_id: String,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A worker asks to run a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    pub request_id: String,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPermissionRequest {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPermissionResponse {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
