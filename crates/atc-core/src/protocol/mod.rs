//! Structured message protocol embedded in inbox `text`
//!
//! Workers and the controller exchange a closed vocabulary of JSON documents
//! tagged by a `type` discriminant, written as the `text` of an
//! [`InboxMessage`](crate::schema::InboxMessage). Anything that is not one of
//! those documents is carried as [`StructuredMessage::PlainText`].

mod codec;
mod messages;

pub use codec::{decode, decode_text, encode};
pub use messages::{
    IdleNotification, PermissionRequest, PermissionResponse, PlanApprovalRequest,
    PlanApprovalResponse, SandboxPermissionRequest, SandboxPermissionResponse, ShutdownApproved,
    ShutdownRequest, StructuredMessage, TaskAssignment, TaskCompleted,
};
