//! Request/response correlation tracking
//!
//! Worker requests that need a controller verdict (tool permission, plan
//! approval) are tracked by `requestId`. Each one moves from
//! [`CorrelationState::Requested`] to [`CorrelationState::Resolved`] exactly
//! once; later resolutions are ignored.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// What kind of verdict a correlation is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    Permission,
    PlanApproval,
}

/// Final outcome of a correlation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Resolution {
    Approved,
    Rejected { feedback: Option<String> },
    /// The requesting agent exited before a verdict was sent
    Cancelled { exit_code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationState {
    Requested,
    Resolved(Resolution),
}

impl CorrelationState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, CorrelationState::Resolved(_))
    }
}

/// Snapshot of one tracked request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCorrelation {
    pub request_id: String,
    pub kind: CorrelationKind,
    /// Agent that sent the request
    pub agent_name: String,
    pub opened_at: String,
    pub state: CorrelationState,
}

/// Result of [`CorrelationMap::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    AlreadyResolved,
    Unknown,
}

struct Slot {
    request_id: String,
    kind: CorrelationKind,
    agent_name: String,
    opened_at: String,
    state: watch::Sender<CorrelationState>,
}

impl Slot {
    fn snapshot(&self) -> PendingCorrelation {
        PendingCorrelation {
            request_id: self.request_id.clone(),
            kind: self.kind,
            agent_name: self.agent_name.clone(),
            opened_at: self.opened_at.clone(),
            state: self.state.borrow().clone(),
        }
    }
}

/// Correlations keyed by `requestId`
///
/// Resolved slots are kept so repeated responses stay no-ops; the owner drops
/// them with [`CorrelationMap::remove_resolved`] when the team shuts down.
#[derive(Default)]
pub struct CorrelationMap {
    slots: Mutex<HashMap<String, Slot>>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new request. A repeated `request_id` keeps the first entry and
    /// returns `false`.
    pub fn open(&self, request_id: &str, kind: CorrelationKind, agent_name: &str) -> bool {
        let mut slots = self.slots();
        if slots.contains_key(request_id) {
            debug!(request_id, "Duplicate request ignored");
            return false;
        }
        let (state, _) = watch::channel(CorrelationState::Requested);
        slots.insert(
            request_id.to_string(),
            Slot {
                request_id: request_id.to_string(),
                kind,
                agent_name: agent_name.to_string(),
                opened_at: agent_team_controller_core::schema::now_timestamp(),
                state,
            },
        );
        true
    }

    /// Move a request to `Resolved`. Only the first call has an effect.
    pub fn resolve(&self, request_id: &str, resolution: Resolution) -> ResolveOutcome {
        let slots = self.slots();
        let Some(slot) = slots.get(request_id) else {
            return ResolveOutcome::Unknown;
        };
        let changed = slot.state.send_if_modified(|state| {
            if state.is_resolved() {
                return false;
            }
            *state = CorrelationState::Resolved(resolution);
            true
        });
        if changed {
            ResolveOutcome::Resolved
        } else {
            ResolveOutcome::AlreadyResolved
        }
    }

    /// Cancel every open request from `agent_name`. Returns how many changed.
    pub fn cancel_for_agent(&self, agent_name: &str, exit_code: Option<i32>) -> usize {
        let slots = self.slots();
        slots
            .values()
            .filter(|slot| slot.agent_name == agent_name)
            .filter(|slot| {
                slot.state.send_if_modified(|state| {
                    if state.is_resolved() {
                        return false;
                    }
                    *state = CorrelationState::Resolved(Resolution::Cancelled { exit_code });
                    true
                })
            })
            .count()
    }

    pub fn state(&self, request_id: &str) -> Option<CorrelationState> {
        self.slots()
            .get(request_id)
            .map(|slot| slot.state.borrow().clone())
    }

    pub fn get(&self, request_id: &str) -> Option<PendingCorrelation> {
        self.slots().get(request_id).map(Slot::snapshot)
    }

    /// Open requests, oldest first.
    pub fn pending(&self) -> Vec<PendingCorrelation> {
        let mut open: Vec<PendingCorrelation> = self
            .slots()
            .values()
            .filter(|slot| !slot.state.borrow().is_resolved())
            .map(Slot::snapshot)
            .collect();
        open.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        open
    }

    /// Drop every resolved slot. Returns how many were removed.
    pub fn remove_resolved(&self) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| !slot.state.borrow().is_resolved());
        before - slots.len()
    }

    /// Wait until `request_id` resolves. `None` if it was never opened.
    pub async fn wait(&self, request_id: &str) -> Option<Resolution> {
        let mut rx = self.slots().get(request_id)?.state.subscribe();
        let state = rx.wait_for(CorrelationState::is_resolved).await.ok()?;
        match &*state {
            CorrelationState::Resolved(resolution) => Some(resolution.clone()),
            CorrelationState::Requested => None,
        }
    }
}
