//! Agent readiness tracking

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;

/// Readiness of a spawned agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Starting,
    Ready,
    /// Exited while still starting
    Exited { exit_code: Option<i32> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("Agent '{0}' was never spawned")]
    Unknown(String),

    #[error("Agent '{name}' exited before becoming ready (exit code {exit_code:?})")]
    AgentExited { name: String, exit_code: Option<i32> },
}

/// Per-agent readiness, awaitable
///
/// An agent leaves `Starting` once: to `Ready` on its first sign of life, or
/// to `Exited` if the process ends first. Re-registering a name starts over.
#[derive(Default)]
pub struct ReadinessTracker {
    agents: Mutex<HashMap<String, watch::Sender<Readiness>>>,
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn agents(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<Readiness>>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin tracking `name` as `Starting`.
    pub fn register(&self, name: &str) {
        let mut agents = self.agents();
        match agents.get(name) {
            Some(tx) => {
                tx.send_replace(Readiness::Starting);
            }
            None => {
                let (tx, _) = watch::channel(Readiness::Starting);
                agents.insert(name.to_string(), tx);
            }
        }
    }

    /// Returns `true` if this call moved the agent to `Ready`.
    pub fn mark_ready(&self, name: &str) -> bool {
        self.transition(name, Readiness::Ready)
    }

    /// Returns `true` if the agent was still starting.
    pub fn mark_exited(&self, name: &str, exit_code: Option<i32>) -> bool {
        self.transition(name, Readiness::Exited { exit_code })
    }

    fn transition(&self, name: &str, next: Readiness) -> bool {
        self.agents().get(name).is_some_and(|tx| {
            tx.send_if_modified(|state| {
                if *state != Readiness::Starting {
                    return false;
                }
                *state = next;
                true
            })
        })
    }

    pub fn get(&self, name: &str) -> Option<Readiness> {
        self.agents().get(name).map(|tx| *tx.borrow())
    }

    pub fn remove(&self, name: &str) {
        self.agents().remove(name);
    }

    /// Wait until `name` is ready, failing if it exits first.
    pub async fn await_ready(&self, name: &str) -> Result<(), ReadinessError> {
        let mut rx = self
            .agents()
            .get(name)
            .map(watch::Sender::subscribe)
            .ok_or_else(|| ReadinessError::Unknown(name.to_string()))?;

        let state = match rx.wait_for(|state| *state != Readiness::Starting).await {
            Ok(state) => *state,
            Err(_) => return Err(ReadinessError::Unknown(name.to_string())),
        };
        match state {
            Readiness::Ready => Ok(()),
            Readiness::Exited { exit_code } => Err(ReadinessError::AgentExited {
                name: name.to_string(),
                exit_code,
            }),
            Readiness::Starting => Err(ReadinessError::Unknown(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ready_resolves_waiter() {
        let tracker = Arc::new(ReadinessTracker::new());
        tracker.register("w1");

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.await_ready("w1").await })
        };
        tokio::task::yield_now().await;
        assert!(tracker.mark_ready("w1"));
        assert!(!tracker.mark_ready("w1"));

        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_exit_before_ready_fails_waiter() {
        let tracker = ReadinessTracker::new();
        tracker.register("w1");
        assert!(tracker.mark_exited("w1", Some(2)));

        assert_eq!(
            tracker.await_ready("w1").await,
            Err(ReadinessError::AgentExited {
                name: "w1".into(),
                exit_code: Some(2)
            })
        );
    }

    #[tokio::test]
    async fn test_exit_after_ready_stays_ready() {
        let tracker = ReadinessTracker::new();
        tracker.register("w1");
        tracker.mark_ready("w1");
        assert!(!tracker.mark_exited("w1", Some(0)));
        assert_eq!(tracker.get("w1"), Some(Readiness::Ready));
        assert_eq!(tracker.await_ready("w1").await, Ok(()));
    }

    #[tokio::test]
    async fn test_unknown_and_reregister() {
        let tracker = ReadinessTracker::new();
        assert_eq!(
            tracker.await_ready("ghost").await,
            Err(ReadinessError::Unknown("ghost".into()))
        );

        tracker.register("w1");
        tracker.mark_exited("w1", None);
        tracker.register("w1");
        assert_eq!(tracker.get("w1"), Some(Readiness::Starting));

        let pending =
            tokio::time::timeout(Duration::from_millis(20), tracker.await_ready("w1")).await;
        assert!(pending.is_err());
    }
}
