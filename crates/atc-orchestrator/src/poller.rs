//! Periodic drain of the controller's mailbox

use agent_team_controller_core::protocol::{StructuredMessage, decode};
use agent_team_controller_core::{InboxMessage, Mailbox, MailboxError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives each drained entry, in mailbox order
pub trait InboxSink: Send + Sync {
    fn deliver(&self, envelope: InboxMessage, decoded: StructuredMessage);
}

/// Drains one mailbox on a fixed interval
///
/// Ticks never overlap: the loop awaits each tick before scheduling the next,
/// and [`InboxPoller::poll_once`] shares the same tick lock.
pub struct InboxPoller {
    mailbox: Arc<dyn Mailbox>,
    team: String,
    agent: String,
    interval: Duration,
    sink: Arc<dyn InboxSink>,
    tick_lock: tokio::sync::Mutex<()>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl InboxPoller {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        team: impl Into<String>,
        agent: impl Into<String>,
        interval: Duration,
        sink: Arc<dyn InboxSink>,
    ) -> Self {
        Self {
            mailbox,
            team: team.into(),
            agent: agent.into(),
            interval,
            sink,
            tick_lock: tokio::sync::Mutex::new(()),
            task: Mutex::new(None),
        }
    }

    /// Run one tick: drain unread entries and deliver them. Returns the count.
    pub async fn poll_once(&self) -> Result<usize, MailboxError> {
        let _tick = self.tick_lock.lock().await;

        let mailbox = Arc::clone(&self.mailbox);
        let (team, agent) = (self.team.clone(), self.agent.clone());
        let entries = tokio::task::spawn_blocking(move || mailbox.read_unread(&team, &agent))
            .await
            .map_err(|e| MailboxError::Io {
                path: self.agent.clone().into(),
                source: std::io::Error::other(e),
            })??;

        let count = entries.len();
        for envelope in entries {
            let decoded = decode(&envelope);
            debug!(from = %envelope.from, kind = decoded.kind(), "Delivering inbox entry");
            self.sink.deliver(envelope, decoded);
        }
        Ok(count)
    }

    /// Start the background loop; the first tick fires one interval from now.
    /// No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let poller = Arc::clone(self);
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            info!(team = %poller.team, agent = %poller.agent, interval = ?poller.interval, "Inbox poller started");
            let mut ticker = interval_at(Instant::now() + poller.interval, poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = poller.poll_once().await {
                            warn!(team = %poller.team, agent = %poller.agent, "Inbox poll failed: {e}");
                        }
                    }
                    _ = loop_cancel.cancelled() => {
                        info!(team = %poller.team, "Inbox poller stopped");
                        break;
                    }
                }
            }
        });
        *task = Some((cancel, handle));
    }

    /// Stop the loop and wait for an in-flight tick to finish. No-op if stopped.
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("Inbox poller task failed: {e}");
            }
        }
    }

    /// Signal the loop to stop without waiting for it.
    pub fn cancel(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((cancel, _)) = task {
            cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_team_controller_core::MemoryMailbox;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, &'static str)>>);

    impl InboxSink for Collect {
        fn deliver(&self, envelope: InboxMessage, decoded: StructuredMessage) {
            self.0.lock().unwrap().push((envelope.text, decoded.kind()));
        }
    }

    fn poller(mailbox: Arc<MemoryMailbox>, sink: Arc<Collect>, interval: Duration) -> Arc<InboxPoller> {
        Arc::new(InboxPoller::new(mailbox, "alpha", "controller", interval, sink))
    }

    #[tokio::test]
    async fn test_poll_once_delivers_in_order_exactly_once() {
        let mailbox = Arc::new(MemoryMailbox::new());
        let sink = Arc::new(Collect::default());
        let p = poller(Arc::clone(&mailbox), Arc::clone(&sink), Duration::from_secs(60));

        mailbox.write("alpha", "controller", &InboxMessage::new("w1", "first")).unwrap();
        mailbox
            .write(
                "alpha",
                "controller",
                &InboxMessage::new("w1", r#"{"type":"idle_notification","from":"w1"}"#),
            )
            .unwrap();

        assert_eq!(p.poll_once().await.unwrap(), 2);
        assert_eq!(p.poll_once().await.unwrap(), 0);

        let seen = sink.0.lock().unwrap().clone();
        assert_eq!(seen[0], ("first".to_string(), "plain_text"));
        assert_eq!(seen[1].1, "idle_notification");
    }

    #[tokio::test]
    async fn test_missing_mailbox_is_an_error_not_a_panic() {
        let mailbox = Arc::new(MemoryMailbox::new());
        let sink = Arc::new(Collect::default());
        let p = poller(mailbox, sink, Duration::from_secs(60));

        let err = p.poll_once().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent_and_loop_delivers() {
        let mailbox = Arc::new(MemoryMailbox::new());
        mailbox.ensure_inbox("alpha", "controller").unwrap();
        let sink = Arc::new(Collect::default());
        let p = poller(Arc::clone(&mailbox), Arc::clone(&sink), Duration::from_millis(10));

        p.start();
        p.start();
        assert!(p.is_running());

        mailbox.write("alpha", "controller", &InboxMessage::new("w1", "hello")).unwrap();
        for _ in 0..200 {
            if !sink.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        p.stop().await;
        p.stop().await;
        assert!(!p.is_running());
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }
}
