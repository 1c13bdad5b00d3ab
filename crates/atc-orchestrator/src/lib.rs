//! Team orchestration for worker CLI agents
//!
//! An [`Orchestrator`] spawns worker processes, talks to them through the
//! file mailboxes of `agent-team-controller-core`, and turns what they send
//! back into [`OrchestratorEvent`]s: readiness, idle notices, permission and
//! plan requests awaiting a verdict, shutdown approvals and process exits.
//!
//! ```no_run
//! use atc_orchestrator::{Orchestrator, OrchestratorOptions, SpawnAgentOptions};
//!
//! # async fn demo() -> Result<(), atc_orchestrator::OrchestratorError> {
//! let orch = Orchestrator::new(OrchestratorOptions::new("alpha", "/tmp/atc"));
//! orch.init().await?;
//! let mut events = orch.subscribe();
//! orch.spawn_agent(SpawnAgentOptions::new("w1")).await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! orch.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod correlation;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod poller;
pub mod process;
pub mod readiness;

pub use correlation::{CorrelationKind, CorrelationState, PendingCorrelation, Resolution};
pub use error::OrchestratorError;
pub use events::OrchestratorEvent;
pub use orchestrator::{
    AgentHandle, BroadcastReport, DeliveryStatus, Orchestrator, OrchestratorOptions,
    SpawnAgentOptions,
};
pub use process::{Launcher, ProcessError, ProcessManager, Signal};
