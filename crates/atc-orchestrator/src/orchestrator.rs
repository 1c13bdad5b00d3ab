//! Team orchestrator
//!
//! [`Orchestrator`] ties the pieces together: the team and task stores, the
//! mailbox, the process table, the controller's inbox poller, and the
//! correlation and readiness state derived from what workers send back.
//!
//! Every operation that touches storage runs on the blocking pool, so a slow
//! disk never stalls the poller or other callers.

use crate::correlation::{
    CorrelationKind, CorrelationMap, CorrelationState, PendingCorrelation, Resolution,
};
use crate::error::OrchestratorError;
use crate::events::OrchestratorEvent;
use crate::poller::{InboxPoller, InboxSink};
use crate::process::{
    KILL_GRACE_PERIOD, Launcher, ProcessError, ProcessExit, ProcessHandle, ProcessManager,
    Signal, SpawnRequest,
};
use crate::readiness::{ReadinessError, ReadinessTracker};
use agent_team_controller_core::config::Config;
use agent_team_controller_core::paths::{StorageLayout, is_valid_name};
use agent_team_controller_core::protocol::{
    PermissionResponse, PlanApprovalResponse, ShutdownRequest, TaskAssignment, encode,
};
use agent_team_controller_core::schema::now_timestamp;
use agent_team_controller_core::store::{NewTask, TaskStore, TeamStore};
use agent_team_controller_core::{
    AgentMember, CONTROLLER_NAME, FileMailbox, InboxMessage, Mailbox, MailboxError,
    StructuredMessage, TaskItem, TaskStatus, TeamConfig,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the event channel; slow subscribers observe `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Agent type recorded for the controller member.
const CONTROLLER_AGENT_TYPE: &str = "team-lead";

/// Agent type recorded when a spawn does not name one.
const DEFAULT_AGENT_TYPE: &str = "general-purpose";

/// Construction parameters for an [`Orchestrator`]
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub team: String,
    /// Storage root holding `teams/` and `tasks/`
    pub root: PathBuf,
    pub launcher: Launcher,
    pub poll_interval: Duration,
    /// Treat a successful spawn as readiness
    pub spawn_counts_as_ready: bool,
    pub kill_grace_period: Duration,
    pub description: Option<String>,
}

impl OrchestratorOptions {
    pub fn new(team: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            team: team.into(),
            root: root.into(),
            launcher: Launcher::new("claude"),
            poll_interval: Duration::from_millis(500),
            spawn_counts_as_ready: true,
            kill_grace_period: KILL_GRACE_PERIOD,
            description: None,
        }
    }

    /// Options from resolved configuration; `team` overrides `core.default_team`.
    pub fn from_config(config: &Config, team: Option<&str>, home_dir: &Path) -> Self {
        let team = team.unwrap_or(&config.core.default_team);
        Self {
            launcher: Launcher::from_config(&config.worker),
            poll_interval: Duration::from_millis(config.poller.interval_ms.max(1)),
            spawn_counts_as_ready: config.readiness.spawn_counts_as_ready,
            ..Self::new(team, config.storage_root(home_dir))
        }
    }
}

/// Per-agent spawn parameters
#[derive(Debug, Clone, Default)]
pub struct SpawnAgentOptions {
    pub name: String,
    pub agent_type: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub prompt: Option<String>,
    pub permission_mode: Option<String>,
    pub plan_mode_required: Option<bool>,
    pub allowed_tools: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub extra_args: Vec<String>,
}

impl SpawnAgentOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A spawned team member
#[derive(Debug, Clone)]
pub struct AgentHandle {
    pub name: String,
    pub agent_id: String,
    pub pid: Option<u32>,
    process: ProcessHandle,
}

impl AgentHandle {
    /// Resolve once the process has exited and `agent:exited` was published.
    pub async fn wait(&self) {
        self.process.wait().await;
    }
}

/// Per-recipient result of a broadcast
#[derive(Debug)]
pub struct DeliveryStatus {
    pub agent_name: String,
    pub outcome: Result<(), MailboxError>,
}

/// Result of [`Orchestrator::broadcast`]
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub deliveries: Vec<DeliveryStatus>,
}

impl BroadcastReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeliveryStatus> {
        self.deliveries.iter().filter(|d| d.outcome.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Initializing,
    Running,
    ShutDown,
}

struct Inner {
    team: String,
    description: Option<String>,
    session_id: String,
    instance_tag: String,
    spawn_counts_as_ready: bool,
    mailbox: Arc<dyn Mailbox>,
    teams: TeamStore,
    tasks: TaskStore,
    processes: ProcessManager,
    poller: Arc<InboxPoller>,
    correlations: CorrelationMap,
    readiness: ReadinessTracker,
    events: broadcast::Sender<OrchestratorEvent>,
    /// Orders `agent:spawned` before the same process's `agent:exited`
    emit_lock: Mutex<()>,
    /// Exit code of each agent's last process, cleared when it is respawned
    exits: Mutex<HashMap<String, Option<i32>>>,
    lifecycle: Mutex<Lifecycle>,
    shutdown_seq: AtomicU64,
}

/// Controller for one team of worker agents
///
/// Cloning yields another handle to the same orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Dispatch(Weak<Inner>);

impl InboxSink for Dispatch {
    fn deliver(&self, envelope: InboxMessage, decoded: StructuredMessage) {
        if let Some(inner) = self.0.upgrade() {
            inner.dispatch(envelope, decoded);
        }
    }
}

impl Orchestrator {
    /// Orchestrator backed by file mailboxes under `options.root`.
    pub fn new(options: OrchestratorOptions) -> Self {
        let mailbox = Arc::new(FileMailbox::new(StorageLayout::new(&options.root)));
        Self::with_mailbox(options, mailbox)
    }

    /// Orchestrator using a caller-supplied mailbox backend.
    pub fn with_mailbox(options: OrchestratorOptions, mailbox: Arc<dyn Mailbox>) -> Self {
        let layout = StorageLayout::new(&options.root);
        let session_id = Uuid::new_v4().to_string();
        let instance_tag = session_id.split('-').next().unwrap_or("atc").to_string();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let processes =
            ProcessManager::new(options.launcher).with_grace_period(options.kill_grace_period);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let poller = Arc::new(InboxPoller::new(
                Arc::clone(&mailbox),
                options.team.clone(),
                CONTROLLER_NAME,
                options.poll_interval,
                Arc::new(Dispatch(weak.clone())),
            ));
            Inner {
                team: options.team,
                description: options.description,
                session_id,
                instance_tag,
                spawn_counts_as_ready: options.spawn_counts_as_ready,
                mailbox,
                teams: TeamStore::new(layout.clone()),
                tasks: TaskStore::new(layout),
                processes,
                poller,
                correlations: CorrelationMap::new(),
                readiness: ReadinessTracker::new(),
                events,
                emit_lock: Mutex::new(()),
                exits: Mutex::new(HashMap::new()),
                lifecycle: Mutex::new(Lifecycle::Created),
                shutdown_seq: AtomicU64::new(1),
            }
        });
        Self { inner }
    }

    pub fn team(&self) -> &str {
        &self.inner.team
    }

    /// Session id recorded as the team's `leadSessionId`.
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// `controller@<team>`
    pub fn lead_agent_id(&self) -> String {
        agent_team_controller_core::agent_id(CONTROLLER_NAME, &self.inner.team)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.inner.events.subscribe()
    }

    // ---- lifecycle ----

    /// Provision team storage, register the controller and start polling
    ///
    /// A failed init may be retried.
    pub async fn init(&self) -> Result<TeamConfig, OrchestratorError> {
        {
            let mut state = self.inner.lifecycle();
            match *state {
                Lifecycle::Created => *state = Lifecycle::Initializing,
                Lifecycle::ShutDown => return Err(self.inner.shut_down()),
                Lifecycle::Initializing | Lifecycle::Running => {
                    return Err(OrchestratorError::AlreadyInitialized(self.inner.team.clone()));
                }
            }
        }

        let inner = Arc::clone(&self.inner);
        let provisioned = blocking(move || inner.provision()).await;

        // State and poller change under one lock; a shutdown that landed
        // during provisioning wins.
        let outcome = {
            let mut state = self.inner.lifecycle();
            match (*state, provisioned) {
                (Lifecycle::ShutDown, _) => None,
                (_, Ok(config)) => {
                    *state = Lifecycle::Running;
                    self.inner.poller.start();
                    Some(Ok(config))
                }
                (_, Err(e)) => {
                    *state = Lifecycle::Created;
                    Some(Err(e))
                }
            }
        };

        let Some(result) = outcome else {
            warn!(team = %self.inner.team, "Shut down during init, removing provisioned storage");
            let inner = Arc::clone(&self.inner);
            if let Err(e) = blocking(move || inner.remove_storage()).await {
                warn!(team = %self.inner.team, "Cleanup after interrupted init failed: {e}");
            }
            return Err(self.inner.shut_down());
        };
        let config = result?;
        info!(team = %self.inner.team, lead = %config.lead_agent_id, "Orchestrator initialized");
        Ok(config)
    }

    /// Stop polling, kill every worker and delete the team's storage
    ///
    /// Idempotent. Storage cleanup attempts every step and reports the first
    /// failure.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        let previous = {
            let mut state = self.inner.lifecycle();
            std::mem::replace(&mut *state, Lifecycle::ShutDown)
        };
        match previous {
            Lifecycle::ShutDown => return Ok(()),
            Lifecycle::Created => {
                debug!(team = %self.inner.team, "Shutdown before init");
                return Ok(());
            }
            Lifecycle::Initializing | Lifecycle::Running => {}
        }

        info!(team = %self.inner.team, "Orchestrator shutting down");
        self.inner.poller.stop().await;
        self.inner.processes.kill_all().await;
        let pruned = self.inner.correlations.remove_resolved();
        debug!(team = %self.inner.team, pruned, "Dropped resolved requests");

        let inner = Arc::clone(&self.inner);
        blocking(move || inner.remove_storage()).await?;
        info!(team = %self.inner.team, "Orchestrator shut down");
        Ok(())
    }

    /// Run one poll tick now. Returns the number of entries dispatched.
    pub async fn poll_once(&self) -> Result<usize, OrchestratorError> {
        self.inner.ensure_running()?;
        Ok(self.inner.poller.poll_once().await?)
    }

    // ---- agents ----

    /// Register a member, create its mailbox and start its process
    ///
    /// `agent:spawned` is published before this returns. Re-spawning a name
    /// whose process has exited replaces the member's metadata.
    pub async fn spawn_agent(
        &self,
        options: SpawnAgentOptions,
    ) -> Result<AgentHandle, OrchestratorError> {
        self.inner.ensure_running()?;
        let name = options.name.clone();
        if !is_valid_name(&name) || name == CONTROLLER_NAME {
            return Err(ProcessError::InvalidName(name).into());
        }
        if self.inner.processes.is_running(&name) {
            return Err(ProcessError::AlreadyRunning(name).into());
        }

        let agent_id = agent_team_controller_core::agent_id(&name, &self.inner.team);
        let member = self.inner.member_for(&options);
        let inner = Arc::clone(&self.inner);
        let member_name = name.clone();
        blocking(move || {
            inner.teams.add_member(&inner.team, member)?;
            inner.mailbox.ensure_inbox(&inner.team, &member_name)?;
            Ok(())
        })
        .await?;

        let request = SpawnRequest {
            name: name.clone(),
            team: self.inner.team.clone(),
            agent_id: agent_id.clone(),
            agent_type: options.agent_type,
            color: options.color,
            parent_session_id: Some(self.inner.session_id.clone()),
            model: options.model,
            permission_mode: options.permission_mode,
            allowed_tools: options.allowed_tools,
            cwd: options.cwd,
            env: options.env,
            extra_args: options.extra_args,
        };

        self.inner.readiness.register(&name);
        let weak = Arc::downgrade(&self.inner);
        let on_exit = move |exit: ProcessExit| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_exit(exit);
            }
        };

        let process = {
            let _emit = self.inner.emit_guard();
            let process = match self.inner.processes.spawn(request, on_exit) {
                Ok(process) => process,
                Err(e) => {
                    self.inner.readiness.remove(&name);
                    warn!(agent = %name, "Spawn failed: {e}");
                    return Err(e.into());
                }
            };
            self.inner.exits().remove(&name);
            self.inner.publish(OrchestratorEvent::AgentSpawned {
                agent_name: name.clone(),
                agent_id: agent_id.clone(),
                pid: process.pid(),
            });
            process
        };

        if self.inner.spawn_counts_as_ready {
            self.inner.readiness.mark_ready(&name);
        }

        Ok(AgentHandle {
            name,
            agent_id,
            pid: process.pid(),
            process,
        })
    }

    /// Terminate an agent's process. Unknown names are a no-op.
    pub async fn kill_agent(&self, name: &str) {
        self.inner.processes.kill(name, Signal::Term).await;
    }

    pub fn is_agent_running(&self, name: &str) -> bool {
        self.inner.processes.is_running(name)
    }

    pub fn running_agents(&self) -> Vec<String> {
        self.inner.processes.running_agents()
    }

    pub fn agent_pid(&self, name: &str) -> Option<u32> {
        self.inner.processes.pid(name)
    }

    /// Wait for an agent's first sign of life.
    pub async fn await_ready(&self, name: &str) -> Result<(), OrchestratorError> {
        self.inner
            .readiness
            .await_ready(name)
            .await
            .map_err(|e| match e {
                ReadinessError::Unknown(name) => {
                    OrchestratorError::NotFound(format!("agent {name}"))
                }
                ReadinessError::AgentExited { name, exit_code } => {
                    OrchestratorError::AgentExited { name, exit_code }
                }
            })
    }

    pub async fn await_ready_timeout(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(), OrchestratorError> {
        tokio::time::timeout(timeout, self.await_ready(name))
            .await
            .map_err(|_| OrchestratorError::Timeout {
                what: format!("agent {name} to become ready"),
                elapsed: timeout,
            })?
    }

    // ---- messaging ----

    /// Write `text` to every member except the controller
    ///
    /// Failures are collected per recipient.
    pub async fn broadcast(
        &self,
        text: &str,
        summary: Option<String>,
    ) -> Result<BroadcastReport, OrchestratorError> {
        self.inner.ensure_running()?;
        let entry = InboxMessage::new(CONTROLLER_NAME, text).with_summary(summary);
        let inner = Arc::clone(&self.inner);
        let report = blocking(move || {
            let config = inner.teams.get(&inner.team)?;
            let deliveries = config
                .members
                .iter()
                .filter(|member| member.name != CONTROLLER_NAME)
                .map(|member| DeliveryStatus {
                    agent_name: member.name.clone(),
                    outcome: inner.mailbox.write(&inner.team, &member.name, &entry),
                })
                .collect();
            Ok(BroadcastReport { deliveries })
        })
        .await?;

        for failure in report.failures() {
            if let Err(e) = &failure.outcome {
                warn!(agent = %failure.agent_name, "Broadcast delivery failed: {e}");
            }
        }
        debug!(delivered = report.delivered(), total = report.deliveries.len(), "Broadcast sent");
        Ok(report)
    }

    /// Write a plain-text message to one member.
    pub async fn send_message(
        &self,
        agent: &str,
        text: &str,
        summary: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.inner.ensure_running()?;
        self.write_to_member(agent, text.to_string(), summary).await
    }

    /// Answer a `permission_request`
    ///
    /// Requests that already carry a verdict are not answered again.
    pub async fn send_permission_response(
        &self,
        agent: &str,
        request_id: &str,
        approved: bool,
    ) -> Result<(), OrchestratorError> {
        self.inner.ensure_running()?;
        if self.inner.has_verdict(request_id) {
            debug!(request_id, "Permission request already answered");
            return Ok(());
        }

        let response = StructuredMessage::PermissionResponse(PermissionResponse {
            request_id: request_id.to_string(),
            approved,
            timestamp: Some(now_timestamp()),
        });
        self.write_to_member(agent, encode(&response), None).await?;

        let resolution = if approved {
            Resolution::Approved
        } else {
            Resolution::Rejected { feedback: None }
        };
        self.inner.correlations.resolve(request_id, resolution);
        Ok(())
    }

    /// Answer a `plan_approval_request`; `feedback` is passed through verbatim.
    pub async fn send_plan_approval(
        &self,
        agent: &str,
        request_id: &str,
        approved: bool,
        feedback: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.inner.ensure_running()?;
        if self.inner.has_verdict(request_id) {
            debug!(request_id, "Plan approval already answered");
            return Ok(());
        }

        let response = StructuredMessage::PlanApprovalResponse(PlanApprovalResponse {
            request_id: request_id.to_string(),
            approved,
            feedback: feedback.clone(),
            timestamp: Some(now_timestamp()),
        });
        self.write_to_member(agent, encode(&response), None).await?;

        let resolution = if approved {
            Resolution::Approved
        } else {
            Resolution::Rejected { feedback }
        };
        self.inner.correlations.resolve(request_id, resolution);
        Ok(())
    }

    /// Ask an agent to shut down. Returns the generated `requestId`.
    pub async fn send_shutdown_request(
        &self,
        agent: &str,
        reason: Option<String>,
    ) -> Result<String, OrchestratorError> {
        self.inner.ensure_running()?;
        let seq = self.inner.shutdown_seq.fetch_add(1, Ordering::Relaxed);
        let request_id = format!("shutdown-{}-{seq}@{agent}", self.inner.instance_tag);

        let request = StructuredMessage::ShutdownRequest(ShutdownRequest {
            request_id: request_id.clone(),
            from: Some(CONTROLLER_NAME.to_string()),
            reason,
            timestamp: Some(now_timestamp()),
        });
        self.write_to_member(agent, encode(&request), None).await?;
        info!(agent, request_id = %request_id, "Shutdown requested");
        Ok(request_id)
    }

    async fn write_to_member(
        &self,
        agent: &str,
        text: String,
        summary: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let inner = Arc::clone(&self.inner);
        let agent = agent.to_string();
        blocking(move || {
            let config = inner.teams.get(&inner.team)?;
            if config.member(&agent).is_none() {
                return Err(OrchestratorError::NotFound(format!(
                    "agent {agent} in team {}",
                    inner.team
                )));
            }
            let entry = InboxMessage::new(CONTROLLER_NAME, text).with_summary(summary);
            inner.mailbox.write(&inner.team, &agent, &entry)?;
            Ok(())
        })
        .await
    }

    // ---- correlations ----

    pub fn correlation_state(&self, request_id: &str) -> Option<CorrelationState> {
        self.inner.correlations.state(request_id)
    }

    /// Open permission and plan requests, oldest first.
    pub fn pending_correlations(&self) -> Vec<PendingCorrelation> {
        self.inner.correlations.pending()
    }

    /// Wait for a request to be answered or cancelled by its agent's exit.
    pub async fn await_resolution(&self, request_id: &str) -> Result<Resolution, OrchestratorError> {
        self.inner
            .correlations
            .wait(request_id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound(format!("request {request_id}")))
    }

    // ---- tasks ----

    /// Create a task and notify its owner, if any.
    pub async fn create_task(&self, new: NewTask) -> Result<TaskItem, OrchestratorError> {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        blocking(move || {
            let task = inner.tasks.create(&inner.team, new)?;
            inner.notify_owner(&task)?;
            Ok(task)
        })
        .await
    }

    /// Give a task to `owner` and notify them.
    pub async fn assign_task(&self, task_id: &str, owner: &str) -> Result<TaskItem, OrchestratorError> {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        let (task_id, owner) = (task_id.to_string(), owner.to_string());
        blocking(move || {
            let task = inner
                .tasks
                .update(&inner.team, &task_id, |task| task.owner = Some(owner))?;
            inner.notify_owner(&task)?;
            Ok(task)
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskItem, OrchestratorError> {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        let task_id = task_id.to_string();
        blocking(move || Ok(inner.tasks.get(&inner.team, &task_id)?)).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskItem>, OrchestratorError> {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        blocking(move || Ok(inner.tasks.list(&inner.team)?)).await
    }

    pub async fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<TaskItem, OrchestratorError> {
        self.inner.ensure_running()?;
        let inner = Arc::clone(&self.inner);
        let task_id = task_id.to_string();
        blocking(move || {
            Ok(inner
                .tasks
                .update(&inner.team, &task_id, |task| task.status = status)?)
        })
        .await
    }

    // ---- team ----

    /// Read the persisted team config.
    pub async fn team_config(&self) -> Result<TeamConfig, OrchestratorError> {
        let inner = Arc::clone(&self.inner);
        blocking(move || Ok(inner.teams.get(&inner.team)?)).await
    }

    /// Every entry in an agent's mailbox, read-only.
    pub async fn read_mailbox(&self, agent: &str) -> Result<Vec<InboxMessage>, OrchestratorError> {
        let inner = Arc::clone(&self.inner);
        let agent = agent.to_string();
        blocking(move || Ok(inner.mailbox.read_all(&inner.team, &agent)?)).await
    }
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_guard(&self) -> MutexGuard<'_, ()> {
        self.emit_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn shut_down(&self) -> OrchestratorError {
        OrchestratorError::ShutDown(self.team.clone())
    }

    fn ensure_running(&self) -> Result<(), OrchestratorError> {
        match *self.lifecycle() {
            Lifecycle::Running => Ok(()),
            Lifecycle::ShutDown => Err(self.shut_down()),
            Lifecycle::Created | Lifecycle::Initializing => {
                Err(OrchestratorError::NotInitialized(self.team.clone()))
            }
        }
    }

    fn provision(&self) -> Result<TeamConfig, OrchestratorError> {
        self.teams.create(
            &self.team,
            CONTROLLER_NAME,
            &self.session_id,
            self.description.clone(),
        )?;
        self.tasks.ensure_team(&self.team)?;

        let mut controller = AgentMember::new(CONTROLLER_NAME, &self.team, CONTROLLER_AGENT_TYPE);
        controller.is_active = Some(true);
        let config = self.teams.add_member(&self.team, controller)?;
        self.mailbox.ensure_inbox(&self.team, CONTROLLER_NAME)?;
        Ok(config)
    }

    fn remove_storage(&self) -> Result<(), OrchestratorError> {
        let mut first: Option<OrchestratorError> = None;
        if let Err(e) = self.mailbox.remove_team(&self.team) {
            warn!(team = %self.team, "Failed to remove mailboxes: {e}");
            first.get_or_insert(e.into());
        }
        if let Err(e) = self.teams.delete(&self.team) {
            warn!(team = %self.team, "Failed to remove team directory: {e}");
            first.get_or_insert(e.into());
        }
        if let Err(e) = self.tasks.delete_team(&self.team) {
            warn!(team = %self.team, "Failed to remove task directory: {e}");
            first.get_or_insert(e.into());
        }
        first.map_or(Ok(()), Err)
    }

    fn member_for(&self, options: &SpawnAgentOptions) -> AgentMember {
        let agent_type = options.agent_type.as_deref().unwrap_or(DEFAULT_AGENT_TYPE);
        let mut member = AgentMember::new(&options.name, &self.team, agent_type);
        member.model = options.model.clone().unwrap_or_default();
        member.color = options.color.clone();
        member.prompt = options.prompt.clone();
        member.plan_mode_required = options.plan_mode_required;
        member.cwd = options
            .cwd
            .as_ref()
            .map(|cwd| cwd.display().to_string())
            .unwrap_or_default();
        member.backend_type = Some("process".to_string());
        member.is_active = Some(true);
        member
    }

    fn has_verdict(&self, request_id: &str) -> bool {
        matches!(
            self.correlations.state(request_id),
            Some(CorrelationState::Resolved(
                Resolution::Approved | Resolution::Rejected { .. }
            ))
        )
    }

    fn notify_owner(&self, task: &TaskItem) -> Result<(), OrchestratorError> {
        let Some(owner) = &task.owner else {
            return Ok(());
        };
        let assignment = StructuredMessage::TaskAssignment(TaskAssignment {
            task_id: task.id.clone(),
            subject: Some(task.subject.clone()),
            description: Some(task.description.clone()).filter(|d| !d.is_empty()),
            assigned_by: Some(CONTROLLER_NAME.to_string()),
            timestamp: Some(now_timestamp()),
        });
        let entry = InboxMessage::new(CONTROLLER_NAME, encode(&assignment));
        self.mailbox.write(&self.team, owner, &entry)?;
        debug!(task_id = %task.id, owner = %owner, "Task assignment sent");
        Ok(())
    }

    fn publish(&self, event: OrchestratorEvent) {
        debug!(event = event.name(), agent = %event.agent_name(), "Event");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _emit = self.emit_guard();
        self.publish(event);
    }

    fn exits(&self) -> MutexGuard<'_, HashMap<String, Option<i32>>> {
        self.exits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_exit(&self, exit: ProcessExit) {
        let _emit = self.emit_guard();
        self.exits().insert(exit.name.clone(), exit.exit_code);
        self.readiness.mark_exited(&exit.name, exit.exit_code);
        let cancelled = self.correlations.cancel_for_agent(&exit.name, exit.exit_code);
        if cancelled > 0 {
            info!(agent = %exit.name, cancelled, "Cancelled pending requests of exited agent");
        }
        self.publish(OrchestratorEvent::AgentExited {
            agent_name: exit.name,
            exit_code: exit.exit_code,
        });
    }

    /// Open a correlation, cancelling it at once if its agent already exited
    ///
    /// The exit is recorded before `handle_exit` cancels, and the correlation
    /// is opened before the exit is looked up here, so one of the two sees it.
    fn open_correlation(&self, request_id: &str, kind: CorrelationKind, agent_name: &str) {
        self.correlations.open(request_id, kind, agent_name);
        if self.processes.is_running(agent_name) {
            return;
        }
        let exited = self.exits().get(agent_name).copied();
        if let Some(exit_code) = exited {
            self.correlations.cancel_for_agent(agent_name, exit_code);
            info!(agent = %agent_name, request_id, "Request from exited agent cancelled");
        }
    }

    fn dispatch(&self, envelope: InboxMessage, decoded: StructuredMessage) {
        let agent_name = decoded
            .sender()
            .unwrap_or(envelope.from.as_str())
            .to_string();

        let event = match decoded {
            StructuredMessage::IdleNotification(details) => {
                self.readiness.mark_ready(&agent_name);
                OrchestratorEvent::Idle {
                    agent_name,
                    details,
                }
            }
            StructuredMessage::ShutdownApproved(message) => {
                info!(agent = %agent_name, request_id = %message.request_id, "Shutdown approved");
                OrchestratorEvent::ShutdownApproved {
                    agent_name,
                    message,
                }
            }
            StructuredMessage::PlanApprovalRequest(message) => {
                self.open_correlation(&message.request_id, CorrelationKind::PlanApproval, &agent_name);
                OrchestratorEvent::PlanApprovalRequest {
                    agent_name,
                    message,
                }
            }
            StructuredMessage::PermissionRequest(message) => {
                self.open_correlation(&message.request_id, CorrelationKind::Permission, &agent_name);
                OrchestratorEvent::PermissionRequest {
                    agent_name,
                    message,
                }
            }
            _ => {
                self.readiness.mark_ready(&agent_name);
                OrchestratorEvent::Message {
                    agent_name,
                    message: envelope,
                }
            }
        };
        self.emit(event);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}

async fn blocking<T, F>(f: F) -> Result<T, OrchestratorError>
where
    F: FnOnce() -> Result<T, OrchestratorError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OrchestratorError::TaskFailed(e.to_string()))?
}
