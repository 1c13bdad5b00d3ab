//! Process table and per-child monitor tasks

use super::ProcessError;
use super::command::{Launcher, SpawnRequest};
use super::signal::{Signal, send_term};
use agent_team_controller_core::CONTROLLER_NAME;
use agent_team_controller_core::paths::is_valid_name;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{Notify, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How long a terminated worker may take to exit before it is force-killed.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Report delivered once when a tracked process exits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub name: String,
    pub pid: Option<u32>,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

/// Handle to a started worker
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    name: String,
    pid: Option<u32>,
    exited: watch::Receiver<bool>,
}

impl ProcessHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has been reaped.
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Resolve once the process has been reaped and its exit reported.
    pub async fn wait(&self) {
        let mut exited = self.exited.clone();
        let _ = exited.wait_for(|done| *done).await;
    }
}

struct Entry {
    serial: u64,
    pid: Option<u32>,
    force_kill: Arc<Notify>,
    exited: watch::Receiver<bool>,
}

type Table = Arc<Mutex<HashMap<String, Entry>>>;

fn lock(table: &Table) -> MutexGuard<'_, HashMap<String, Entry>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the worker processes of one orchestrator
///
/// Cloning shares the same table.
#[derive(Clone)]
pub struct ProcessManager {
    launcher: Arc<Launcher>,
    grace_period: Duration,
    table: Table,
    next_serial: Arc<AtomicU64>,
}

impl ProcessManager {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher: Arc::new(launcher),
            grace_period: KILL_GRACE_PERIOD,
            table: Arc::new(Mutex::new(HashMap::new())),
            next_serial: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Override the SIGTERM grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Start a worker and begin monitoring it
    ///
    /// `on_exit` runs exactly once, after the entry has left the table, when
    /// the process exits for any reason. Fails without creating an entry if
    /// the name is taken by a live process or the executable cannot start.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, request: SpawnRequest, on_exit: F) -> Result<ProcessHandle, ProcessError>
    where
        F: FnOnce(ProcessExit) + Send + 'static,
    {
        let name = request.name.clone();
        if !is_valid_name(&name) || name == CONTROLLER_NAME {
            return Err(ProcessError::InvalidName(name));
        }

        let line = self.launcher.command_line(&request);
        let mut table = lock(&self.table);
        if table.contains_key(&name) {
            return Err(ProcessError::AlreadyRunning(name));
        }

        let mut cmd = Command::new(&line.program);
        cmd.args(&line.args)
            .envs(&line.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &line.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            name: name.clone(),
            program: line.program.display().to_string(),
            source,
        })?;
        let pid = child.id();
        info!(agent = %name, pid = ?pid, program = %line.program.display(), "Spawned worker");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_lines(name.clone(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_lines(name.clone(), "stderr", stderr));
        }
        let stdin = child.stdin.take();

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let force_kill = Arc::new(Notify::new());
        let (exited_tx, exited_rx) = watch::channel(false);
        table.insert(
            name.clone(),
            Entry {
                serial,
                pid,
                force_kill: Arc::clone(&force_kill),
                exited: exited_rx.clone(),
            },
        );
        drop(table);

        let monitor_table = Arc::clone(&self.table);
        let monitor_name = name.clone();
        tokio::spawn(async move {
            // Held so the worker's stdin stays open while it runs.
            let _stdin = stdin;
            let status = tokio::select! {
                status = child.wait() => status,
                _ = force_kill.notified() => {
                    if let Err(e) = child.start_kill() {
                        warn!(agent = %monitor_name, "Force kill failed: {e}");
                    }
                    child.wait().await
                }
            };
            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(agent = %monitor_name, "Failed to reap worker: {e}");
                    None
                }
            };
            info!(agent = %monitor_name, exit_code = ?exit_code, "Worker exited");

            remove_if_current(&monitor_table, &monitor_name, serial);
            on_exit(ProcessExit {
                name: monitor_name,
                pid,
                exit_code,
            });
            exited_tx.send_replace(true);
        });

        Ok(ProcessHandle {
            name,
            pid,
            exited: exited_rx,
        })
    }

    /// Terminate a worker
    ///
    /// [`Signal::Term`] waits up to the grace period before forcing. Returns
    /// once the process has been reaped and its exit reported. Unknown names
    /// are a no-op.
    pub async fn kill(&self, name: &str, signal: Signal) {
        let found = lock(&self.table).get(name).map(|entry| {
            (
                entry.serial,
                entry.pid,
                Arc::clone(&entry.force_kill),
                entry.exited.clone(),
            )
        });
        let Some((serial, pid, force_kill, mut exited)) = found else {
            debug!(agent = %name, "Kill requested for untracked agent");
            return;
        };

        let termed = signal == Signal::Term && pid.is_some_and(send_term);
        if termed {
            let graceful = tokio::time::timeout(self.grace_period, exited.wait_for(|done| *done)).await;
            if graceful.is_err() {
                warn!(agent = %name, grace = ?self.grace_period, "Worker ignored SIGTERM, forcing kill");
                force_kill.notify_one();
            }
        } else {
            force_kill.notify_one();
        }

        let _ = exited.wait_for(|done| *done).await;
        remove_if_current(&self.table, name, serial);
    }

    /// Terminate every tracked worker concurrently.
    pub async fn kill_all(&self) {
        let mut set = JoinSet::new();
        for name in self.running_agents() {
            let manager = self.clone();
            set.spawn(async move { manager.kill(&name, Signal::Term).await });
        }
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                warn!("Kill task failed: {e}");
            }
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.table).contains_key(name)
    }

    pub fn pid(&self, name: &str) -> Option<u32> {
        lock(&self.table).get(name).and_then(|entry| entry.pid)
    }

    /// Names of tracked workers, sorted.
    pub fn running_agents(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.table).keys().cloned().collect();
        names.sort();
        names
    }
}

fn remove_if_current(table: &Table, name: &str, serial: u64) {
    let mut table = lock(table);
    if table.get(name).is_some_and(|entry| entry.serial == serial) {
        table.remove(name);
    }
}

async fn relay_lines<R>(agent: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(agent = %agent, stream, "{line}"),
            Ok(None) => break,
            Err(e) => {
                debug!(agent = %agent, stream, "Output relay closed: {e}");
                break;
            }
        }
    }
}
