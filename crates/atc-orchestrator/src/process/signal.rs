//! Signal delivery to worker processes

/// Termination request sent to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Polite termination (SIGTERM); escalates after the grace period
    Term,
    /// Immediate termination (SIGKILL)
    Kill,
}

/// Send SIGTERM to `pid`. Returns whether the signal was delivered.
#[cfg(unix)]
pub(crate) fn send_term(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: plain kill(2) on a pid this process spawned and has not reaped.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

/// Without POSIX signals there is no polite request; callers force-kill.
#[cfg(not(unix))]
pub(crate) fn send_term(_pid: u32) -> bool {
    false
}

/// Check whether a process with `pid` exists (`kill(pid, 0)`).
pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs the existence check only.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}
