//! Subprocess management: sessions, guards, and signal delivery.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use crate::process_tree::{self, ProcessTable};

/// Exit code recorded when a process was killed and no status could be reaped.
pub const KILLED_EXIT_CODE: i32 = -9;

/// RAII guard that kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned `tokio::process::Child` immediately after `spawn()` so the
/// job's process group is torn down if the owning task is dropped mid-run
/// (for example when the operator aborts the batch). With a process table
/// attached, the drop also kills descendants that left the group, such as
/// commands started under `setsid`. Call `disarm()` after the process has
/// been reaped.
pub struct ChildGuard {
    child: Option<tokio::process::Child>,
    processes: Option<Arc<dyn ProcessTable>>,
}

impl ChildGuard {
    #[must_use]
    pub fn new(child: tokio::process::Child) -> Self {
        Self {
            child: Some(child),
            processes: None,
        }
    }

    #[must_use]
    pub fn with_process_table(mut self, processes: Arc<dyn ProcessTable>) -> Self {
        self.processes = Some(processes);
        self
    }

    pub fn child_mut(&mut self) -> &mut tokio::process::Child {
        self.child.as_mut().expect("child present")
    }

    pub fn disarm(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        // The tree has to be walked while the root is still alive to parent it.
        if let (Some(pid), Some(processes)) = (child.id(), self.processes.as_deref()) {
            let report = process_tree::kill_process_tree(processes, pid);
            if report.is_clean() {
                tracing::debug!(pid, %report, "Killed abandoned process tree");
            } else {
                tracing::warn!(pid, %report, "Abandoned process tree kill incomplete");
            }
        }
        #[cfg(unix)]
        {
            if let Some(pid) = child.id()
                && !matches!(try_kill_process_group(pid), Ok(KillOutcome::Killed))
            {
                let _ = child.start_kill();
            }
            let _ = child.try_wait();
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
            let _ = child.try_wait();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    NotRunning,
    Killed,
}

/// SIGKILL a single process.
pub fn try_kill_process(pid: u32) -> io::Result<KillOutcome> {
    #[cfg(unix)]
    {
        let pid = checked_pid(pid)?;
        // SAFETY: plain syscall; `pid` is a positive process id.
        let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
        kill_result(rc)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

/// SIGKILL every member of a process group.
///
/// Jobs are spawned in a new session, so the job's pid is also its process
/// group id.
pub fn try_kill_process_group(pgid: u32) -> io::Result<KillOutcome> {
    #[cfg(unix)]
    {
        let pgid = checked_pid(pgid)?;
        // SAFETY: plain syscall; `pgid` is a positive process group id.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        kill_result(rc)
    }

    #[cfg(not(unix))]
    {
        let _ = pgid;
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

/// Zero and values that wrap negative would address the caller's own group
/// or every process it may signal.
#[cfg(unix)]
fn checked_pid(pid: u32) -> io::Result<libc::pid_t> {
    match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        )),
    }
}

#[cfg(unix)]
fn kill_result(rc: libc::c_int) -> io::Result<KillOutcome> {
    if rc == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(KillOutcome::NotRunning);
        }
        return Err(err);
    }
    Ok(KillOutcome::Killed)
}

/// Exit code of a reaped process: its own code, or `-signal` when a signal
/// ended it.
#[must_use]
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Put the child process in its own session (Unix only) so the entire process
/// group can be killed via `killpg`.
#[cfg(unix)]
pub fn set_new_session(cmd: &mut tokio::process::Command) {
    use std::os::unix::process::CommandExt;
    // SAFETY: only async-signal-safe calls run between fork and exec.
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            // Linux-only: ensure the job dies if the executor dies (kill -9 / crash).
            #[cfg(target_os = "linux")]
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Parent pid from the contents of `/proc/<pid>/stat`.
#[cfg(target_os = "linux")]
pub(crate) fn parse_linux_proc_stat_ppid(proc_stat: &str) -> Option<u32> {
    // /proc/<pid>/stat format:
    // pid (comm) state ppid ...
    // The comm field may contain spaces; find the last ')' to locate the end.
    let close_paren = proc_stat.rfind(')')?;
    let after = proc_stat.get(close_paren + 1..)?.trim();
    let mut fields = after.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse::<u32>().ok()
}
