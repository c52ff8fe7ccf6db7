//! Process-tree enumeration and termination.
//!
//! The engine never talks to the OS process table directly when it needs to
//! tear down a timed-out job. It goes through [`ProcessTable`], which the
//! default [`SystemProcessTable`] implements on top of `/proc` and signals,
//! and which tests replace with an in-memory fake.

use std::collections::HashSet;
use std::fmt;
use std::io;

use crate::process::{self, KillOutcome};

/// OS-facing operations needed to kill a process tree.
pub trait ProcessTable: Send + Sync {
    /// Direct children of `pid`. A process that has already exited has none.
    fn children(&self, pid: u32) -> io::Result<Vec<u32>>;

    /// Forcibly terminate one process.
    fn kill(&self, pid: u32) -> io::Result<KillOutcome>;

    /// Forcibly terminate every member of a process group.
    fn kill_group(&self, pgid: u32) -> io::Result<KillOutcome>;
}

/// The host's process table.
///
/// Descendants are found through `/proc` on Linux. Other Unix platforms report
/// no children and rely on the process-group kill, which covers everything
/// that did not leave the job's session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn children(&self, pid: u32) -> io::Result<Vec<u32>> {
        #[cfg(target_os = "linux")]
        {
            linux_children(pid)
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = pid;
            Ok(Vec::new())
        }
    }

    fn kill(&self, pid: u32) -> io::Result<KillOutcome> {
        process::try_kill_process(pid)
    }

    fn kill_group(&self, pgid: u32) -> io::Result<KillOutcome> {
        process::try_kill_process_group(pgid)
    }
}

#[cfg(target_os = "linux")]
fn linux_children(pid: u32) -> io::Result<Vec<u32>> {
    use std::fs;

    let mut children = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let Ok(entry) = entry else { continue };
        let Some(candidate) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        // Processes exit while we scan; a vanished entry is simply not a child.
        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if process::parse_linux_proc_stat_ppid(&stat) == Some(pid) {
            children.push(candidate);
        }
    }
    children.sort_unstable();
    Ok(children)
}

/// Every transitive child of `root`, parents before their children.
///
/// Enumeration errors are logged and the affected branch is skipped.
#[must_use]
pub fn descendants(table: &dyn ProcessTable, root: u32) -> Vec<u32> {
    let mut seen = HashSet::from([root]);
    let mut order = Vec::new();
    let mut frontier = vec![root];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for pid in frontier {
            match table.children(pid) {
                Ok(children) => {
                    for child in children {
                        if seen.insert(child) {
                            order.push(child);
                            next.push(child);
                        }
                    }
                }
                Err(e) => tracing::warn!(pid, "Failed to list child processes: {e}"),
            }
        }
        frontier = next;
    }
    order
}

/// What a tree kill managed to do.
#[derive(Debug, Default)]
pub struct KillReport {
    /// Processes that received SIGKILL.
    pub killed: Vec<u32>,
    /// Processes that had already exited.
    pub not_running: Vec<u32>,
    pub failed: Vec<(u32, io::Error)>,
}

impl KillReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn root_failed(&self, root: u32) -> bool {
        self.failed.iter().any(|(pid, _)| *pid == root)
    }

    fn record(&mut self, pid: u32, outcome: io::Result<KillOutcome>) {
        match outcome {
            Ok(KillOutcome::Killed) => self.killed.push(pid),
            Ok(KillOutcome::NotRunning) => self.not_running.push(pid),
            Err(e) => self.failed.push((pid, e)),
        }
    }
}

impl fmt::Display for KillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "killed {:?}, already gone {:?}, failed {:?}",
            self.killed,
            self.not_running,
            self.failed.iter().map(|(pid, _)| *pid).collect::<Vec<_>>()
        )
    }
}

/// Kill `root` and everything it spawned.
///
/// The tree is snapshotted before any signal is sent, since killing a parent
/// reparents its children and hides them from enumeration. Descendants go
/// first, then the root's process group, then the root itself. Failures are
/// collected, never retried.
pub fn kill_process_tree(table: &dyn ProcessTable, root: u32) -> KillReport {
    let tree = descendants(table, root);
    let mut report = KillReport::default();
    for pid in tree {
        report.record(pid, table.kill(pid));
    }
    match table.kill_group(root) {
        Ok(KillOutcome::Killed) => tracing::debug!(pgid = root, "Killed process group"),
        Ok(KillOutcome::NotRunning) => {}
        Err(e) => tracing::debug!(pgid = root, "Failed to kill process group: {e}"),
    }
    report.record(root, table.kill(root));
    report
}
