//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use jobexec_engine::{Executor, ProgressSink, detect_shell};
use jobexec_types::{JobItem, Phase, WallTime};
use tempfile::TempDir;

/// A scratch directory that job outputs and job files are written to.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A job whose output lands in this workspace as `<name>.out`/`<name>.err`.
    pub fn job(&self, name: &str, command: &str, wall_time: u64) -> JobItem {
        JobItem::new(
            name,
            0,
            command,
            100,
            WallTime::from_secs(wall_time).expect("positive wall time"),
        )
        .with_stdout(self.file(&format!("{name}.out")))
        .with_stderr(self.file(&format!("{name}.err")))
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.file(name)).expect("read output")
    }

    /// Poll until `name` exists and holds a pid.
    pub fn wait_for_pid(&self, name: &str, timeout: Duration) -> Option<u32> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(text) = std::fs::read_to_string(self.file(name))
                && let Ok(pid) = text.trim().parse()
            {
                return Some(pid);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        None
    }
}

/// Records progress events and tracks how many jobs were running at once.
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<Recorded>,
}

#[derive(Default)]
struct Recorded {
    events: Vec<String>,
    running: usize,
    peak: usize,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start ").map(str::to_string))
            .collect()
    }

    pub fn peak(&self) -> usize {
        self.state.lock().unwrap().peak
    }
}

impl ProgressSink for RecordingSink {
    fn phase_started(&self, phase: Phase, jobs: usize) {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("phase {phase} {jobs}"));
    }

    fn job_started(&self, job: &JobItem) {
        let mut state = self.state.lock().unwrap();
        state.running += 1;
        state.peak = state.peak.max(state.running);
        state.events.push(format!("start {}", job.name()));
    }

    fn job_finished(&self, job: &JobItem) {
        let mut state = self.state.lock().unwrap();
        state.running -= 1;
        state.events.push(format!("finish {}", job.name()));
    }
}

pub fn executor() -> Executor {
    Executor::new(detect_shell(None))
}

/// True once `pid` has exited. Zombies count as exited: they hold no
/// resources and only wait for their new parent to reap them.
#[cfg(target_os = "linux")]
pub fn process_is_gone(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Err(_) => true,
        Ok(stat) => {
            let state = stat
                .rfind(')')
                .and_then(|end| stat.get(end + 1..))
                .and_then(|rest| rest.split_whitespace().next());
            matches!(state, Some("Z" | "X"))
        }
    }
}

/// Poll [`process_is_gone`] for up to `timeout`.
#[cfg(target_os = "linux")]
pub fn wait_until_gone(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if process_is_gone(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// [`wait_until_gone`] that yields to the runtime between polls, so aborted
/// job tasks get the chance to be dropped.
#[cfg(target_os = "linux")]
pub async fn gone_within(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if process_is_gone(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
