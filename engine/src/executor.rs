//! Bounded-parallel dispatch and per-job supervision.
//!
//! [`Executor::execute`] admits jobs in the order given, never running more
//! than `max_concurrency` at once. Each admitted job runs on its own task:
//! its command is started through the shell with stdout and stderr redirected
//! to files, and it is held to its wall time. A job that overruns has its whole
//! process tree killed and ends in `TIMEOUT`.

use std::fmt;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::fs::File;
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time;

use jobexec_types::{InvalidTransition, JobItem, JobState};

use crate::process::{self, ChildGuard, KILLED_EXIT_CODE};
use crate::process_tree::{self, ProcessTable, SystemProcessTable};
use crate::progress::{ProgressSink, TracingProgress};
use crate::shell::DetectedShell;

/// How long a killed job may take to be reaped before it is given up on.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Exit code recorded for jobs that never produced one of their own.
pub const FAILED_EXIT_CODE: i32 = -1;

/// Why a job's process could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("cannot open {}: {source}", path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot start {shell}: {source}")]
    Start {
        shell: String,
        #[source]
        source: io::Error,
    },
}

/// Runs batches of jobs. Cheap to clone; clones share the shell, process
/// table, and progress sink.
#[derive(Clone)]
pub struct Executor {
    shell: Arc<DetectedShell>,
    processes: Arc<dyn ProcessTable>,
    progress: Arc<dyn ProgressSink>,
    kill_grace: Duration,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("shell", &self.shell)
            .field("kill_grace", &self.kill_grace)
            .finish_non_exhaustive()
    }
}

impl Executor {
    #[must_use]
    pub fn new(shell: DetectedShell) -> Self {
        Self {
            shell: Arc::new(shell),
            processes: Arc::new(SystemProcessTable),
            progress: Arc::new(TracingProgress),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    #[must_use]
    pub fn with_process_table(mut self, processes: Arc<dyn ProcessTable>) -> Self {
        self.processes = processes;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    #[must_use]
    pub fn shell(&self) -> &DetectedShell {
        &self.shell
    }

    #[must_use]
    pub fn progress(&self) -> &dyn ProgressSink {
        self.progress.as_ref()
    }

    /// Run `items` with at most `max_concurrency` in flight and return them,
    /// in the order given, once every job has reached a terminal state.
    ///
    /// Jobs are admitted strictly in list order as slots free up. A job that
    /// is not `CREATED` is passed through untouched. A concurrency of zero is
    /// treated as one.
    pub async fn execute(&self, items: Vec<JobItem>, max_concurrency: usize) -> Vec<JobItem> {
        let slots = if max_concurrency == 0 {
            tracing::warn!("max_concurrency 0 requested; running jobs one at a time");
            1
        } else {
            max_concurrency
        };
        let semaphore = Arc::new(Semaphore::new(slots));
        let mut running: JoinSet<(usize, JobItem)> = JoinSet::new();
        let mut finished = Vec::with_capacity(items.len());

        for (position, job) in items.into_iter().enumerate() {
            if job.state() != JobState::Created {
                tracing::warn!(
                    job = job.name(),
                    state = %job.state(),
                    "Skipping job that has already run"
                );
                finished.push((position, job));
                continue;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .expect("job slot semaphore is never closed");

            while let Some(result) = running.try_join_next() {
                collect(&mut finished, result);
            }

            tracing::debug!(job = job.name(), position, slots, "Admitting job");
            let worker = self.clone();
            running.spawn(async move {
                let _permit = permit;
                let mut job = job;
                let outcome = AssertUnwindSafe(worker.run_one(&mut job))
                    .catch_unwind()
                    .await;
                if let Err(payload) = outcome {
                    let message = panic_payload_to_string(&payload);
                    tracing::error!(job = job.name(), "Job runner panicked: {message}");
                    job.abandon(
                        FAILED_EXIT_CODE,
                        format!("runner panicked: {message}"),
                        Local::now(),
                    );
                }
                (position, job)
            });
        }

        while let Some(result) = running.join_next().await {
            collect(&mut finished, result);
        }

        finished.sort_by_key(|(position, _)| *position);
        finished.into_iter().map(|(_, job)| job).collect()
    }

    /// Drive one `CREATED` job to a terminal state.
    async fn run_one(&self, job: &mut JobItem) {
        if let Err(e) = job.begin(Local::now()) {
            tracing::error!("{e}");
            return;
        }
        self.progress.job_started(job);

        match self.spawn(job).await {
            Ok(child) => self.supervise(job, child).await,
            Err(e) => {
                tracing::warn!(job = job.name(), "Failed to start job: {e}");
                record(job.fail(FAILED_EXIT_CODE, e.to_string(), Local::now()));
            }
        }

        self.progress.job_finished(job);
    }

    async fn spawn(&self, job: &JobItem) -> Result<Child, SpawnError> {
        let stdout = create_output(job.stdout_path()).await?;
        let stderr = if job.stderr_path() == job.stdout_path() {
            stdout.try_clone().map_err(|source| SpawnError::Redirect {
                path: job.stderr_path().to_path_buf(),
                source,
            })?
        } else {
            create_output(job.stderr_path()).await?
        };

        let mut cmd = Command::new(&self.shell.binary);
        cmd.args(&self.shell.args)
            .arg(job.command())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        #[cfg(unix)]
        process::set_new_session(&mut cmd);

        cmd.spawn().map_err(|source| SpawnError::Start {
            shell: self.shell.binary.display().to_string(),
            source,
        })
    }

    async fn supervise(&self, job: &mut JobItem, child: Child) {
        let mut guard = ChildGuard::new(child).with_process_table(Arc::clone(&self.processes));
        let pid = guard.child_mut().id();
        tracing::debug!(job = job.name(), pid, "Job process started");

        let wall_time = job.wall_time();
        let waited = time::timeout(wall_time.as_duration(), guard.child_mut().wait()).await;
        match waited {
            Ok(Ok(status)) => {
                guard.disarm();
                record(job.complete(process::exit_code_of(status), Local::now()));
            }
            Ok(Err(e)) => {
                tracing::error!(job = job.name(), pid, "Failed to wait on job process: {e}");
                let code = self.terminate(&mut guard, pid).await;
                record(job.fail(code, format!("wait failed: {e}"), Local::now()));
            }
            Err(_) => {
                tracing::warn!(
                    job = job.name(),
                    pid,
                    %wall_time,
                    "Job exceeded its wall time; killing process tree"
                );
                let code = self.terminate(&mut guard, pid).await;
                record(job.time_out(code, Local::now()));
            }
        }
    }

    /// Kill the job's process tree and reap the root. Returns the root's
    /// exit code, or [`KILLED_EXIT_CODE`] if it could not be reaped in time.
    async fn terminate(&self, guard: &mut ChildGuard, pid: Option<u32>) -> i32 {
        match pid {
            Some(pid) => {
                let report = process_tree::kill_process_tree(self.processes.as_ref(), pid);
                if report.is_clean() {
                    tracing::debug!(pid, %report, "Killed process tree");
                } else {
                    tracing::warn!(pid, %report, "Process tree kill incomplete");
                }
                if report.root_failed(pid) {
                    let _ = guard.child_mut().start_kill();
                }
            }
            None => {
                let _ = guard.child_mut().start_kill();
            }
        }

        match time::timeout(self.kill_grace, guard.child_mut().wait()).await {
            Ok(Ok(status)) => {
                guard.disarm();
                process::exit_code_of(status)
            }
            Ok(Err(e)) => {
                tracing::error!(pid, "Failed to reap killed job: {e}");
                KILLED_EXIT_CODE
            }
            Err(_) => {
                tracing::error!(pid, grace = ?self.kill_grace, "Killed job did not exit");
                KILLED_EXIT_CODE
            }
        }
    }
}

async fn create_output(path: &Path) -> Result<std::fs::File, SpawnError> {
    let file = File::create(path)
        .await
        .map_err(|source| SpawnError::Redirect {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.into_std().await)
}

fn collect(finished: &mut Vec<(usize, JobItem)>, result: Result<(usize, JobItem), JoinError>) {
    match result {
        Ok(entry) => finished.push(entry),
        Err(e) => tracing::error!("Job task failed: {e}"),
    }
}

fn record(result: Result<(), InvalidTransition>) {
    if let Err(e) = result {
        tracing::error!("{e}");
    }
}

fn panic_payload_to_string(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
