//! Job Descriptor: one unit of schedulable work.
//!
//! The identity fields (`name`, `index`, `command`, `priority`, `wall_time`,
//! output paths) are fixed at construction. The run-state fields are written
//! only through the lifecycle methods below, which enforce
//! `CREATED -> EXECUTING -> {COMPLETED | TIMEOUT}`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::WallTime;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    #[default]
    Created,
    Executing,
    Completed,
    Timeout,
}

impl JobState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::Executing => "EXECUTING",
            JobState::Completed => "COMPLETED",
            JobState::Timeout => "TIMEOUT",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Timeout)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job '{job}' cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub job: String,
    pub from: JobState,
    pub to: JobState,
}

/// A job item together with its run state.
#[derive(Debug, Clone)]
pub struct JobItem {
    name: String,
    index: usize,
    command: String,
    priority: i64,
    wall_time: WallTime,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    exit_code: i32,
    state: JobState,
    create_time: DateTime<Local>,
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    error: Option<String>,
}

impl JobItem {
    /// Create a job in the `CREATED` state. Output paths default to
    /// `<name>.out` and `<name>.err`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        index: usize,
        command: impl Into<String>,
        priority: i64,
        wall_time: WallTime,
    ) -> Self {
        let name = name.into();
        let stdout_path = PathBuf::from(format!("{name}.out"));
        let stderr_path = PathBuf::from(format!("{name}.err"));
        Self {
            name,
            index,
            command: command.into(),
            priority,
            wall_time,
            stdout_path,
            stderr_path,
            exit_code: 0,
            state: JobState::Created,
            create_time: Local::now(),
            start_time: None,
            end_time: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = path.into();
        self
    }

    #[must_use]
    pub fn with_stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_path = path.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    #[must_use]
    pub const fn wall_time(&self) -> WallTime {
        self.wall_time
    }

    #[must_use]
    pub fn stdout_path(&self) -> &Path {
        &self.stdout_path
    }

    #[must_use]
    pub fn stderr_path(&self) -> &Path {
        &self.stderr_path
    }

    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    #[must_use]
    pub fn create_time(&self) -> DateTime<Local> {
        self.create_time
    }

    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    /// Why the job could not run to completion, if it failed before or
    /// while waiting on its process.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Elapsed time between start and end, once both are known.
    #[must_use]
    pub fn run_time(&self) -> Option<chrono::TimeDelta> {
        Some(self.end_time? - self.start_time?)
    }

    /// `CREATED -> EXECUTING`, recording the start time.
    pub fn begin(&mut self, now: DateTime<Local>) -> Result<(), InvalidTransition> {
        self.transition(JobState::Executing)?;
        self.start_time = Some(now);
        Ok(())
    }

    /// `EXECUTING -> COMPLETED` after the process exited on its own.
    pub fn complete(
        &mut self,
        exit_code: i32,
        now: DateTime<Local>,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobState::Completed)?;
        self.exit_code = exit_code;
        self.end_time = Some(now);
        Ok(())
    }

    /// `EXECUTING -> TIMEOUT` after the deadline elapsed and the process tree
    /// was killed.
    pub fn time_out(
        &mut self,
        exit_code: i32,
        now: DateTime<Local>,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobState::Timeout)?;
        self.exit_code = exit_code;
        self.end_time = Some(now);
        Ok(())
    }

    /// `EXECUTING -> COMPLETED` with a failure exit code, for jobs whose
    /// process could not be spawned or waited on.
    pub fn fail(
        &mut self,
        exit_code: i32,
        error: impl Into<String>,
        now: DateTime<Local>,
    ) -> Result<(), InvalidTransition> {
        self.complete(exit_code, now)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Close out a job whose runner died partway through, whatever state it
    /// reached. Used only on the panic path; never moves a terminal job.
    pub fn abandon(&mut self, exit_code: i32, error: impl Into<String>, now: DateTime<Local>) {
        if self.state.is_terminal() {
            return;
        }
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
        self.state = JobState::Completed;
        self.exit_code = exit_code;
        self.end_time = Some(now);
        self.error = Some(error.into());
    }

    fn transition(&mut self, to: JobState) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (self.state, to),
            (JobState::Created, JobState::Executing)
                | (JobState::Executing, JobState::Completed | JobState::Timeout)
        );
        if !allowed {
            return Err(InvalidTransition {
                job: self.name.clone(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl fmt::Display for JobItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Job Item:")?;
        writeln!(f, "  Name:      {}", self.name)?;
        writeln!(f, "  Index:     {}", self.index)?;
        writeln!(f, "  Command:   {}", self.command)?;
        writeln!(f, "  Priority:  {}", self.priority)?;
        writeln!(f, "  Wall Time: {}", self.wall_time)?;
        writeln!(f, "  stdout:    {}", self.stdout_path.display())?;
        writeln!(f, "  stderr:    {}", self.stderr_path.display())?;
        writeln!(f, "  Exit Code: {}", self.exit_code)?;
        writeln!(f, "  Job State: {}", self.state)
    }
}
