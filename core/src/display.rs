//! Progress line formatting.
//!
//! One line when a job starts and one when it reaches a terminal state:
//!
//! ```text
//! [2024-05-01 09:30:00.000120] {job_state: EXECUTING, job: build, command: make > build.out 2> build.err}
//! [2024-05-01 09:31:12.400301] {job_state: COMPLETED, job: build, exit_code: 0, run_time: 00:01:12}
//! ```

use chrono::{DateTime, Local, TimeDelta};

use jobexec_types::JobItem;

/// Local time with microseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[must_use]
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `HH:MM:SS`, truncated to whole seconds. Hours are not wrapped at 24.
#[must_use]
pub fn format_run_time(elapsed: TimeDelta) -> String {
    let secs = elapsed.num_seconds().max(0);
    let mins = secs / 60;
    let hrs = mins / 60;
    format!("{hrs:02}:{:02}:{:02}", mins % 60, secs % 60)
}

/// The job's command with its output redirections spelled out.
#[must_use]
pub fn redirected_command(job: &JobItem) -> String {
    format!(
        "{} > {} 2> {}",
        job.command(),
        job.stdout_path().display(),
        job.stderr_path().display()
    )
}

#[must_use]
pub fn start_line(job: &JobItem) -> String {
    let at = job.start_time().unwrap_or_else(Local::now);
    format!(
        "[{}] {{job_state: {}, job: {}, command: {}}}",
        format_timestamp(at),
        job.state(),
        job.name(),
        redirected_command(job)
    )
}

#[must_use]
pub fn finish_line(job: &JobItem) -> String {
    let at = job.end_time().unwrap_or_else(Local::now);
    let run_time = job.run_time().unwrap_or(TimeDelta::zero());
    let state = format!("{},", job.state());
    format!(
        "[{}] {{job_state: {state:<10} job: {}, exit_code: {}, run_time: {}}}",
        format_timestamp(at),
        job.name(),
        job.exit_code(),
        format_run_time(run_time)
    )
}
