//! Progress reporting hooks.
//!
//! The engine announces phase and job transitions through [`ProgressSink`].
//! The library default logs them; the binary prints the console format.

use jobexec_types::{JobItem, Phase};

/// Receiver for batch progress events.
///
/// Called from worker tasks concurrently, so implementations must be
/// thread-safe and should not block.
pub trait ProgressSink: Send + Sync {
    /// A phase is about to dispatch `jobs` jobs.
    fn phase_started(&self, phase: Phase, jobs: usize) {
        let _ = (phase, jobs);
    }

    /// Every job of `phase` has reached a terminal state.
    fn phase_finished(&self, phase: Phase, jobs: &[JobItem]) {
        let _ = (phase, jobs);
    }

    /// The job entered `EXECUTING`.
    fn job_started(&self, job: &JobItem);

    /// The job reached `COMPLETED` or `TIMEOUT`.
    fn job_finished(&self, job: &JobItem);
}

/// Emits progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn phase_started(&self, phase: Phase, jobs: usize) {
        tracing::info!(%phase, jobs, "Phase started");
    }

    fn phase_finished(&self, phase: Phase, jobs: &[JobItem]) {
        tracing::info!(%phase, jobs = jobs.len(), "Phase finished");
    }

    fn job_started(&self, job: &JobItem) {
        tracing::info!(
            job = job.name(),
            command = job.command(),
            stdout = %job.stdout_path().display(),
            stderr = %job.stderr_path().display(),
            "Job started"
        );
    }

    fn job_finished(&self, job: &JobItem) {
        let run_time = job
            .run_time()
            .map(jobexec_core::format_run_time)
            .unwrap_or_default();
        tracing::info!(
            job = job.name(),
            state = %job.state(),
            exit_code = job.exit_code(),
            %run_time,
            "Job finished"
        );
    }
}
