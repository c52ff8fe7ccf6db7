//! Whole-batch execution: schedule the plan, then run pre, main and post in
//! sequence.

use jobexec_core::order_plan;
use jobexec_types::{JobItem, JobPlan, JobState, Phase, Settings};

use crate::executor::Executor;

/// Finished jobs of every phase, each in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub pre: Vec<JobItem>,
    pub main: Vec<JobItem>,
    pub post: Vec<JobItem>,
}

/// Outcome counts across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    /// Completed with a non-zero exit code.
    pub failed: usize,
    pub timed_out: usize,
}

impl BatchReport {
    #[must_use]
    pub fn phase(&self, phase: Phase) -> &[JobItem] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Main => &self.main,
            Phase::Post => &self.post,
        }
    }

    /// Every job, pre then main then post.
    pub fn jobs(&self) -> impl Iterator<Item = &JobItem> {
        self.pre.iter().chain(&self.main).chain(&self.post)
    }

    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for job in self.jobs() {
            summary.total += 1;
            match job.state() {
                JobState::Completed => {
                    summary.completed += 1;
                    if job.exit_code() != 0 {
                        summary.failed += 1;
                    }
                }
                JobState::Timeout => summary.timed_out += 1,
                JobState::Created | JobState::Executing => {}
            }
        }
        summary
    }
}

/// Order `plan` by `settings.strategy` and run it.
///
/// Pre and post jobs run one at a time in document order; main jobs run up
/// to `settings.threads` at once. A phase starts only after every job of the
/// previous phase has finished, whatever their exit codes.
pub async fn run_plan(executor: &Executor, plan: JobPlan, settings: &Settings) -> BatchReport {
    let (pre, main, post) = order_plan(plan, settings.strategy).into_phases();
    BatchReport {
        pre: run_phase(executor, Phase::Pre, pre, 1).await,
        main: run_phase(executor, Phase::Main, main, settings.threads.get()).await,
        post: run_phase(executor, Phase::Post, post, 1).await,
    }
}

async fn run_phase(
    executor: &Executor,
    phase: Phase,
    items: Vec<JobItem>,
    max_concurrency: usize,
) -> Vec<JobItem> {
    tracing::info!(%phase, jobs = items.len(), max_concurrency, "Running phase");
    executor.progress().phase_started(phase, items.len());
    let finished = executor.execute(items, max_concurrency).await;
    executor.progress().phase_finished(phase, &finished);
    finished
}
