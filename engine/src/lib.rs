//! Execution engine for jobexec.
//!
//! Starts job commands through the shell with bounded parallelism, enforces
//! per-job wall times, and tears down the process tree of any job that
//! overruns. [`run_plan`] drives a whole pre/main/post batch on top of
//! [`Executor::execute`].

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod batch;
mod executor;
pub mod process;
pub mod process_tree;
mod progress;
mod shell;

pub use batch::{BatchReport, BatchSummary, run_plan};
pub use executor::{DEFAULT_KILL_GRACE, Executor, FAILED_EXIT_CODE, SpawnError};
pub use process::{KILLED_EXIT_CODE, KillOutcome};
pub use process_tree::{KillReport, ProcessTable, SystemProcessTable, kill_process_tree};
pub use progress::{ProgressSink, TracingProgress};
pub use shell::{DetectedShell, detect_shell};
