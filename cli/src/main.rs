//! jobexec - run a batch of shell jobs with bounded parallelism.
//!
//! ```text
//! main() -> load_job_file() -> [--threads/--strategy overrides]
//!                                   |
//!                     --dry-run ----+---- run_plan() with ConsoleProgress
//!                         |                    |
//!                  print scheduled order   pre -> main -> post
//! ```
//!
//! Progress lines go to stdout; diagnostics go through `tracing` to stderr.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use jobexec_config::load_job_file;
use jobexec_core::{finish_line, order_plan, start_line};
use jobexec_engine::{Executor, ProgressSink, detect_shell, run_plan};
use jobexec_types::{JobItem, JobPlan, Phase, Strategy};

#[derive(Debug, Parser)]
#[command(name = "jobexec", version)]
#[command(about = "Run a batch of shell jobs with bounded parallelism and per-job wall times")]
struct Cli {
    /// YAML job file describing pre, main and post job items
    #[arg(short, long, value_name = "FILE")]
    jobs: PathBuf,
    /// Maximum number of main jobs running at once (overrides global.threads)
    #[arg(short, long)]
    threads: Option<NonZeroUsize>,
    /// Ordering of main jobs: priority, wall_time or sequential
    #[arg(short, long)]
    strategy: Option<Strategy>,
    /// Print the scheduled order without running anything
    #[arg(long)]
    dry_run: bool,
}

/// Prints the start and finish line of every job, and a header per phase.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn phase_started(&self, phase: Phase, _jobs: usize) {
        println!("\n{}:", phase.title());
    }

    fn job_started(&self, job: &JobItem) {
        println!("{}", start_line(job));
    }

    fn job_finished(&self, job: &JobItem) {
        println!("{}", finish_line(job));
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries the progress lines.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn print_plan(plan: &JobPlan) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for phase in Phase::ALL {
        writeln!(out, "\n{}:", phase.title())?;
        for job in plan.phase(phase) {
            write!(out, "{job}")?;
        }
    }
    out.flush()
}

/// Resolves once the operator presses Ctrl-C. Never resolves if the handler
/// cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let job_file = load_job_file(&cli.jobs)
        .with_context(|| format!("failed to load job file {}", cli.jobs.display()))?;

    let mut settings = job_file.settings;
    if let Some(threads) = cli.threads {
        settings.threads = threads;
    }
    if let Some(strategy) = cli.strategy {
        settings.strategy = strategy;
    }

    if cli.dry_run {
        print_plan(&order_plan(job_file.plan, settings.strategy))
            .context("failed to write the scheduled order")?;
        return Ok(ExitCode::SUCCESS);
    }

    let executor =
        Executor::new(detect_shell(Some(&job_file.shell))).with_progress(Arc::new(ConsoleProgress));
    let shell = executor.shell();
    tracing::info!(
        shell = %shell,
        binary = %shell.binary.display(),
        threads = settings.threads.get(),
        strategy = %settings.strategy,
        "Starting batch"
    );

    tokio::select! {
        report = run_plan(&executor, job_file.plan, &settings) => {
            let summary = report.summary();
            tracing::info!(
                total = summary.total,
                completed = summary.completed,
                failed = summary.failed,
                timed_out = summary.timed_out,
                "Batch finished"
            );
            Ok(ExitCode::SUCCESS)
        }
        () = interrupted() => {
            // Dropping the batch drops every job task; their guards kill the
            // job process trees, including descendants in other sessions.
            println!("\nBreak Requested ... exiting");
            Ok(ExitCode::FAILURE)
        }
    }
}

// Jobs are spawned from the runtime thread and die with it (PR_SET_PDEATHSIG),
// so every guard must be dropped on that thread before it exits.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
