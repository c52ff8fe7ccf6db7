//! Job file loading for jobexec.
//!
//! A job file is a YAML document with an optional `global` section and three
//! optional lists of job items (`pre_job_items`, `job_items`,
//! `post_job_items`). The raw document is deserialized into private `Raw*`
//! structs and resolved here into the validated types from `jobexec-types`:
//! defaults are filled in from the global section, indices are assigned in
//! document order, and names are checked for uniqueness per phase.
//!
//! Every problem is reported as a [`ConfigError`] before anything is
//! scheduled or executed.

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

use jobexec_types::{
    JobItem, JobPlan, Phase, PlanError, Settings, ShellConfig, Strategy, StrategyParseError,
    WallTime, WallTimeError,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read job file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("job file is empty")]
    Empty,
    #[error("failed to parse job file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("required \"{field}\" field not defined for job item #{position} in {section}")]
    MissingField {
        section: &'static str,
        position: usize,
        field: &'static str,
    },
    #[error("invalid wall_time for {owner}: {source}")]
    InvalidWallTime {
        owner: String,
        #[source]
        source: WallTimeError,
    },
    #[error("global threads must be at least 1 (got {0})")]
    InvalidThreads(i64),
    #[error(transparent)]
    UnknownStrategy(#[from] StrategyParseError),
    #[error(transparent)]
    DuplicateName(#[from] PlanError),
}

/// A fully resolved job file.
#[derive(Debug, Clone)]
pub struct JobFile {
    pub settings: Settings,
    pub shell: ShellConfig,
    pub plan: JobPlan,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobFile {
    global: Option<RawGlobal>,
    pre_job_items: Option<Vec<RawJobItem>>,
    job_items: Option<Vec<RawJobItem>>,
    post_job_items: Option<Vec<RawJobItem>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobal {
    threads: Option<i64>,
    wall_time: Option<Value>,
    strategy: Option<String>,
    priority: Option<i64>,
    shell: Option<ShellConfig>,
}

#[derive(Debug, Deserialize)]
struct RawJobItem {
    job: Option<String>,
    command: Option<String>,
    priority: Option<i64>,
    wall_time: Option<Value>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
}

/// Read and resolve the job file at `path`.
pub fn load_job_file(path: &Path) -> Result<JobFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_job_file(&text)?;
    tracing::info!(
        path = %path.display(),
        jobs = file.plan.len(),
        strategy = %file.settings.strategy,
        threads = file.settings.threads.get(),
        "Loaded job file"
    );
    Ok(file)
}

/// Resolve a job file from its YAML text.
pub fn parse_job_file(text: &str) -> Result<JobFile, ConfigError> {
    if text.trim().is_empty() {
        return Err(ConfigError::Empty);
    }
    let raw: RawJobFile = serde_yaml::from_str(text)?;
    let global = raw.global.unwrap_or_default();
    let settings = resolve_settings(&global)?;

    let pre = resolve_items(Phase::Pre, raw.pre_job_items, &settings)?;
    let main = resolve_items(Phase::Main, raw.job_items, &settings)?;
    let post = resolve_items(Phase::Post, raw.post_job_items, &settings)?;
    let plan = JobPlan::new(pre, main, post)?;

    Ok(JobFile {
        settings,
        shell: global.shell.unwrap_or_default(),
        plan,
    })
}

fn resolve_settings(global: &RawGlobal) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    if let Some(threads) = global.threads {
        settings.threads = usize::try_from(threads)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::InvalidThreads(threads))?;
    }
    if let Some(value) = &global.wall_time {
        settings.wall_time =
            wall_time_from_value(value).map_err(|source| ConfigError::InvalidWallTime {
                owner: "global".to_string(),
                source,
            })?;
    }
    if let Some(strategy) = &global.strategy {
        settings.strategy = strategy.parse::<Strategy>()?;
    }
    if let Some(priority) = global.priority {
        settings.priority = priority;
    }
    Ok(settings)
}

fn resolve_items(
    phase: Phase,
    raw: Option<Vec<RawJobItem>>,
    settings: &Settings,
) -> Result<Vec<JobItem>, ConfigError> {
    let raw = raw.unwrap_or_default();
    let mut items = Vec::with_capacity(raw.len());
    for (index, item) in raw.into_iter().enumerate() {
        let missing = |field| ConfigError::MissingField {
            section: phase.section(),
            position: index + 1,
            field,
        };
        let name = item.job.ok_or_else(|| missing("job"))?;
        let command = item.command.ok_or_else(|| missing("command"))?;

        let wall_time = match &item.wall_time {
            Some(value) => {
                wall_time_from_value(value).map_err(|source| ConfigError::InvalidWallTime {
                    owner: format!("job \"{name}\""),
                    source,
                })?
            }
            None => settings.wall_time,
        };
        let priority = item.priority.unwrap_or(settings.priority);

        let mut job = JobItem::new(name, index, command, priority, wall_time);
        if let Some(stdout) = item.stdout {
            job = job.with_stdout(stdout);
        }
        if let Some(stderr) = item.stderr {
            job = job.with_stderr(stderr);
        }
        items.push(job);
    }
    tracing::debug!(phase = %phase, count = items.len(), "Resolved job items");
    Ok(items)
}

/// Integers are seconds, floats are truncated, strings are seconds or `HH:MM:SS`.
fn wall_time_from_value(value: &Value) -> Result<WallTime, WallTimeError> {
    match value {
        Value::Number(number) => {
            if let Some(secs) = number.as_i64() {
                WallTime::try_from(secs)
            } else if let Some(secs) = number.as_u64() {
                WallTime::from_secs(secs)
            } else {
                WallTime::try_from(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(text) => text.parse(),
        other => Err(WallTimeError::Malformed {
            raw: format!("{other:?}"),
        }),
    }
}
