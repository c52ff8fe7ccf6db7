//! Resolved global settings.
//!
//! The loader reads the optional `global` section of a job file and resolves it
//! into [`Settings`]. Every field is already validated: a `Settings` value with
//! zero threads or a zero wall time cannot be constructed.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::WallTime;

/// Default maximum number of main job items run in parallel.
pub const DEFAULT_THREADS: NonZeroUsize = NonZeroUsize::new(4).expect("4 is non-zero");

/// Default priority for job items that do not set one.
pub const DEFAULT_PRIORITY: i64 = 100;

/// Ordering applied to the main job items. Pre and post items are always
/// sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Highest priority first.
    #[default]
    Priority,
    /// Largest wall-time budget first.
    WallTime,
    /// Document order.
    Sequential,
}

const STRATEGY_PARSE_VALUES: &[&str] = &["priority", "wall_time", "sequential"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid strategy '{raw}'; expected one of: {expected:?}")]
pub struct StrategyParseError {
    raw: String,
    expected: &'static [&'static str],
}

impl StrategyParseError {
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Strategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Strategy::Priority => "priority",
            Strategy::WallTime => "wall_time",
            Strategy::Sequential => "sequential",
        }
    }
}

impl FromStr for Strategy {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(Strategy::Priority),
            "wall_time" | "walltime" | "wall-time" => Ok(Strategy::WallTime),
            "sequential" => Ok(Strategy::Sequential),
            _ => Err(StrategyParseError {
                raw: s.to_string(),
                expected: STRATEGY_PARSE_VALUES,
            }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable run-wide defaults, built once and passed by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Concurrency bound for the main phase.
    pub threads: NonZeroUsize,
    /// Wall time applied to job items that do not set one.
    pub wall_time: WallTime,
    pub strategy: Strategy,
    /// Priority applied to job items that do not set one.
    pub priority: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            wall_time: WallTime::DEFAULT,
            strategy: Strategy::default(),
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Shell used to run job commands.
///
/// ```yaml
/// global:
///   shell:
///     binary: /bin/bash
///     args: ["-c"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShellConfig {
    /// Override shell binary (e.g., "bash", "/usr/local/bin/fish").
    pub binary: Option<String>,
    /// Override shell args (e.g., `["-c"]` or `["/C"]`).
    pub args: Option<Vec<String>>,
}
