//! Core domain types for jobexec.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod job;
mod plan;
mod settings;
mod wall_time;

pub use job::{InvalidTransition, JobItem, JobState};
pub use plan::{JobPlan, Phase, PlanError, ensure_unique_names};
pub use settings::{
    DEFAULT_PRIORITY, DEFAULT_THREADS, Settings, ShellConfig, Strategy, StrategyParseError,
};
pub use wall_time::{WallTime, WallTimeError};
