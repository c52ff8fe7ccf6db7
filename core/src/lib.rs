//! Core domain logic for jobexec.
//!
//! Pure, synchronous pieces shared by the engine and the binary: the ordering
//! strategies that decide dispatch order, and the progress line format.

pub mod display;
pub mod schedule;

pub use display::{finish_line, format_run_time, format_timestamp, start_line};
pub use schedule::{order_by, order_plan, priority_order, sequential_order, wall_time_order};
