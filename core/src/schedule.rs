//! Ordering strategies.
//!
//! Each function takes a phase group by value and returns it reordered; no
//! job is modified. All three are total orders: the composite keys end in the
//! job name, which is unique within a group.

use std::cmp::Ordering;

use jobexec_types::{JobItem, JobPlan, Phase, Strategy};

/// Ascending by document index.
#[must_use]
pub fn sequential_order(mut items: Vec<JobItem>) -> Vec<JobItem> {
    items.sort_by_key(JobItem::index);
    items
}

/// Descending by `(priority, name)`.
#[must_use]
pub fn priority_order(mut items: Vec<JobItem>) -> Vec<JobItem> {
    items.sort_by(|a, b| descending(a.priority(), b.priority(), a, b));
    items
}

/// Descending by `(wall_time, name)`: the largest budgets start first.
#[must_use]
pub fn wall_time_order(mut items: Vec<JobItem>) -> Vec<JobItem> {
    items.sort_by(|a, b| descending(a.wall_time(), b.wall_time(), a, b));
    items
}

/// Order a main-phase group by `strategy`.
#[must_use]
pub fn order_by(strategy: Strategy, items: Vec<JobItem>) -> Vec<JobItem> {
    match strategy {
        Strategy::Priority => priority_order(items),
        Strategy::WallTime => wall_time_order(items),
        Strategy::Sequential => sequential_order(items),
    }
}

/// Order every phase of `plan`: pre and post sequentially, main by `strategy`.
#[must_use]
pub fn order_plan(plan: JobPlan, strategy: Strategy) -> JobPlan {
    plan.map_phases(|phase, items| {
        let applied = match phase {
            Phase::Pre | Phase::Post => Strategy::Sequential,
            Phase::Main => strategy,
        };
        let ordered = order_by(applied, items);
        tracing::debug!(
            phase = %phase,
            strategy = %applied,
            order = ?ordered.iter().map(JobItem::name).collect::<Vec<_>>(),
            "Scheduled job items"
        );
        ordered
    })
}

fn descending<K: Ord>(key_a: K, key_b: K, a: &JobItem, b: &JobItem) -> Ordering {
    key_b.cmp(&key_a).then_with(|| b.name().cmp(a.name()))
}
