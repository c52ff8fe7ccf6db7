//! Three-phase job plan.
//!
//! Pure domain types with no IO and no async. A `JobPlan` can only be built
//! from phase groups whose names are unique, so holding one is proof that the
//! duplicate-name check already ran.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::JobItem;

/// One of the three fixed groups, run strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Pre,
    Main,
    Post,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Pre, Phase::Main, Phase::Post];

    /// Key of the phase's list in the job file.
    #[must_use]
    pub const fn section(self) -> &'static str {
        match self {
            Phase::Pre => "pre_job_items",
            Phase::Main => "job_items",
            Phase::Post => "post_job_items",
        }
    }

    /// Heading printed before the phase runs.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Phase::Pre => "Pre Job Items",
            Phase::Main => "Job Items",
            Phase::Post => "Post Job Items",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Pre => "pre",
            Phase::Main => "main",
            Phase::Post => "post",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("duplicate job name \"{name}\" in {section}")]
    DuplicateName { section: &'static str, name: String },
}

/// Validated pre/main/post job groups.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    pre: Vec<JobItem>,
    main: Vec<JobItem>,
    post: Vec<JobItem>,
}

impl JobPlan {
    pub fn new(
        pre: Vec<JobItem>,
        main: Vec<JobItem>,
        post: Vec<JobItem>,
    ) -> Result<Self, PlanError> {
        ensure_unique_names(Phase::Pre, &pre)?;
        ensure_unique_names(Phase::Main, &main)?;
        ensure_unique_names(Phase::Post, &post)?;
        Ok(Self { pre, main, post })
    }

    #[must_use]
    pub fn phase(&self, phase: Phase) -> &[JobItem] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Main => &self.main,
            Phase::Post => &self.post,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pre.len() + self.main.len() + self.post.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to each group independently. Reordering keeps the group's
    /// names, so the result does not need to be validated again.
    #[must_use]
    pub fn map_phases(self, mut f: impl FnMut(Phase, Vec<JobItem>) -> Vec<JobItem>) -> Self {
        Self {
            pre: f(Phase::Pre, self.pre),
            main: f(Phase::Main, self.main),
            post: f(Phase::Post, self.post),
        }
    }

    #[must_use]
    pub fn into_phases(self) -> (Vec<JobItem>, Vec<JobItem>, Vec<JobItem>) {
        (self.pre, self.main, self.post)
    }
}

/// Names must be unique within a phase; the same name may appear in
/// different phases.
pub fn ensure_unique_names(phase: Phase, items: &[JobItem]) -> Result<(), PlanError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.name()) {
            return Err(PlanError::DuplicateName {
                section: phase.section(),
                name: item.name().to_string(),
            });
        }
    }
    Ok(())
}
