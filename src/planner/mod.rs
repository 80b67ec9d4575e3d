//! Technician dispatch/scheduling engine
//!
//! Pure in-memory core of the rebuild pipeline: given a planning window, a
//! priority-ordered backlog, a roster and a load ledger seeded with manual
//! bookings, produce a conflict-free set of plan items. All I/O happens
//! before and after this module; allocation itself never suspends.

pub mod allocator;
pub mod calendar;
pub mod ledger;
pub mod queue;
pub mod roster;
pub mod slots;

use std::collections::HashSet;

pub use allocator::{AllocationOutcome, Assignment, PlanningSession};
pub use calendar::{candidate_dates, DatePreference, PlanningWindow};
pub use ledger::{DayLoad, DayLoadLedger};
pub use queue::WorkItemQueue;
pub use roster::TechnicianRoster;
pub use slots::{find_common_slot, FoundSlot};

/// Tunable knobs of the allocation pass.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Work item categories the dispatcher may schedule. Anything else is
    /// excluded from every run until recategorized.
    pub schedulable_categories: HashSet<String>,
    /// Candidate-date ordering for non-critical items.
    pub date_preference: DatePreference,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            schedulable_categories: ["operational"].iter().map(|s| s.to_string()).collect(),
            date_preference: DatePreference::default(),
        }
    }
}

impl PlannerConfig {
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schedulable_categories: categories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}
