//! Backlog loading order for the allocation pass
//!
//! The queue is a strict, deterministic total order: treated-critical work
//! first, then priority rank, then oldest creation time. Creation time is
//! unique enough in practice to act as the final tie-break.

use std::cmp::Ordering;

use crate::models::{WorkItem, WorkItemStatus};
use crate::planner::PlannerConfig;

/// Priority-ordered, schedulable backlog for one run.
#[derive(Debug)]
pub struct WorkItemQueue {
    items: Vec<WorkItem>,
}

impl WorkItemQueue {
    /// Filter the loaded backlog down to schedulable items and sort it.
    ///
    /// Items whose category is not configured as schedulable are excluded
    /// from this and every future run until recategorized. Items still
    /// `planned` after the purge reset are committed in another window and
    /// must not be re-derived here.
    pub fn build(items: Vec<WorkItem>, config: &PlannerConfig) -> Self {
        let mut items: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| item.status == WorkItemStatus::Open)
            .filter(|item| config.schedulable_categories.contains(item.category.as_str()))
            .collect();
        items.sort_by(dispatch_order);
        Self { items }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.items
    }
}

/// The exact backlog comparator: criticality, then priority rank, then
/// created_at ascending.
fn dispatch_order(a: &WorkItem, b: &WorkItem) -> Ordering {
    b.dispatch_critical()
        .cmp(&a.dispatch_critical())
        .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
        .then_with(|| a.created_at.cmp(&b.created_at))
}
