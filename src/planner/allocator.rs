//! Greedy assignment loop over the backlog
//!
//! Strictly single-pass: each work item either commits on the first date
//! and slot that can hold it, or stays in the backlog for the next
//! rebuild. Later items never bump or reshuffle an earlier commitment.

use tracing::debug;
use uuid::Uuid;

use crate::models::{PlanItem, PlanSource, WorkItem};
use crate::planner::calendar::{candidate_dates, PlanningWindow};
use crate::planner::ledger::DayLoadLedger;
use crate::planner::queue::WorkItemQueue;
use crate::planner::roster::TechnicianRoster;
use crate::planner::slots::find_common_slot;
use crate::planner::PlannerConfig;

/// A scheduled work item with its minted assignment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub work_item_id: Uuid,
    pub assignment_group_id: Uuid,
}

/// Everything one allocation pass produced, ready for the flush step.
#[derive(Debug, Default)]
pub struct AllocationOutcome {
    pub plan_items: Vec<PlanItem>,
    pub scheduled: Vec<Assignment>,
}

impl AllocationOutcome {
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }
}

/// All mutable scheduling state for one run, passed by reference through
/// the pipeline so the algorithm is testable with synthetic rosters and
/// backlogs. No package-level state exists.
#[derive(Debug)]
pub struct PlanningSession {
    config: PlannerConfig,
    window: PlanningWindow,
    roster: TechnicianRoster,
    ledger: DayLoadLedger,
    queue: WorkItemQueue,
}

impl PlanningSession {
    pub fn new(
        config: PlannerConfig,
        window: PlanningWindow,
        roster: TechnicianRoster,
        ledger: DayLoadLedger,
        queue: WorkItemQueue,
    ) -> Self {
        Self {
            config,
            window,
            roster,
            ledger,
            queue,
        }
    }

    pub fn ledger(&self) -> &DayLoadLedger {
        &self.ledger
    }

    /// Run the greedy pass over the full backlog.
    pub fn allocate(&mut self) -> AllocationOutcome {
        let mut outcome = AllocationOutcome::default();
        let backlog = std::mem::replace(&mut self.queue, WorkItemQueue::build(vec![], &self.config));

        for item in backlog.items() {
            if let Some(assignment) = self.try_schedule(item, &mut outcome.plan_items) {
                outcome.scheduled.push(assignment);
            } else {
                debug!(work_item = %item.id, title = %item.title, "no slot in window, item stays in backlog");
            }
        }

        outcome
    }

    /// Try candidate dates in policy order; commit on the first date with
    /// both enough qualifying technicians and a common free interval.
    fn try_schedule(&mut self, item: &WorkItem, plan_items: &mut Vec<PlanItem>) -> Option<Assignment> {
        let duration = item.duration_minutes();
        let people = item.people_needed();

        for date in candidate_dates(
            &self.window,
            item.dispatch_critical(),
            self.config.date_preference,
        ) {
            let candidates = self.roster.candidates(
                &item.required_skill_codes,
                date,
                duration,
                &self.ledger,
            );
            if candidates.len() < people {
                continue;
            }

            let Some(slot) = find_common_slot(&candidates, date, duration, people, &self.ledger)
            else {
                continue;
            };

            let group_id = Uuid::new_v4();
            for technician_id in &slot.technician_ids {
                let sequence = self.ledger.bookings_on(*technician_id, date);
                plan_items.push(PlanItem {
                    plan_date: date,
                    technician_id: *technician_id,
                    work_item_id: Some(item.id),
                    start_minute: slot.start_minute,
                    end_minute: slot.end_minute,
                    sequence,
                    source: PlanSource::Auto,
                    assignment_group_id: Some(group_id),
                    is_fixed: false,
                    manual_title: None,
                });
                self.ledger
                    .commit(*technician_id, date, slot.start_minute, slot.end_minute);
            }

            debug!(
                work_item = %item.id,
                %date,
                start = slot.start_minute,
                end = slot.end_minute,
                people,
                "scheduled"
            );
            return Some(Assignment {
                work_item_id: item.id,
                assignment_group_id: group_id,
            });
        }

        None
    }
}
