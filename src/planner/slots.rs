//! Slot search over the business-hour grid
//!
//! Walks start minutes in 15-minute steps across the two fixed business
//! blocks (08:00-12:00, 13:00-17:00). An interval must fit entirely inside
//! one block; the lunch gap is never spanned. The first start minute that
//! yields a full set of free technicians wins - earliest slot, not best fit.

use chrono::NaiveDate;

use crate::models::{
    Technician, AFTERNOON_END, AFTERNOON_START, MORNING_END, MORNING_START, SLOT_STEP_MINUTES,
};
use crate::planner::ledger::DayLoadLedger;
use uuid::Uuid;

/// A common free interval with the technicians that will share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundSlot {
    pub start_minute: i32,
    pub end_minute: i32,
    pub technician_ids: Vec<Uuid>,
}

/// Search a date for the earliest interval of `duration` minutes where
/// `required_people` of the (already scored and sorted) candidates are all
/// free. Candidates are collected greedily in list order.
pub fn find_common_slot(
    candidates: &[&Technician],
    date: NaiveDate,
    duration: i32,
    required_people: usize,
    ledger: &DayLoadLedger,
) -> Option<FoundSlot> {
    if duration <= 0 || required_people == 0 || candidates.len() < required_people {
        return None;
    }

    let mut start = MORNING_START;
    while start + duration <= AFTERNOON_END {
        if spans_lunch(start, duration) {
            start += SLOT_STEP_MINUTES;
            continue;
        }
        let end = start + duration;

        let mut free: Vec<Uuid> = Vec::with_capacity(required_people);
        for tech in candidates {
            if !ledger.overlaps(tech.id, date, start, end) {
                free.push(tech.id);
                if free.len() == required_people {
                    return Some(FoundSlot {
                        start_minute: start,
                        end_minute: end,
                        technician_ids: free,
                    });
                }
            }
        }

        start += SLOT_STEP_MINUTES;
    }

    None
}

/// A start is invalid when the interval crosses the morning/afternoon
/// boundary or begins inside the lunch gap.
fn spans_lunch(start: i32, duration: i32) -> bool {
    (start < MORNING_END && start + duration > MORNING_END)
        || (start >= MORNING_END && start < AFTERNOON_START)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tech(name: &str) -> Technician {
        Technician {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active: true,
            dispatch_priority: 100,
            is_wildcard: false,
            skills: HashSet::new(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
    }

    #[test]
    fn earliest_slot_wins() {
        let a = tech("a");
        let ledger = DayLoadLedger::new();
        let slot = find_common_slot(&[&a], date(), 60, 1, &ledger).unwrap();
        assert_eq!(slot.start_minute, MORNING_START);
        assert_eq!(slot.end_minute, MORNING_START + 60);
    }

    #[test]
    fn interval_never_spans_the_lunch_gap() {
        let a = tech("a");
        let mut ledger = DayLoadLedger::new();
        // Morning fully booked except a 30-minute tail that cannot hold
        // 120 minutes; next valid start is the afternoon block.
        ledger.commit(a.id, date(), MORNING_START, MORNING_END - 30);

        let slot = find_common_slot(&[&a], date(), 120, 1, &ledger).unwrap();
        assert_eq!(slot.start_minute, AFTERNOON_START);
    }

    #[test]
    fn booked_intervals_push_the_slot_later() {
        let a = tech("a");
        let mut ledger = DayLoadLedger::new();
        ledger.commit(a.id, date(), MORNING_START, MORNING_START + 45);

        let slot = find_common_slot(&[&a], date(), 60, 1, &ledger).unwrap();
        // 08:45 is on the grid and free.
        assert_eq!(slot.start_minute, MORNING_START + 45);
    }

    #[test]
    fn duration_longer_than_a_block_never_fits() {
        let a = tech("a");
        let ledger = DayLoadLedger::new();
        assert!(find_common_slot(&[&a], date(), 300, 1, &ledger).is_none());
        // A full block does fit.
        let slot = find_common_slot(&[&a], date(), 240, 1, &ledger).unwrap();
        assert_eq!(slot.start_minute, MORNING_START);
        assert_eq!(slot.end_minute, MORNING_END);
    }

    #[test]
    fn collects_first_free_technicians_in_candidate_order() {
        let a = tech("a");
        let b = tech("b");
        let c = tech("c");
        let mut ledger = DayLoadLedger::new();
        ledger.commit(a.id, date(), MORNING_START, MORNING_START + 60);

        let slot = find_common_slot(&[&a, &b, &c], date(), 60, 2, &ledger).unwrap();
        // `a` is busy at 08:00; b and c take the earliest slot together.
        assert_eq!(slot.start_minute, MORNING_START);
        assert_eq!(slot.technician_ids, vec![b.id, c.id]);
    }

    #[test]
    fn needs_enough_candidates() {
        let a = tech("a");
        let ledger = DayLoadLedger::new();
        assert!(find_common_slot(&[&a], date(), 60, 2, &ledger).is_none());
    }

    #[test]
    fn finds_last_grid_slot_of_the_day() {
        let a = tech("a");
        let mut ledger = DayLoadLedger::new();
        ledger.commit(a.id, date(), MORNING_START, MORNING_END);
        ledger.commit(a.id, date(), AFTERNOON_START, AFTERNOON_END - 60);

        let slot = find_common_slot(&[&a], date(), 60, 1, &ledger).unwrap();
        assert_eq!(slot.start_minute, AFTERNOON_END - 60);
        assert_eq!(slot.end_minute, AFTERNOON_END);
    }
}
