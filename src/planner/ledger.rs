//! Per-technician-per-date load accounting
//!
//! Run-scoped and rebuilt from scratch on every rebuild. Prior auto plan
//! items are purged before allocation, so the ledger only needs seeding
//! from manual/fixed items inside the window; auto-allocation must never
//! double-book a technician a human has already committed.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{PlanItem, DAILY_CAP_MINUTES};

/// Allocated minutes and booked intervals for one technician on one date.
#[derive(Debug, Clone, Default)]
pub struct DayLoad {
    pub minutes_used: i32,
    /// Half-open `[start, end)` intervals, in commit order.
    pub booked: Vec<(i32, i32)>,
}

/// In-memory map keyed by (technician, date).
#[derive(Debug, Default)]
pub struct DayLoadLedger {
    loads: HashMap<(Uuid, NaiveDate), DayLoad>,
}

impl DayLoadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger with manual/fixed plan items already committed
    /// inside the window. Non-preserved rows are ignored.
    pub fn seed_preserved(&mut self, items: &[PlanItem]) {
        for item in items.iter().filter(|i| i.is_preserved()) {
            self.commit(
                item.technician_id,
                item.plan_date,
                item.start_minute,
                item.end_minute,
            );
        }
    }

    /// Minutes already allocated to the technician on the date.
    pub fn load(&self, technician_id: Uuid, date: NaiveDate) -> i32 {
        self.loads
            .get(&(technician_id, date))
            .map(|l| l.minutes_used)
            .unwrap_or(0)
    }

    /// Whether the technician can absorb `duration` more minutes without
    /// crossing the daily cap.
    pub fn fits(&self, technician_id: Uuid, date: NaiveDate, duration: i32) -> bool {
        self.load(technician_id, date) + duration <= DAILY_CAP_MINUTES
    }

    /// Whether `[start, end)` collides with any booked interval.
    pub fn overlaps(&self, technician_id: Uuid, date: NaiveDate, start: i32, end: i32) -> bool {
        self.loads
            .get(&(technician_id, date))
            .map(|l| l.booked.iter().any(|&(s, e)| start < e && end > s))
            .unwrap_or(false)
    }

    /// Number of intervals already booked on the tech-day; used as the
    /// sequence value of the next plan item.
    pub fn bookings_on(&self, technician_id: Uuid, date: NaiveDate) -> i32 {
        self.loads
            .get(&(technician_id, date))
            .map(|l| l.booked.len() as i32)
            .unwrap_or(0)
    }

    /// Record `[start, end)` against the tech-day.
    pub fn commit(&mut self, technician_id: Uuid, date: NaiveDate, start: i32, end: i32) {
        let day = self.loads.entry((technician_id, date)).or_default();
        day.booked.push((start, end));
        day.minutes_used += end - start;
    }
}
