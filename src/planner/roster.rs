//! Active technicians, skills and dispatch scoring
//!
//! Candidate selection keeps skill-compatible technicians with remaining
//! daily headroom and ranks them so that wildcard/overflow technicians are
//! last resort, lower dispatch_priority wins, and equal-priority ties go to
//! the least-loaded technician.

use chrono::NaiveDate;

use crate::models::Technician;
use crate::planner::ledger::DayLoadLedger;

/// Score offset pushing wildcard technicians behind every regular one.
const WILDCARD_PENALTY: i32 = 100_000;

/// Holds the active technicians for one run.
#[derive(Debug)]
pub struct TechnicianRoster {
    technicians: Vec<Technician>,
}

impl TechnicianRoster {
    /// Inactive technicians are dropped up front; they never take part in
    /// a run.
    pub fn new(technicians: Vec<Technician>) -> Self {
        Self {
            technicians: technicians.into_iter().filter(|t| t.is_active).collect(),
        }
    }

    pub fn technicians(&self) -> &[Technician] {
        &self.technicians
    }

    /// Qualifying technicians for one work item on one candidate date,
    /// sorted ascending by score. The caller rejects the date when fewer
    /// than `required_people` qualify.
    pub fn candidates(
        &self,
        required_skills: &[String],
        date: NaiveDate,
        duration: i32,
        ledger: &DayLoadLedger,
    ) -> Vec<&Technician> {
        let mut scored: Vec<(i32, &Technician)> = self
            .technicians
            .iter()
            .filter(|t| t.has_skills(required_skills))
            .filter(|t| ledger.fits(t.id, date, duration))
            .map(|t| (score(t, ledger.load(t.id, date)), t))
            .collect();
        scored.sort_by_key(|(score, _)| *score);
        scored.into_iter().map(|(_, t)| t).collect()
    }
}

fn score(technician: &Technician, current_load_minutes: i32) -> i32 {
    let wildcard = if technician.is_wildcard {
        WILDCARD_PENALTY
    } else {
        0
    };
    wildcard + technician.dispatch_priority + current_load_minutes
}
