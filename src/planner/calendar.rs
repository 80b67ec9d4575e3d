//! Business-day calendar for the planning window
//!
//! The engine only ever books weekdays inside the requested window. The
//! order in which candidate dates are offered to an item is a policy:
//! critical work takes days chronologically, everything else defers day 0
//! so that same-day capacity stays available for urgent arrivals.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// The requested multi-day planning window `[start_date, start_date + days)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningWindow {
    pub start_date: NaiveDate,
    pub days: i64,
}

impl PlanningWindow {
    pub fn new(start_date: NaiveDate, days: i64) -> Self {
        Self { start_date, days }
    }

    /// Last calendar date inside the window (inclusive).
    pub fn end_date(&self) -> NaiveDate {
        self.start_date + Duration::days(self.days.max(1) - 1)
    }

    /// Window identity used as the mutual-exclusion key.
    pub fn lock_key(&self) -> String {
        format!("plan:{}:{}", self.start_date, self.days)
    }

    /// All weekdays inside the window, chronologically.
    pub fn business_days(&self) -> Vec<NaiveDate> {
        (0..self.days.max(0))
            .map(|offset| self.start_date + Duration::days(offset))
            .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
            .collect()
    }
}

/// Tunable ordering of candidate dates for non-critical work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePreference {
    /// Offer days in natural chronological order.
    Chronological,
    /// Offer `[d1, d2, d0, d3, d4, ...]`, keeping day 0 free for work that
    /// must land same-day.
    #[default]
    DeferToday,
}

impl DatePreference {
    fn apply(self, days: Vec<NaiveDate>) -> Vec<NaiveDate> {
        match self {
            Self::Chronological => days,
            Self::DeferToday => {
                if days.len() < 2 {
                    return days;
                }
                let mut ordered = Vec::with_capacity(days.len());
                ordered.push(days[1]);
                if days.len() > 2 {
                    ordered.push(days[2]);
                }
                ordered.push(days[0]);
                ordered.extend_from_slice(days.get(3..).unwrap_or(&[]));
                ordered
            }
        }
    }
}

/// Candidate dates for one work item. Critical items always search
/// chronologically so they can claim the earliest possible day.
pub fn candidate_dates(
    window: &PlanningWindow,
    critical: bool,
    preference: DatePreference,
) -> Vec<NaiveDate> {
    let days = window.business_days();
    if critical {
        days
    } else {
        preference.apply(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekend_days_are_excluded() {
        // Mon 2026-08-03 .. Sun 2026-08-09
        let window = PlanningWindow::new(date(2026, 8, 3), 7);
        let days = window.business_days();
        assert_eq!(
            days,
            vec![
                date(2026, 8, 3),
                date(2026, 8, 4),
                date(2026, 8, 5),
                date(2026, 8, 6),
                date(2026, 8, 7),
            ]
        );
    }

    #[test]
    fn window_starting_on_saturday_skips_to_monday() {
        let window = PlanningWindow::new(date(2026, 8, 8), 3);
        assert_eq!(window.business_days(), vec![date(2026, 8, 10)]);
    }

    #[test]
    fn lock_key_carries_window_identity() {
        let window = PlanningWindow::new(date(2026, 8, 3), 7);
        assert_eq!(window.lock_key(), "plan:2026-08-03:7");
        assert_eq!(window.end_date(), date(2026, 8, 9));
    }

    #[test]
    fn critical_items_search_chronologically() {
        let window = PlanningWindow::new(date(2026, 8, 3), 5);
        let days = candidate_dates(&window, true, DatePreference::DeferToday);
        assert_eq!(days[0], date(2026, 8, 3));
        assert_eq!(days[4], date(2026, 8, 7));
    }

    #[test]
    fn non_critical_items_defer_day_zero() {
        let window = PlanningWindow::new(date(2026, 8, 3), 5);
        let days = candidate_dates(&window, false, DatePreference::DeferToday);
        assert_eq!(
            days,
            vec![
                date(2026, 8, 4),
                date(2026, 8, 5),
                date(2026, 8, 3),
                date(2026, 8, 6),
                date(2026, 8, 7),
            ]
        );
    }

    #[test]
    fn defer_today_degenerates_gracefully() {
        let one = PlanningWindow::new(date(2026, 8, 3), 1);
        assert_eq!(
            candidate_dates(&one, false, DatePreference::DeferToday),
            vec![date(2026, 8, 3)]
        );

        let two = PlanningWindow::new(date(2026, 8, 3), 2);
        assert_eq!(
            candidate_dates(&two, false, DatePreference::DeferToday),
            vec![date(2026, 8, 4), date(2026, 8, 3)]
        );
    }
}
