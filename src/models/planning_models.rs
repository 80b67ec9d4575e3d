//! Domain models for the dispatch planning engine
//!
//! These types mirror the `work_items`, `technicians` and `plan_items` tables.
//! The engine reads work items and technicians, and produces plan items; it
//! never mutates a technician within a run.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum assigned minutes per technician per date.
pub const DAILY_CAP_MINUTES: i32 = 480;

/// Working hours, in minutes from midnight. The lunch gap 12:00-13:00 is
/// never schedulable and an interval must fit entirely inside one block.
pub const MORNING_START: i32 = 8 * 60;
pub const MORNING_END: i32 = 12 * 60;
pub const AFTERNOON_START: i32 = 13 * 60;
pub const AFTERNOON_END: i32 = 17 * 60;

/// Granularity of the slot search grid.
pub const SLOT_STEP_MINUTES: i32 = 15;

/// Fallback duration for work items with no usable estimate.
pub const DEFAULT_ESTIMATED_MINUTES: i32 = 60;

/// Work item priority, ranked urgent > high > normal > low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "VARCHAR", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum WorkItemPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl WorkItemPriority {
    /// Numeric rank used by the backlog comparator; higher is more urgent.
    pub fn rank(self) -> i32 {
        match self {
            Self::Urgent => 4,
            Self::High => 3,
            Self::Normal => 2,
            Self::Low => 1,
        }
    }

    /// Parse the database code, defaulting unknown values to `normal`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "urgent" => Self::Urgent,
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Normal,
        }
    }
}

/// Criticality flag forcing same-day-eligible, highest-precedence scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Critical,
    #[default]
    NonCritical,
}

impl Criticality {
    pub fn from_code(code: &str) -> Self {
        match code {
            "critical" => Self::Critical,
            _ => Self::NonCritical,
        }
    }
}

/// Work item status within the scheduling lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "VARCHAR", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum WorkItemStatus {
    #[default]
    Open,
    Planned,
}

impl WorkItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Planned => "planned",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "planned" => Self::Planned,
            _ => Self::Open,
        }
    }
}

/// Origin of a plan item. Auto rows are purged and re-derived on every
/// rebuild; manual rows belong to human operators and are never touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "VARCHAR", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    #[default]
    Auto,
    Manual,
}

impl PlanSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "manual" => Self::Manual,
            _ => Self::Auto,
        }
    }
}

/// A unit of technician-assignable work derived from a service ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub priority: WorkItemPriority,
    pub criticality: Criticality,
    pub sla_business_days: i32,
    pub estimated_minutes: i32,
    pub required_people: i32,
    pub required_skill_codes: Vec<String>,
    pub status: WorkItemStatus,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub assignment_group_id: Option<Uuid>,
}

impl WorkItem {
    /// Whether the item must be scheduled with critical precedence: either
    /// flagged critical or carrying a zero-day SLA.
    pub fn dispatch_critical(&self) -> bool {
        self.criticality == Criticality::Critical || self.sla_business_days == 0
    }

    /// Slot duration in minutes, falling back to the default for
    /// non-positive estimates.
    pub fn duration_minutes(&self) -> i32 {
        if self.estimated_minutes > 0 {
            self.estimated_minutes
        } else {
            DEFAULT_ESTIMATED_MINUTES
        }
    }

    /// How many technicians must be booked together, at least one.
    pub fn people_needed(&self) -> usize {
        self.required_people.max(1) as usize
    }
}

/// A schedulable resource. Read-only to the engine within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub dispatch_priority: i32,
    pub is_wildcard: bool,
    pub skills: HashSet<String>,
}

impl Technician {
    /// True when the technician's skill set covers every required code.
    pub fn has_skills(&self, required: &[String]) -> bool {
        required.iter().all(|code| self.skills.contains(code))
    }
}

/// One technician's committed time interval for one work item on one date.
///
/// `work_item_id` is null for manually created items; `is_fixed` marks
/// operator-pinned rows that the rebuild must leave in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub plan_date: NaiveDate,
    pub technician_id: Uuid,
    pub work_item_id: Option<Uuid>,
    pub start_minute: i32,
    pub end_minute: i32,
    pub sequence: i32,
    pub source: PlanSource,
    pub assignment_group_id: Option<Uuid>,
    pub is_fixed: bool,
    pub manual_title: Option<String>,
}

impl PlanItem {
    pub fn duration_minutes(&self) -> i32 {
        self.end_minute - self.start_minute
    }

    /// Manual and fixed rows are both preserved across rebuilds and both
    /// occupy the technician's day from the ledger's point of view.
    pub fn is_preserved(&self) -> bool {
        self.source == PlanSource::Manual || self.is_fixed
    }
}
