//! Models module for the dispatch planning architecture
//!
//! This module contains the data structures and types used to represent
//! work items, technicians, and plan items in the database.

pub mod planning_models;

// Re-export commonly used types for convenience
pub use planning_models::{
    Criticality, PlanItem, PlanSource, Technician, WorkItem, WorkItemPriority, WorkItemStatus,
    AFTERNOON_END, AFTERNOON_START, DAILY_CAP_MINUTES, DEFAULT_ESTIMATED_MINUTES, MORNING_END,
    MORNING_START, SLOT_STEP_MINUTES,
};
