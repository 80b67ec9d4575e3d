//! FIELDPLAN - Technician Dispatch Planning Engine
//!
//! Core of a WhatsApp-centric customer-service platform's scheduling
//! subsystem: given a multi-day planning window, a backlog of service
//! tickets requiring specific skills, and a roster of technicians, produce
//! a conflict-free assignment of technicians to business-hour slots.
//!
//! The engine is greedy and single-pass: a committed assignment is never
//! bumped by a later item, and manual bookings are left untouched.
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldplan::models::{Technician, WorkItem};
//! use fieldplan::planner::{
//!     DayLoadLedger, PlannerConfig, PlanningSession, PlanningWindow, TechnicianRoster,
//!     WorkItemQueue,
//! };
//!
//! # fn demo(backlog: Vec<WorkItem>, technicians: Vec<Technician>) {
//! let config = PlannerConfig::default();
//! let window = PlanningWindow::new(chrono::NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(), 7);
//! let queue = WorkItemQueue::build(backlog, &config);
//! let mut session = PlanningSession::new(
//!     config,
//!     window,
//!     TechnicianRoster::new(technicians),
//!     DayLoadLedger::new(),
//!     queue,
//! );
//! let outcome = session.allocate();
//! println!("scheduled {} items", outcome.scheduled_count());
//! # }
//! ```

// Core error handling
pub mod error;

// Domain models
pub mod models;

// The in-memory allocation engine
pub mod planner;

// Database integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

pub use error::PlanningError;
