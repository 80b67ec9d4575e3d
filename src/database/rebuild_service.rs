//! Rebuild pipeline orchestration
//!
//! One rebuild is a single bounded batch: acquire the window lock, purge
//! prior auto plan items, load everything up front, run the in-memory
//! allocation pass, flush the results, release the lock. The lock release
//! runs on every exit path. No transaction spans the whole run; a failure
//! after the purge leaves partial progress rather than rolling back.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::plan_repository::PlanningStore;
use crate::error::PlanningError;
use crate::planner::{
    DayLoadLedger, PlannerConfig, PlanningSession, PlanningWindow, TechnicianRoster, WorkItemQueue,
};

/// Default number of days planned when the caller does not say.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Stale locks older than this are cleared at acquire time.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(900);

/// A validated rebuild request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RebuildRequest {
    pub start_date: NaiveDate,
    pub days: i64,
}

impl RebuildRequest {
    pub fn new(start_date: NaiveDate, days: i64) -> Self {
        Self { start_date, days }
    }
}

/// What one rebuild did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RebuildSummary {
    /// Work items that received a full assignment group.
    pub scheduled: usize,
    /// Size of the schedulable backlog that entered the pass.
    pub backlog: usize,
    /// Prior auto plan items purged from the window.
    pub purged: u64,
}

/// Drives a complete plan rebuild against a [`PlanningStore`].
pub struct RebuildService<S> {
    store: S,
    config: PlannerConfig,
    lock_ttl: Duration,
}

impl<S: PlanningStore> RebuildService<S> {
    pub fn new(store: S, config: PlannerConfig) -> Self {
        Self {
            store,
            config,
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one rebuild. Exactly one concurrent caller per window wins the
    /// lock; everyone else gets [`PlanningError::LockConflict`] with zero
    /// side effects.
    pub async fn rebuild(&self, request: &RebuildRequest) -> Result<RebuildSummary, PlanningError> {
        if request.days < 1 || request.days > 365 {
            return Err(PlanningError::invalid(format!(
                "days must be between 1 and 365, got {}",
                request.days
            )));
        }

        let window = PlanningWindow::new(request.start_date, request.days);
        let lock_key = window.lock_key();

        if !self.store.acquire_lock(&lock_key, self.lock_ttl).await? {
            return Err(PlanningError::LockConflict);
        }
        info!(%lock_key, "acquired planning lock");

        let result = self.run_locked(&window).await;

        // Mandatory on success, validation failure and exception alike. A
        // failed release is logged rather than clobbering the run's result.
        if let Err(e) = self.store.release_lock(&lock_key).await {
            warn!(%lock_key, error = %e, "failed to release planning lock");
        }

        result
    }

    async fn run_locked(&self, window: &PlanningWindow) -> Result<RebuildSummary, PlanningError> {
        let purged = self.store.purge_auto_items(window).await?;

        // All data is loaded up front; allocation then runs purely in
        // memory and the results are flushed once at the end.
        let technicians = self.store.load_technicians().await?;
        let preserved = self.store.load_preserved_items(window).await?;
        let work_items = self.store.load_work_items().await?;

        let queue = WorkItemQueue::build(work_items, &self.config);
        let backlog = queue.len();

        let mut ledger = DayLoadLedger::new();
        ledger.seed_preserved(&preserved);

        let mut session = PlanningSession::new(
            self.config.clone(),
            *window,
            TechnicianRoster::new(technicians),
            ledger,
            queue,
        );
        let outcome = session.allocate();

        self.store.insert_plan_items(&outcome.plan_items).await?;
        self.store.mark_items_planned(&outcome.scheduled).await?;

        let scheduled = outcome.scheduled_count();
        info!(scheduled, backlog, purged, "plan rebuild complete");

        Ok(RebuildSummary {
            scheduled,
            backlog,
            purged,
        })
    }
}
