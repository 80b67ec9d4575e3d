//! Plan persistence repository
//!
//! All database reads and writes of the rebuild pipeline live here:
//! window locking, purge of prior auto plan items, backlog and roster
//! loading, and the bulk flush of a finished allocation pass. The engine
//! itself never touches the database.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PlanningError;
use crate::models::{
    Criticality, PlanItem, PlanSource, Technician, WorkItem, WorkItemPriority, WorkItemStatus,
};
use crate::planner::{Assignment, PlanningWindow};

/// Persistence operations required by the rebuild pipeline.
///
/// The pipeline is written against this trait so the allocation flow can
/// be exercised end-to-end with an in-memory store.
#[async_trait]
pub trait PlanningStore: Send + Sync {
    /// Insert-or-conflict window lock. Returns false when another run
    /// already holds the key. Expired locks (older than `ttl`) are cleared
    /// first so a crashed run cannot block the planner forever.
    async fn acquire_lock(&self, lock_key: &str, ttl: Duration) -> Result<bool, PlanningError>;

    /// Unconditional lock release; must be called on every exit path.
    async fn release_lock(&self, lock_key: &str) -> Result<(), PlanningError>;

    /// Delete auto-sourced plan items inside the window (manual and fixed
    /// rows untouched) and reset the work items that owned them back to
    /// open. Returns the number of deleted rows.
    async fn purge_auto_items(&self, window: &PlanningWindow) -> Result<u64, PlanningError>;

    /// Backlog candidates: open and planned work items.
    async fn load_work_items(&self) -> Result<Vec<WorkItem>, PlanningError>;

    /// Active technicians with their skill codes.
    async fn load_technicians(&self) -> Result<Vec<Technician>, PlanningError>;

    /// Manual/fixed plan items inside the window, used to seed the ledger.
    async fn load_preserved_items(
        &self,
        window: &PlanningWindow,
    ) -> Result<Vec<PlanItem>, PlanningError>;

    /// Bulk-insert generated plan items.
    async fn insert_plan_items(&self, items: &[PlanItem]) -> Result<(), PlanningError>;

    /// Bulk-update scheduled work items to planned with their group ids.
    async fn mark_items_planned(&self, assignments: &[Assignment]) -> Result<(), PlanningError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_technicians_with_wildcard(
        &self,
        include_wildcard: bool,
    ) -> Result<Vec<Technician>, sqlx::Error> {
        let wildcard_column = if include_wildcard {
            "t.is_wildcard"
        } else {
            "false AS is_wildcard"
        };
        let query = format!(
            r#"SELECT t.id, t.name, t.dispatch_priority, {}, s.code AS skill_code
               FROM technicians t
               LEFT JOIN technician_skills ts ON ts.technician_id = t.id
               LEFT JOIN skills s ON s.id = ts.skill_id
               WHERE t.is_active = true
               ORDER BY t.id"#,
            wildcard_column
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut order: Vec<Uuid> = Vec::new();
        let mut by_id: HashMap<Uuid, Technician> = HashMap::new();
        for row in rows {
            let id: Uuid = row.get("id");
            let entry = by_id.entry(id).or_insert_with(|| {
                order.push(id);
                Technician {
                    id,
                    name: row.get("name"),
                    is_active: true,
                    dispatch_priority: row
                        .try_get::<Option<i32>, _>("dispatch_priority")
                        .unwrap_or(None)
                        .unwrap_or(100),
                    is_wildcard: row
                        .try_get::<Option<bool>, _>("is_wildcard")
                        .unwrap_or(None)
                        .unwrap_or(false),
                    skills: Default::default(),
                }
            });
            if let Some(code) = row.try_get::<Option<String>, _>("skill_code").unwrap_or(None) {
                entry.skills.insert(code);
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }
}

#[async_trait]
impl PlanningStore for PgPlanRepository {
    async fn acquire_lock(&self, lock_key: &str, ttl: Duration) -> Result<bool, PlanningError> {
        // A crashed run leaves its row behind; anything older than the TTL
        // is considered stale and cleared before the insert attempt.
        sqlx::query(
            r#"DELETE FROM planner_locks
               WHERE lock_key = $1 AND locked_at < now() - make_interval(secs => $2)"#,
        )
        .bind(lock_key)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        let result = sqlx::query(
            r#"INSERT INTO planner_locks (lock_key, locked_at)
               VALUES ($1, now())
               ON CONFLICT (lock_key) DO NOTHING"#,
        )
        .bind(lock_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_lock(&self, lock_key: &str) -> Result<(), PlanningError> {
        sqlx::query(r#"DELETE FROM planner_locks WHERE lock_key = $1"#)
            .bind(lock_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_auto_items(&self, window: &PlanningWindow) -> Result<u64, PlanningError> {
        let start = window.start_date;
        let end = window.end_date();

        // Reset the owners first so a crash between the two statements
        // leaves re-schedulable items rather than orphaned plan rows.
        sqlx::query(
            r#"UPDATE work_items
               SET status = 'open', assignment_group_id = NULL
               WHERE assignment_group_id IN (
                   SELECT assignment_group_id FROM plan_items
                   WHERE source = 'auto' AND NOT is_fixed
                     AND assignment_group_id IS NOT NULL
                     AND plan_date BETWEEN $1 AND $2
               )"#,
        )
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;

        let deleted = sqlx::query(
            r#"DELETE FROM plan_items
               WHERE source = 'auto' AND NOT is_fixed
                 AND plan_date BETWEEN $1 AND $2"#,
        )
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;

        info!(
            purged = deleted.rows_affected(),
            %start, %end,
            "purged prior auto plan items"
        );
        Ok(deleted.rows_affected())
    }

    async fn load_work_items(&self) -> Result<Vec<WorkItem>, PlanningError> {
        let rows = sqlx::query(
            r#"SELECT id, title, category, priority, criticality, sla_business_days,
                      estimated_minutes, required_people, required_skill_codes,
                      status, created_at, due_date, assignment_group_id
               FROM work_items
               WHERE status IN ('open', 'planned')
               ORDER BY created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let priority: String = row.get("priority");
                let criticality: String = row.get("criticality");
                let status: String = row.get("status");
                WorkItem {
                    id: row.get("id"),
                    title: row.get("title"),
                    category: row.get("category"),
                    priority: WorkItemPriority::from_code(&priority),
                    criticality: Criticality::from_code(&criticality),
                    sla_business_days: row.get("sla_business_days"),
                    estimated_minutes: row.get("estimated_minutes"),
                    required_people: row.get("required_people"),
                    required_skill_codes: row.get("required_skill_codes"),
                    status: WorkItemStatus::from_code(&status),
                    created_at: row.get::<DateTime<Utc>, _>("created_at"),
                    due_date: row.get::<Option<NaiveDate>, _>("due_date"),
                    assignment_group_id: row.get("assignment_group_id"),
                }
            })
            .collect())
    }

    async fn load_technicians(&self) -> Result<Vec<Technician>, PlanningError> {
        match self.load_technicians_with_wildcard(true).await {
            Ok(technicians) => Ok(technicians),
            Err(e) if is_undefined_column(&e) => {
                // Roster schema without the wildcard column: degrade to
                // treating everyone as a regular technician.
                warn!("technicians.is_wildcard column missing, re-querying without it");
                Ok(self.load_technicians_with_wildcard(false).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_preserved_items(
        &self,
        window: &PlanningWindow,
    ) -> Result<Vec<PlanItem>, PlanningError> {
        let rows = sqlx::query(
            r#"SELECT plan_date, technician_id, work_item_id, start_minute, end_minute,
                      sequence, source, assignment_group_id, is_fixed, manual_title
               FROM plan_items
               WHERE plan_date BETWEEN $1 AND $2
                 AND (source = 'manual' OR is_fixed)
               ORDER BY plan_date, technician_id, start_minute"#,
        )
        .bind(window.start_date)
        .bind(window.end_date())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let source: Option<String> = row.get("source");
                PlanItem {
                    plan_date: row.get("plan_date"),
                    technician_id: row.get("technician_id"),
                    work_item_id: row.get("work_item_id"),
                    start_minute: row.get("start_minute"),
                    end_minute: row.get("end_minute"),
                    sequence: row.get("sequence"),
                    source: PlanSource::from_code(source.as_deref().unwrap_or("auto")),
                    assignment_group_id: row.get("assignment_group_id"),
                    is_fixed: row
                        .try_get::<Option<bool>, _>("is_fixed")
                        .unwrap_or(None)
                        .unwrap_or(false),
                    manual_title: row.get("manual_title"),
                }
            })
            .collect())
    }

    async fn insert_plan_items(&self, items: &[PlanItem]) -> Result<(), PlanningError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut plan_dates: Vec<NaiveDate> = Vec::with_capacity(items.len());
        let mut technician_ids: Vec<Uuid> = Vec::with_capacity(items.len());
        let mut work_item_ids: Vec<Option<Uuid>> = Vec::with_capacity(items.len());
        let mut start_minutes: Vec<i32> = Vec::with_capacity(items.len());
        let mut end_minutes: Vec<i32> = Vec::with_capacity(items.len());
        let mut sequences: Vec<i32> = Vec::with_capacity(items.len());
        let mut sources: Vec<String> = Vec::with_capacity(items.len());
        let mut group_ids: Vec<Option<Uuid>> = Vec::with_capacity(items.len());
        let mut fixed: Vec<bool> = Vec::with_capacity(items.len());
        for item in items {
            plan_dates.push(item.plan_date);
            technician_ids.push(item.technician_id);
            work_item_ids.push(item.work_item_id);
            start_minutes.push(item.start_minute);
            end_minutes.push(item.end_minute);
            sequences.push(item.sequence);
            sources.push(item.source.as_str().to_string());
            group_ids.push(item.assignment_group_id);
            fixed.push(item.is_fixed);
        }

        sqlx::query(
            r#"INSERT INTO plan_items
                   (plan_date, technician_id, work_item_id, start_minute, end_minute,
                    sequence, source, assignment_group_id, is_fixed)
               SELECT * FROM UNNEST(
                   $1::date[], $2::uuid[], $3::uuid[], $4::int4[], $5::int4[],
                   $6::int4[], $7::text[], $8::uuid[], $9::bool[])"#,
        )
        .bind(&plan_dates)
        .bind(&technician_ids)
        .bind(&work_item_ids)
        .bind(&start_minutes)
        .bind(&end_minutes)
        .bind(&sequences)
        .bind(&sources)
        .bind(&group_ids)
        .bind(&fixed)
        .execute(&self.pool)
        .await?;

        info!(inserted = items.len(), "bulk-inserted plan items");
        Ok(())
    }

    async fn mark_items_planned(&self, assignments: &[Assignment]) -> Result<(), PlanningError> {
        if assignments.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = assignments.iter().map(|a| a.work_item_id).collect();
        let groups: Vec<Uuid> = assignments.iter().map(|a| a.assignment_group_id).collect();

        sqlx::query(
            r#"UPDATE work_items AS w
               SET status = 'planned', assignment_group_id = u.group_id
               FROM (SELECT UNNEST($1::uuid[]) AS id, UNNEST($2::uuid[]) AS group_id) AS u
               WHERE w.id = u.id"#,
        )
        .bind(&ids)
        .bind(&groups)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Postgres "undefined_column" (42703): an optional roster column is
/// absent and the caller should degrade instead of failing the run.
fn is_undefined_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("42703"),
        _ => false,
    }
}
