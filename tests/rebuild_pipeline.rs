//! Rebuild pipeline behavior against an in-memory store
//!
//! Exercises lock mutual exclusion, guaranteed lock release, the purge /
//! reset step and the flush, without a live database.

#![cfg(feature = "database")]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use fieldplan::database::{PlanningStore, RebuildRequest, RebuildService};
use fieldplan::models::{
    Criticality, PlanItem, PlanSource, Technician, WorkItem, WorkItemPriority, WorkItemStatus,
    MORNING_START,
};
use fieldplan::planner::{Assignment, PlannerConfig, PlanningWindow};
use fieldplan::PlanningError;

#[derive(Default)]
struct MemState {
    locks: HashSet<String>,
    released: Vec<String>,
    work_items: Vec<WorkItem>,
    technicians: Vec<Technician>,
    plan_items: Vec<PlanItem>,
}

#[derive(Default)]
struct MemStore {
    state: Mutex<MemState>,
    fail_inserts: AtomicBool,
}

impl MemStore {
    fn with_state(state: MemState) -> Self {
        Self {
            state: Mutex::new(state),
            fail_inserts: AtomicBool::new(false),
        }
    }

    fn snapshot_plan_items(&self) -> Vec<PlanItem> {
        self.state.lock().unwrap().plan_items.clone()
    }

    fn snapshot_work_items(&self) -> Vec<WorkItem> {
        self.state.lock().unwrap().work_items.clone()
    }

    fn lock_held(&self, key: &str) -> bool {
        self.state.lock().unwrap().locks.contains(key)
    }

    fn releases(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }
}

#[async_trait]
impl PlanningStore for MemStore {
    async fn acquire_lock(&self, lock_key: &str, _ttl: Duration) -> Result<bool, PlanningError> {
        Ok(self.state.lock().unwrap().locks.insert(lock_key.to_string()))
    }

    async fn release_lock(&self, lock_key: &str) -> Result<(), PlanningError> {
        let mut state = self.state.lock().unwrap();
        state.locks.remove(lock_key);
        state.released.push(lock_key.to_string());
        Ok(())
    }

    async fn purge_auto_items(&self, window: &PlanningWindow) -> Result<u64, PlanningError> {
        let mut state = self.state.lock().unwrap();
        let start = window.start_date;
        let end = window.end_date();

        let purged_groups: HashSet<Uuid> = state
            .plan_items
            .iter()
            .filter(|pi| {
                pi.source == PlanSource::Auto
                    && !pi.is_fixed
                    && pi.plan_date >= start
                    && pi.plan_date <= end
            })
            .filter_map(|pi| pi.assignment_group_id)
            .collect();
        for item in &mut state.work_items {
            if let Some(group) = item.assignment_group_id {
                if purged_groups.contains(&group) {
                    item.status = WorkItemStatus::Open;
                    item.assignment_group_id = None;
                }
            }
        }

        let before = state.plan_items.len();
        state.plan_items.retain(|pi| {
            !(pi.source == PlanSource::Auto
                && !pi.is_fixed
                && pi.plan_date >= start
                && pi.plan_date <= end)
        });
        Ok((before - state.plan_items.len()) as u64)
    }

    async fn load_work_items(&self) -> Result<Vec<WorkItem>, PlanningError> {
        Ok(self.state.lock().unwrap().work_items.clone())
    }

    async fn load_technicians(&self) -> Result<Vec<Technician>, PlanningError> {
        Ok(self.state.lock().unwrap().technicians.clone())
    }

    async fn load_preserved_items(
        &self,
        window: &PlanningWindow,
    ) -> Result<Vec<PlanItem>, PlanningError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .plan_items
            .iter()
            .filter(|pi| {
                pi.is_preserved()
                    && pi.plan_date >= window.start_date
                    && pi.plan_date <= window.end_date()
            })
            .cloned()
            .collect())
    }

    async fn insert_plan_items(&self, items: &[PlanItem]) -> Result<(), PlanningError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(PlanningError::Internal("insert failed".to_string()));
        }
        self.state.lock().unwrap().plan_items.extend_from_slice(items);
        Ok(())
    }

    async fn mark_items_planned(&self, assignments: &[Assignment]) -> Result<(), PlanningError> {
        let mut state = self.state.lock().unwrap();
        for assignment in assignments {
            if let Some(item) = state
                .work_items
                .iter_mut()
                .find(|i| i.id == assignment.work_item_id)
            {
                item.status = WorkItemStatus::Planned;
                item.assignment_group_id = Some(assignment.assignment_group_id);
            }
        }
        Ok(())
    }
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
}

fn open_item(title: &str) -> WorkItem {
    WorkItem {
        id: Uuid::new_v4(),
        title: title.to_string(),
        category: "operational".to_string(),
        priority: WorkItemPriority::Normal,
        criticality: Criticality::NonCritical,
        sla_business_days: 3,
        estimated_minutes: 60,
        required_people: 1,
        required_skill_codes: vec![],
        status: WorkItemStatus::Open,
        created_at: Utc::now(),
        due_date: None,
        assignment_group_id: None,
    }
}

fn active_tech(name: &str) -> Technician {
    Technician {
        id: Uuid::new_v4(),
        name: name.to_string(),
        is_active: true,
        dispatch_priority: 100,
        is_wildcard: false,
        skills: HashSet::new(),
    }
}

fn service(store: MemStore) -> RebuildService<MemStore> {
    RebuildService::new(store, PlannerConfig::default())
}

#[tokio::test]
async fn happy_path_flushes_and_releases() {
    let store = MemStore::with_state(MemState {
        work_items: vec![open_item("portão"), open_item("câmera")],
        technicians: vec![active_tech("ana")],
        ..Default::default()
    });
    let service = service(store);
    let request = RebuildRequest::new(monday(), 7);

    let summary = service.rebuild(&request).await.unwrap();

    assert_eq!(summary.scheduled, 2);
    assert_eq!(summary.backlog, 2);
    let store = service.store();
    assert_eq!(store.snapshot_plan_items().len(), 2);
    assert!(store
        .snapshot_work_items()
        .iter()
        .all(|i| i.status == WorkItemStatus::Planned && i.assignment_group_id.is_some()));
    assert!(!store.lock_held("plan:2026-08-03:7"));
    assert_eq!(store.releases(), vec!["plan:2026-08-03:7".to_string()]);
}

#[tokio::test]
async fn concurrent_window_is_rejected_without_side_effects() {
    let store = MemStore::with_state(MemState {
        work_items: vec![open_item("portão")],
        technicians: vec![active_tech("ana")],
        ..Default::default()
    });
    store
        .state
        .lock()
        .unwrap()
        .locks
        .insert("plan:2026-08-03:7".to_string());

    let service = service(store);
    let err = service
        .rebuild(&RebuildRequest::new(monday(), 7))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    let store = service.store();
    assert!(store.snapshot_plan_items().is_empty());
    assert!(store
        .snapshot_work_items()
        .iter()
        .all(|i| i.status == WorkItemStatus::Open));
    // The loser must not release the winner's lock.
    assert!(store.lock_held("plan:2026-08-03:7"));
    assert!(store.releases().is_empty());
}

#[tokio::test]
async fn lock_is_released_when_the_flush_fails() {
    let store = MemStore::with_state(MemState {
        work_items: vec![open_item("portão")],
        technicians: vec![active_tech("ana")],
        ..Default::default()
    });
    store.fail_inserts.store(true, Ordering::SeqCst);

    let service = service(store);
    let err = service
        .rebuild(&RebuildRequest::new(monday(), 7))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanningError::Internal(_)));
    let store = service.store();
    assert!(!store.lock_held("plan:2026-08-03:7"));
    assert_eq!(store.releases(), vec!["plan:2026-08-03:7".to_string()]);
}

#[tokio::test]
async fn rebuild_purges_auto_rows_and_rederives() {
    let mut planned = open_item("já planejado");
    let old_group = Uuid::new_v4();
    planned.status = WorkItemStatus::Planned;
    planned.assignment_group_id = Some(old_group);
    // Critical, so the re-derivation lands on day 0 again.
    planned.criticality = Criticality::Critical;
    let planned_id = planned.id;

    let tech = active_tech("ana");
    let stale_auto = PlanItem {
        plan_date: monday(),
        technician_id: tech.id,
        work_item_id: Some(planned_id),
        start_minute: 900,
        end_minute: 960,
        sequence: 3,
        source: PlanSource::Auto,
        assignment_group_id: Some(old_group),
        is_fixed: false,
        manual_title: None,
    };
    let manual = PlanItem {
        plan_date: monday(),
        technician_id: tech.id,
        work_item_id: None,
        start_minute: MORNING_START,
        end_minute: MORNING_START + 60,
        sequence: 0,
        source: PlanSource::Manual,
        assignment_group_id: None,
        is_fixed: true,
        manual_title: Some("Reunião síndico".to_string()),
    };

    let store = MemStore::with_state(MemState {
        work_items: vec![planned],
        technicians: vec![tech],
        plan_items: vec![stale_auto, manual.clone()],
        ..Default::default()
    });

    let service = service(store);
    let summary = service
        .rebuild(&RebuildRequest::new(monday(), 7))
        .await
        .unwrap();

    // The stale auto row was purged and the item re-derived fresh.
    assert_eq!(summary.purged, 1);
    assert_eq!(summary.scheduled, 1);

    let store = service.store();
    let items = store.snapshot_plan_items();
    let manual_after: Vec<&PlanItem> = items.iter().filter(|pi| pi.is_preserved()).collect();
    assert_eq!(manual_after.len(), 1);
    assert_eq!(manual_after[0].start_minute, manual.start_minute);
    assert_eq!(manual_after[0].end_minute, manual.end_minute);
    assert_eq!(manual_after[0].manual_title, manual.manual_title);

    let rederived: Vec<&PlanItem> = items
        .iter()
        .filter(|pi| pi.source == PlanSource::Auto)
        .collect();
    assert_eq!(rederived.len(), 1);
    // The new booking starts after the fixed morning meeting and carries a
    // fresh assignment group.
    assert_eq!(rederived[0].start_minute, MORNING_START + 60);
    assert_ne!(rederived[0].assignment_group_id, Some(old_group));

    let work_items = store.snapshot_work_items();
    assert_eq!(work_items[0].status, WorkItemStatus::Planned);
    assert_ne!(work_items[0].assignment_group_id, Some(old_group));
}

#[tokio::test]
async fn invalid_day_count_never_touches_the_lock() {
    let store = MemStore::default();
    let service = service(store);

    let err = service
        .rebuild(&RebuildRequest::new(monday(), 0))
        .await
        .unwrap_err();

    assert!(matches!(err, PlanningError::InvalidRequest(_)));
    let store = service.store();
    assert!(store.releases().is_empty());
    assert!(!store.lock_held("plan:2026-08-03:0"));
}
