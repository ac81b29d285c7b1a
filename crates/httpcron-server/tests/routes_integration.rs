//! End-to-end exercise of the REST control plane (spec.md §6) against an
//! in-memory `Repository`, driven through `tower::ServiceExt::oneshot`
//! rather than a bound TCP listener.

use std::collections::HashMap as StdHashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::NaiveDateTime;
use httpcron_core::clock::test_support::FakeClock;
use httpcron_core::config::AppConfig;
use httpcron_core::model::{Attempt, Run, RunStatus, Schedule, ScheduleStatus, Target};
use httpcron_db::{
    MetricsAggregate, Repository, RunListFilter, RunWithAttempts,
};
use httpcron_engine::{HttpDispatcher, SchedulerEngine};
use httpcron_server::routes::create_router;
use httpcron_server::state::AppState;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
struct FakeRepository {
    targets: Mutex<StdHashMap<Uuid, Target>>,
    schedules: Mutex<StdHashMap<Uuid, Schedule>>,
    runs: Mutex<StdHashMap<Uuid, Run>>,
    attempts: Mutex<Vec<Attempt>>,
}

#[async_trait]
impl Repository for FakeRepository {
    async fn create_target(&self, target: &Target) -> httpcron_core::error::Result<Target> {
        self.targets.lock().insert(target.id, target.clone());
        Ok(target.clone())
    }
    async fn get_target(&self, id: Uuid) -> httpcron_core::error::Result<Option<Target>> {
        Ok(self.targets.lock().get(&id).cloned())
    }
    async fn list_targets(&self) -> httpcron_core::error::Result<Vec<Target>> {
        Ok(self.targets.lock().values().cloned().collect())
    }
    async fn update_target(&self, target: &Target) -> httpcron_core::error::Result<Target> {
        self.targets.lock().insert(target.id, target.clone());
        Ok(target.clone())
    }
    async fn delete_target(&self, id: Uuid) -> httpcron_core::error::Result<bool> {
        Ok(self.targets.lock().remove(&id).is_some())
    }
    async fn create_schedule(&self, schedule: &Schedule) -> httpcron_core::error::Result<Schedule> {
        self.schedules.lock().insert(schedule.id, schedule.clone());
        Ok(schedule.clone())
    }
    async fn get_schedule(&self, id: Uuid) -> httpcron_core::error::Result<Option<Schedule>> {
        Ok(self.schedules.lock().get(&id).cloned())
    }
    async fn list_schedules(&self) -> httpcron_core::error::Result<Vec<Schedule>> {
        Ok(self.schedules.lock().values().cloned().collect())
    }
    async fn list_active_schedules(&self) -> httpcron_core::error::Result<Vec<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .values()
            .filter(|s| s.status == ScheduleStatus::Active)
            .cloned()
            .collect())
    }
    async fn update_schedule_status(
        &self,
        id: Uuid,
        status: ScheduleStatus,
        now: NaiveDateTime,
    ) -> httpcron_core::error::Result<Option<Schedule>> {
        let mut schedules = self.schedules.lock();
        if let Some(schedule) = schedules.get_mut(&id) {
            schedule.status = status;
            schedule.updated_at = now;
            Ok(Some(schedule.clone()))
        } else {
            Ok(None)
        }
    }
    async fn update_last_run(
        &self,
        id: Uuid,
        now: NaiveDateTime,
    ) -> httpcron_core::error::Result<()> {
        if let Some(schedule) = self.schedules.lock().get_mut(&id) {
            schedule.last_run_at = Some(now);
        }
        Ok(())
    }
    async fn delete_schedule(&self, id: Uuid) -> httpcron_core::error::Result<bool> {
        Ok(self.schedules.lock().remove(&id).is_some())
    }
    async fn create_run(&self, run: &Run) -> httpcron_core::error::Result<Run> {
        self.runs.lock().insert(run.id, run.clone());
        Ok(run.clone())
    }
    async fn get_run_with_attempts(
        &self,
        id: Uuid,
    ) -> httpcron_core::error::Result<Option<RunWithAttempts>> {
        let run = self.runs.lock().get(&id).cloned();
        Ok(run.map(|run| RunWithAttempts {
            run,
            attempts: self
                .attempts
                .lock()
                .iter()
                .filter(|a| a.run_id == id)
                .cloned()
                .collect(),
        }))
    }
    async fn list_runs(&self, _filter: &RunListFilter) -> httpcron_core::error::Result<Vec<Run>> {
        Ok(self.runs.lock().values().cloned().collect())
    }
    async fn finalize_run(
        &self,
        id: Uuid,
        status: RunStatus,
        completed_at: NaiveDateTime,
    ) -> httpcron_core::error::Result<()> {
        if let Some(run) = self.runs.lock().get_mut(&id) {
            run.status = status;
            run.completed_at = Some(completed_at);
        }
        Ok(())
    }
    async fn mark_orphans_on_startup(
        &self,
        _now: NaiveDateTime,
    ) -> httpcron_core::error::Result<u64> {
        Ok(0)
    }
    async fn append_attempt(&self, attempt: &Attempt) -> httpcron_core::error::Result<Attempt> {
        self.attempts.lock().push(attempt.clone());
        Ok(attempt.clone())
    }
    async fn aggregate_metrics(&self) -> httpcron_core::error::Result<MetricsAggregate> {
        Ok(MetricsAggregate::default())
    }
}

fn test_state() -> AppState {
    let repository: Arc<dyn Repository> = Arc::new(FakeRepository::default());
    let dispatcher = Arc::new(HttpDispatcher::new(1024 * 1024));
    let clock = Arc::new(FakeClock::new(chrono::Utc::now().naive_utc()));
    let config = Arc::new(AppConfig::default());
    let engine = Arc::new(SchedulerEngine::new(
        repository.clone(),
        dispatcher,
        clock,
        config.engine.clone(),
    ));
    AppState::new(config, repository, engine)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let router = create_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn target_create_then_get_round_trips() {
    let router = create_router(test_state());

    let payload = json!({
        "name": "webhook",
        "url": "https://example.test/hook",
        "method": "POST",
        "headers": {"X-Api-Key": "secret"}
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/targets")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/targets/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["url"], "https://example.test/hook");
}

#[tokio::test]
async fn target_create_rejects_non_http_url() {
    let router = create_router(test_state());
    let payload = json!({"name": "bad", "url": "ftp://nope", "method": "GET"});
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/targets")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_target_is_404() {
    let router = create_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/targets/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn schedule_create_requires_existing_target() {
    let router = create_router(test_state());
    let payload = json!({
        "target_id": Uuid::new_v4(),
        "schedule_type": "interval",
        "interval_seconds": 5
    });
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedules")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn schedule_create_rejects_window_without_duration() {
    let router = create_router(test_state());

    let target_payload = json!({"name": "t", "url": "https://example.test", "method": "GET"});
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/targets")
                .header("content-type", "application/json")
                .body(Body::from(target_payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let target = body_json(response).await;
    let target_id = target["id"].as_str().unwrap();

    let schedule_payload = json!({
        "target_id": target_id,
        "schedule_type": "window",
        "interval_seconds": 5
    });
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedules")
                .header("content-type", "application/json")
                .body(Body::from(schedule_payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pause_resume_pause_cycle() {
    let router = create_router(test_state());

    let target_payload = json!({"name": "t", "url": "https://example.test", "method": "GET"});
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/targets")
                .header("content-type", "application/json")
                .body(Body::from(target_payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let target = body_json(response).await;
    let target_id = target["id"].as_str().unwrap();

    let schedule_payload = json!({
        "target_id": target_id,
        "schedule_type": "interval",
        "interval_seconds": 5
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/schedules")
                .header("content-type", "application/json")
                .body(Body::from(schedule_payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let schedule = body_json(response).await;
    let schedule_id = schedule["id"].as_str().unwrap();

    // Resume a schedule that's already active fails (spec.md §6: 400).
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/schedules/{}/resume", schedule_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/schedules/{}/pause", schedule_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let paused = body_json(response).await;
    assert_eq!(paused["status"], "paused");

    // Pausing an already-paused schedule fails.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/schedules/{}/pause", schedule_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/schedules/{}/resume", schedule_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let resumed = body_json(response).await;
    assert_eq!(resumed["status"], "active");
}

#[tokio::test]
async fn metrics_endpoint_returns_totals() {
    let router = create_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totals"]["total_schedules"], 0);
}
