//! The Run Executor: per-schedule state machine that opens a Run, performs
//! up to `1 + max_retries` Attempts, closes the Run, and releases the
//! schedule from the Active-Execution Registry on every exit path. Registry
//! admission is collected up front and released after dispatch completes,
//! never held across the HTTP call itself.

use std::sync::Arc;
use std::time::Duration;

use httpcron_core::error::Result;
use httpcron_core::model::{Attempt, ErrorType, Run, RunStatus, Schedule};
use httpcron_core::Clock;
use httpcron_db::Repository;
use uuid::Uuid;

use crate::dispatcher::HttpDispatcher;
use crate::registry::{ActiveExecutionRegistry, OwnedAdmissionGuard};
use crate::shutdown::ShutdownHandle;

/// Runs a single admitted Schedule to completion: opens its Run, drives the
/// attempt loop against the HTTP Dispatcher, closes the Run.
pub struct RunExecutor {
    repository: Arc<dyn Repository>,
    dispatcher: Arc<HttpDispatcher>,
    clock: Arc<dyn Clock>,
}

impl RunExecutor {
    pub fn new(
        repository: Arc<dyn Repository>,
        dispatcher: Arc<HttpDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            clock,
        }
    }

    /// Executes `schedule` end to end: open Run, attempt loop, close Run.
    /// Callers are responsible for registry admission (see `try_spawn`);
    /// this method assumes the caller already holds an admission guard for
    /// the duration of the call.
    pub async fn execute(&self, schedule: &Schedule) -> Result<()> {
        let now = self.clock.now();

        let run = Run {
            id: Uuid::new_v4(),
            schedule_id: schedule.id,
            status: RunStatus::Pending,
            started_at: now,
            completed_at: None,
            created_at: now,
        };

        // Creating the Run also stamps `last_run_at` in the same transaction
        // (see `httpcron_db::PgRepository::create_run`), so this schedule
        // cannot be re-admitted by the next tick even after the registry
        // guard is released.
        let run = self.repository.create_run(&run).await?;

        tracing::info!(run_id = %run.id, schedule_id = %schedule.id, "run opened");

        let final_status = self.run_attempts(schedule, &run).await?;

        let completed_at = self.clock.now();
        self.repository
            .finalize_run(run.id, final_status, completed_at)
            .await?;

        tracing::info!(
            run_id = %run.id,
            schedule_id = %schedule.id,
            status = ?final_status,
            "run closed"
        );

        Ok(())
    }

    /// The attempt loop. Returns the terminal Run status.
    async fn run_attempts(&self, schedule: &Schedule, run: &Run) -> Result<RunStatus> {
        let max_attempts = 1 + schedule.max_retries.max(0);

        for attempt_number in 1..=max_attempts {
            // Re-resolve the Target on every attempt: the most recent
            // snapshot wins, so a Target update mid-Run only affects
            // attempts that haven't fired yet.
            let target = match self.repository.get_target(schedule.target_id).await? {
                Some(target) => target,
                None => {
                    self.record_target_missing(run, attempt_number).await?;
                    return Ok(RunStatus::Failed);
                }
            };

            let timeout = Duration::from_secs(schedule.request_timeout_seconds.max(1) as u64);
            let outcome = self
                .dispatcher
                .dispatch(
                    self.clock.as_ref(),
                    &target.url,
                    target.method,
                    target.headers.as_ref(),
                    target.body.as_ref(),
                    timeout,
                )
                .await;

            let success = outcome.is_success();

            let attempt = Attempt {
                id: Uuid::new_v4(),
                run_id: run.id,
                attempt_number,
                status_code: outcome.status_code,
                latency_ms: outcome.latency_ms,
                response_size_bytes: outcome.response_size_bytes,
                error_type: outcome.error_type,
                error_message: outcome.error_message,
                started_at: outcome.started_at,
                completed_at: outcome.completed_at,
                created_at: outcome.completed_at,
            };
            self.repository.append_attempt(&attempt).await?;

            tracing::info!(
                run_id = %run.id,
                attempt_number,
                status_code = ?attempt.status_code,
                error_type = ?attempt.error_type,
                "attempt recorded"
            );

            if success {
                return Ok(RunStatus::Success);
            }
        }

        Ok(RunStatus::Failed)
    }

    /// If the referenced Target no longer exists, the Run is finalized as
    /// `failed` with a single synthetic Attempt.
    async fn record_target_missing(&self, run: &Run, attempt_number: i32) -> Result<()> {
        let now = self.clock.now();
        let attempt = Attempt {
            id: Uuid::new_v4(),
            run_id: run.id,
            attempt_number,
            status_code: None,
            latency_ms: 0.0,
            response_size_bytes: 0,
            error_type: Some(ErrorType::Unknown),
            error_message: Some("target missing".to_string()),
            started_at: now,
            completed_at: now,
            created_at: now,
        };
        self.repository.append_attempt(&attempt).await?;
        tracing::warn!(run_id = %run.id, "target missing, run finalized as failed");
        Ok(())
    }
}

/// Attempts registry admission, and on success spawns a detached task that
/// runs `schedule` to completion and releases the registry entry and the
/// shutdown task guard on every exit path, including a panic inside the
/// executor. Returns `true` if a task was spawned, `false` if the schedule
/// was already in flight.
pub fn try_spawn(
    registry: Arc<ActiveExecutionRegistry>,
    repository: Arc<dyn Repository>,
    dispatcher: Arc<HttpDispatcher>,
    clock: Arc<dyn Clock>,
    schedule: Schedule,
    tasks: &ShutdownHandle,
) -> bool {
    let Some(admission) = OwnedAdmissionGuard::acquire(registry, schedule.id) else {
        return false;
    };

    let task_guard = tasks.register_task();
    let handle = tokio::spawn(async move {
        let _admission = admission;
        let _task_guard = task_guard;
        let executor = RunExecutor::new(repository, dispatcher, clock);
        if let Err(err) = executor.execute(&schedule).await {
            tracing::warn!(schedule_id = %schedule.id, error = %err, "run executor failed");
        }
    });
    tasks.track(handle);

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HttpDispatcher;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use httpcron_core::clock::test_support::FakeClock;
    use httpcron_core::model::{HttpMethod, RunStatus, ScheduleStatus, ScheduleType, Target};
    use httpcron_db::{MetricsAggregate, RunListFilter, RunWithAttempts};
    use parking_lot::Mutex;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ts(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    /// Minimal in-memory `Repository` used only to exercise `RunExecutor`
    /// in isolation from Postgres.
    #[derive(Default)]
    struct FakeRepository {
        targets: Mutex<StdHashMap<Uuid, Target>>,
        runs: Mutex<StdHashMap<Uuid, Run>>,
        attempts: Mutex<Vec<Attempt>>,
    }

    #[async_trait]
    impl Repository for FakeRepository {
        async fn create_target(&self, target: &Target) -> Result<Target> {
            self.targets.lock().insert(target.id, target.clone());
            Ok(target.clone())
        }
        async fn get_target(&self, id: Uuid) -> Result<Option<Target>> {
            Ok(self.targets.lock().get(&id).cloned())
        }
        async fn list_targets(&self) -> Result<Vec<Target>> {
            Ok(self.targets.lock().values().cloned().collect())
        }
        async fn update_target(&self, target: &Target) -> Result<Target> {
            self.targets.lock().insert(target.id, target.clone());
            Ok(target.clone())
        }
        async fn delete_target(&self, id: Uuid) -> Result<bool> {
            Ok(self.targets.lock().remove(&id).is_some())
        }
        async fn create_schedule(&self, schedule: &Schedule) -> Result<Schedule> {
            Ok(schedule.clone())
        }
        async fn get_schedule(&self, _id: Uuid) -> Result<Option<Schedule>> {
            Ok(None)
        }
        async fn list_schedules(&self) -> Result<Vec<Schedule>> {
            Ok(vec![])
        }
        async fn list_active_schedules(&self) -> Result<Vec<Schedule>> {
            Ok(vec![])
        }
        async fn update_schedule_status(
            &self,
            _id: Uuid,
            _status: ScheduleStatus,
            _now: NaiveDateTime,
        ) -> Result<Option<Schedule>> {
            Ok(None)
        }
        async fn update_last_run(&self, _id: Uuid, _now: NaiveDateTime) -> Result<()> {
            Ok(())
        }
        async fn delete_schedule(&self, _id: Uuid) -> Result<bool> {
            Ok(true)
        }
        async fn create_run(&self, run: &Run) -> Result<Run> {
            self.runs.lock().insert(run.id, run.clone());
            Ok(run.clone())
        }
        async fn get_run_with_attempts(&self, id: Uuid) -> Result<Option<RunWithAttempts>> {
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
        async fn list_runs(&self, _filter: &RunListFilter) -> Result<Vec<Run>> {
            Ok(self.runs.lock().values().cloned().collect())
        }
        async fn finalize_run(
            &self,
            id: Uuid,
            status: RunStatus,
            completed_at: NaiveDateTime,
        ) -> Result<()> {
            if let Some(run) = self.runs.lock().get_mut(&id) {
                run.status = status;
                run.completed_at = Some(completed_at);
            }
            Ok(())
        }
        async fn mark_orphans_on_startup(&self, _now: NaiveDateTime) -> Result<u64> {
            Ok(0)
        }
        async fn append_attempt(&self, attempt: &Attempt) -> Result<Attempt> {
            self.attempts.lock().push(attempt.clone());
            Ok(attempt.clone())
        }
        async fn aggregate_metrics(&self) -> Result<MetricsAggregate> {
            Ok(MetricsAggregate::default())
        }
    }

    fn schedule(target_id: Uuid, max_retries: i32) -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            target_id,
            schedule_type: ScheduleType::Interval,
            interval_seconds: 1,
            duration_seconds: None,
            status: ScheduleStatus::Active,
            started_at: ts(0),
            expires_at: None,
            last_run_at: None,
            max_retries,
            request_timeout_seconds: 5,
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    #[tokio::test]
    async fn successful_attempt_closes_run_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let target = Target {
            id: Uuid::new_v4(),
            name: "t".to_string(),
            url: format!("{}/ok", server.uri()),
            method: HttpMethod::Get,
            headers: None,
            body: None,
            created_at: ts(0),
            updated_at: ts(0),
        };

        let repository = Arc::new(FakeRepository::default());
        repository.create_target(&target).await.unwrap();
        let dispatcher = Arc::new(HttpDispatcher::new(10 * 1024 * 1024));
        let clock = Arc::new(FakeClock::new(ts(0)));

        let executor = RunExecutor::new(repository.clone(), dispatcher, clock);
        let schedule = schedule(target.id, 0);
        executor.execute(&schedule).await.unwrap();

        let runs = repository.runs.lock();
        let run = runs.values().next().unwrap();
        assert_eq!(run.status, RunStatus::Success);

        let attempts = repository.attempts.lock();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status_code, Some(200));
    }

    #[tokio::test]
    async fn retry_exhaustion_records_max_attempts_and_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let target = Target {
            id: Uuid::new_v4(),
            name: "t".to_string(),
            url: format!("{}/fail", server.uri()),
            method: HttpMethod::Get,
            headers: None,
            body: None,
            created_at: ts(0),
            updated_at: ts(0),
        };

        let repository = Arc::new(FakeRepository::default());
        repository.create_target(&target).await.unwrap();
        let dispatcher = Arc::new(HttpDispatcher::new(10 * 1024 * 1024));
        let clock = Arc::new(FakeClock::new(ts(0)));

        let executor = RunExecutor::new(repository.clone(), dispatcher, clock);
        let schedule = schedule(target.id, 2);
        executor.execute(&schedule).await.unwrap();

        let runs = repository.runs.lock();
        let run = runs.values().next().unwrap();
        assert_eq!(run.status, RunStatus::Failed);

        let attempts = repository.attempts.lock();
        assert_eq!(attempts.len(), 3);
        assert_eq!(
            attempts.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn missing_target_finalizes_run_as_failed_with_synthetic_attempt() {
        let repository = Arc::new(FakeRepository::default());
        let dispatcher = Arc::new(HttpDispatcher::new(10 * 1024 * 1024));
        let clock = Arc::new(FakeClock::new(ts(0)));

        let executor = RunExecutor::new(repository.clone(), dispatcher, clock);
        let schedule = schedule(Uuid::new_v4(), 1);
        executor.execute(&schedule).await.unwrap();

        let attempts = repository.attempts.lock();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].error_message.as_deref(), Some("target missing"));

        let runs = repository.runs.lock();
        assert_eq!(runs.values().next().unwrap().status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn try_spawn_refuses_when_already_admitted() {
        let registry = Arc::new(ActiveExecutionRegistry::new());
        let repository: Arc<dyn Repository> = Arc::new(FakeRepository::default());
        let dispatcher = Arc::new(HttpDispatcher::new(1024));
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(ts(0)));
        let handle = crate::shutdown::ShutdownHandle::new(crate::shutdown::ShutdownController::new());

        let schedule = schedule(Uuid::new_v4(), 0);
        assert!(registry.try_admit(schedule.id));

        let spawned = try_spawn(
            registry.clone(),
            repository,
            dispatcher,
            clock,
            schedule,
            &handle,
        );
        assert!(!spawned);
    }
}
