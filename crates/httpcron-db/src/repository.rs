//! The `Repository` trait: the storage interface the Scheduler Engine and
//! control plane depend on.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use httpcron_core::error::Result;
use httpcron_core::model::{Attempt, Run, RunStatus, Schedule, ScheduleStatus, Target};
use serde::Serialize;
use uuid::Uuid;

/// Filters and pagination for `Repository::list_runs`.
#[derive(Debug, Clone, Default)]
pub struct RunListFilter {
    pub schedule_id: Option<Uuid>,
    pub status: Option<RunStatus>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub limit: i64,
    pub offset: i64,
}

impl RunListFilter {
    pub fn new() -> Self {
        Self {
            schedule_id: None,
            status: None,
            start_time: None,
            end_time: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// A Run together with its Attempts, ordered by ascending `attempt_number`.
#[derive(Debug, Clone, Serialize)]
pub struct RunWithAttempts {
    pub run: Run,
    pub attempts: Vec<Attempt>,
}

/// Aggregate totals returned by `GET /metrics`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsTotals {
    pub total_schedules: i64,
    pub active_schedules: i64,
    pub paused_schedules: i64,
    pub total_runs: i64,
    pub total_success: i64,
    pub total_failures: i64,
    pub avg_latency_ms: f64,
}

/// Per-schedule breakdown returned alongside `MetricsTotals`.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleMetrics {
    pub schedule_id: Uuid,
    pub total_runs: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub avg_latency_ms: f64,
    pub last_run_at: Option<NaiveDateTime>,
}

/// Full `/metrics` payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsAggregate {
    pub totals: MetricsTotals,
    pub per_schedule: Vec<ScheduleMetrics>,
}

/// The persistence interface the core depends on. All multi-row mutations
/// (schedule status changes, run open/close) are expected to execute in a
/// single transaction; that atomicity is the contract, not just an
/// implementation detail, since it is what makes `last_run_at` updates and
/// Run opens race-free.
#[async_trait]
pub trait Repository: Send + Sync {
    // Target
    async fn create_target(&self, target: &Target) -> Result<Target>;
    async fn get_target(&self, id: Uuid) -> Result<Option<Target>>;
    async fn list_targets(&self) -> Result<Vec<Target>>;
    async fn update_target(&self, target: &Target) -> Result<Target>;
    async fn delete_target(&self, id: Uuid) -> Result<bool>;

    // Schedule
    async fn create_schedule(&self, schedule: &Schedule) -> Result<Schedule>;
    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>>;
    async fn list_schedules(&self) -> Result<Vec<Schedule>>;
    async fn list_active_schedules(&self) -> Result<Vec<Schedule>>;
    async fn update_schedule_status(
        &self,
        id: Uuid,
        status: ScheduleStatus,
        now: NaiveDateTime,
    ) -> Result<Option<Schedule>>;
    /// Sets `last_run_at = now` on the schedule. The Run insert and this
    /// update commit in the same transaction.
    async fn update_last_run(&self, id: Uuid, now: NaiveDateTime) -> Result<()>;
    async fn delete_schedule(&self, id: Uuid) -> Result<bool>;

    // Run
    /// Opens a Run (`status = pending`) and stamps the owning schedule's
    /// `last_run_at` in one transaction.
    async fn create_run(&self, run: &Run) -> Result<Run>;
    async fn get_run_with_attempts(&self, id: Uuid) -> Result<Option<RunWithAttempts>>;
    async fn list_runs(&self, filter: &RunListFilter) -> Result<Vec<Run>>;
    async fn finalize_run(
        &self,
        id: Uuid,
        status: RunStatus,
        completed_at: NaiveDateTime,
    ) -> Result<()>;
    /// Rewrites every still-`pending` Run left over from an unclean shutdown
    /// as `failed`/`unknown`/"interrupted". Idempotent: only `pending` rows
    /// match.
    async fn mark_orphans_on_startup(&self, now: NaiveDateTime) -> Result<u64>;

    // Attempt
    async fn append_attempt(&self, attempt: &Attempt) -> Result<Attempt>;

    // Metrics
    async fn aggregate_metrics(&self) -> Result<MetricsAggregate>;
}
