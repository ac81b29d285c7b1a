//! `PgRepository`: the `Repository` trait implemented against
//! `sqlx::PgPool`, built on `format!`-assembled dynamic SQL, a `.bind()`
//! chain per query, and `Error::database_with_source` for failure mapping.
//! Orphan recovery uses `FOR UPDATE SKIP LOCKED` so concurrent instances
//! never double-claim a row.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use httpcron_core::error::{Error, Result};
use httpcron_core::model::{Attempt, Run, RunStatus, Schedule, ScheduleStatus, Target};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{run_status_str, schedule_status_str, AttemptRow, RunRow, ScheduleRow, TargetRow};
use crate::repository::{
    MetricsAggregate, MetricsTotals, Repository, RunListFilter, RunWithAttempts, ScheduleMetrics,
};

/// Postgres-backed `Repository` implementation.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create_target(&self, target: &Target) -> Result<Target> {
        let row = TargetRow::from(target);
        let query = format!(
            r#"
            INSERT INTO targets (id, name, url, method, headers, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TargetRow::COLUMNS
        );
        let inserted: TargetRow = sqlx::query_as(&query)
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.url)
            .bind(&row.method)
            .bind(&row.headers)
            .bind(&row.body)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to create target", e))?;
        inserted.try_into()
    }

    async fn get_target(&self, id: Uuid) -> Result<Option<Target>> {
        let query = format!("SELECT {} FROM targets WHERE id = $1", TargetRow::COLUMNS);
        let row: Option<TargetRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to fetch target", e))?;
        row.map(Target::try_from).transpose()
    }

    async fn list_targets(&self) -> Result<Vec<Target>> {
        let query = format!(
            "SELECT {} FROM targets ORDER BY created_at ASC",
            TargetRow::COLUMNS
        );
        let rows: Vec<TargetRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to list targets", e))?;
        rows.into_iter().map(Target::try_from).collect()
    }

    async fn update_target(&self, target: &Target) -> Result<Target> {
        let row = TargetRow::from(target);
        let query = format!(
            r#"
            UPDATE targets SET name = $2, url = $3, method = $4, headers = $5, body = $6, updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            TargetRow::COLUMNS
        );
        let updated: TargetRow = sqlx::query_as(&query)
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.url)
            .bind(&row.method)
            .bind(&row.headers)
            .bind(&row.body)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to update target", e))?;
        updated.try_into()
    }

    async fn delete_target(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM targets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to delete target", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_schedule(&self, schedule: &Schedule) -> Result<Schedule> {
        let row = ScheduleRow::from(schedule);
        let query = format!(
            r#"
            INSERT INTO schedules (id, target_id, schedule_type, interval_seconds, duration_seconds, status, started_at, expires_at, last_run_at, max_retries, request_timeout_seconds, created_at, updated_at)
            VALUES ($1, $2, $3::schedule_type, $4, $5, $6::schedule_status, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            ScheduleRow::COLUMNS
        );
        let inserted: ScheduleRow = sqlx::query_as(&query)
            .bind(row.id)
            .bind(row.target_id)
            .bind(&row.schedule_type)
            .bind(row.interval_seconds)
            .bind(row.duration_seconds)
            .bind(&row.status)
            .bind(row.started_at)
            .bind(row.expires_at)
            .bind(row.last_run_at)
            .bind(row.max_retries)
            .bind(row.request_timeout_seconds)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to create schedule", e))?;
        inserted.try_into()
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>> {
        let query = format!(
            "SELECT {} FROM schedules WHERE id = $1",
            ScheduleRow::COLUMNS
        );
        let row: Option<ScheduleRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to fetch schedule", e))?;
        row.map(Schedule::try_from).transpose()
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let query = format!(
            "SELECT {} FROM schedules ORDER BY created_at ASC",
            ScheduleRow::COLUMNS
        );
        let rows: Vec<ScheduleRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to list schedules", e))?;
        rows.into_iter().map(Schedule::try_from).collect()
    }

    async fn list_active_schedules(&self) -> Result<Vec<Schedule>> {
        let query = format!(
            "SELECT {} FROM schedules WHERE status = 'active'::schedule_status ORDER BY created_at ASC",
            ScheduleRow::COLUMNS
        );
        let rows: Vec<ScheduleRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to list active schedules", e))?;
        rows.into_iter().map(Schedule::try_from).collect()
    }

    async fn update_schedule_status(
        &self,
        id: Uuid,
        status: ScheduleStatus,
        now: NaiveDateTime,
    ) -> Result<Option<Schedule>> {
        let query = format!(
            r#"
            UPDATE schedules SET status = $2::schedule_status, updated_at = $3
            WHERE id = $1
            RETURNING {}
            "#,
            ScheduleRow::COLUMNS
        );
        let row: Option<ScheduleRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(schedule_status_str(status))
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to update schedule status", e))?;
        row.map(Schedule::try_from).transpose()
    }

    async fn update_last_run(&self, id: Uuid, now: NaiveDateTime) -> Result<()> {
        sqlx::query("UPDATE schedules SET last_run_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to update last_run_at", e))?;
        Ok(())
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to delete schedule", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_run(&self, run: &Run) -> Result<Run> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::database_with_source("failed to open transaction", e))?;

        let query = format!(
            r#"
            INSERT INTO runs (id, schedule_id, status, started_at, completed_at, created_at)
            VALUES ($1, $2, $3::run_status, $4, $5, $6)
            RETURNING {}
            "#,
            RunRow::COLUMNS
        );
        let inserted: RunRow = sqlx::query_as(&query)
            .bind(run.id)
            .bind(run.schedule_id)
            .bind(run_status_str(run.status))
            .bind(run.started_at)
            .bind(run.completed_at)
            .bind(run.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("failed to create run", e))?;

        sqlx::query("UPDATE schedules SET last_run_at = $2, updated_at = $2 WHERE id = $1")
            .bind(run.schedule_id)
            .bind(run.started_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::database_with_source("failed to stamp last_run_at", e))?;

        tx.commit()
            .await
            .map_err(|e| Error::database_with_source("failed to commit run open", e))?;

        inserted.try_into()
    }

    async fn get_run_with_attempts(&self, id: Uuid) -> Result<Option<RunWithAttempts>> {
        let query = format!("SELECT {} FROM runs WHERE id = $1", RunRow::COLUMNS);
        let run_row: Option<RunRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to fetch run", e))?;

        let Some(run_row) = run_row else {
            return Ok(None);
        };
        let run = Run::try_from(run_row)?;

        let attempts_query = format!(
            "SELECT {} FROM attempts WHERE run_id = $1 ORDER BY attempt_number ASC",
            AttemptRow::COLUMNS
        );
        let attempt_rows: Vec<AttemptRow> = sqlx::query_as(&attempts_query)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to fetch attempts", e))?;
        let attempts = attempt_rows
            .into_iter()
            .map(Attempt::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(RunWithAttempts { run, attempts }))
    }

    async fn list_runs(&self, filter: &RunListFilter) -> Result<Vec<Run>> {
        let mut conditions = vec!["1=1".to_string()];
        if filter.schedule_id.is_some() {
            conditions.push("schedule_id = $1".to_string());
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${}::run_status", next_placeholder(&conditions)));
        }
        if filter.start_time.is_some() {
            conditions.push(format!("started_at >= ${}", next_placeholder(&conditions)));
        }
        if filter.end_time.is_some() {
            conditions.push(format!("started_at <= ${}", next_placeholder(&conditions)));
        }
        let limit_idx = next_placeholder(&conditions);
        let offset_idx = limit_idx + 1;

        let query = format!(
            "SELECT {} FROM runs WHERE {} ORDER BY started_at DESC LIMIT ${} OFFSET ${}",
            RunRow::COLUMNS,
            conditions.join(" AND "),
            limit_idx,
            offset_idx
        );

        let mut q = sqlx::query_as::<_, RunRow>(&query);
        if let Some(schedule_id) = filter.schedule_id {
            q = q.bind(schedule_id);
        }
        if let Some(status) = filter.status {
            q = q.bind(run_status_str(status));
        }
        if let Some(start) = filter.start_time {
            q = q.bind(start);
        }
        if let Some(end) = filter.end_time {
            q = q.bind(end);
        }
        q = q.bind(filter.limit).bind(filter.offset);

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to list runs", e))?;
        rows.into_iter().map(Run::try_from).collect()
    }

    async fn finalize_run(
        &self,
        id: Uuid,
        status: RunStatus,
        completed_at: NaiveDateTime,
    ) -> Result<()> {
        sqlx::query("UPDATE runs SET status = $2::run_status, completed_at = $3 WHERE id = $1")
            .bind(id)
            .bind(run_status_str(status))
            .bind(completed_at)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to finalize run", e))?;
        Ok(())
    }

    async fn mark_orphans_on_startup(&self, now: NaiveDateTime) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = 'failed'::run_status, completed_at = $1
            WHERE id IN (
                SELECT id FROM runs WHERE status = 'pending'::run_status FOR UPDATE SKIP LOCKED
            )
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("failed to sweep orphan runs", e))?;

        // Each orphaned run gets a synthetic Attempt recording the interruption,
        // mirroring the "target missing" synthetic Attempt in the Run Executor.
        if result.rows_affected() > 0 {
            sqlx::query(
                r#"
                INSERT INTO attempts (id, run_id, attempt_number, status_code, latency_ms, response_size_bytes, error_type, error_message, started_at, completed_at, created_at)
                SELECT gen_random_uuid(), r.id,
                       COALESCE((SELECT MAX(a.attempt_number) FROM attempts a WHERE a.run_id = r.id), 0) + 1,
                       NULL, 0, 0, 'unknown'::attempt_error_type, 'interrupted', r.started_at, $1, $1
                FROM runs r
                WHERE r.status = 'failed'::run_status AND r.completed_at = $1
                  AND NOT EXISTS (SELECT 1 FROM attempts a WHERE a.run_id = r.id AND a.error_message = 'interrupted' AND a.completed_at = $1)
                "#,
            )
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to record orphan attempts", e))?;
        }

        Ok(result.rows_affected())
    }

    async fn append_attempt(&self, attempt: &Attempt) -> Result<Attempt> {
        let row = AttemptRow::from(attempt);
        let query = format!(
            r#"
            INSERT INTO attempts (id, run_id, attempt_number, status_code, latency_ms, response_size_bytes, error_type, error_message, started_at, completed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::attempt_error_type, $8, $9, $10, $11)
            RETURNING {}
            "#,
            AttemptRow::COLUMNS
        );
        let inserted: AttemptRow = sqlx::query_as(&query)
            .bind(row.id)
            .bind(row.run_id)
            .bind(row.attempt_number)
            .bind(row.status_code)
            .bind(row.latency_ms)
            .bind(row.response_size_bytes)
            .bind(&row.error_type)
            .bind(&row.error_message)
            .bind(row.started_at)
            .bind(row.completed_at)
            .bind(row.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("failed to append attempt", e))?;
        inserted.try_into()
    }

    async fn aggregate_metrics(&self) -> Result<MetricsAggregate> {
        let totals_row: (i64, i64, i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM schedules) AS total_schedules,
                (SELECT COUNT(*) FROM schedules WHERE status = 'active'::schedule_status) AS active_schedules,
                (SELECT COUNT(*) FROM schedules WHERE status = 'paused'::schedule_status) AS paused_schedules,
                (SELECT COUNT(*) FROM runs) AS total_runs,
                (SELECT COUNT(*) FROM runs WHERE status = 'success'::run_status) AS total_success,
                (SELECT COUNT(*) FROM runs WHERE status = 'failed'::run_status) AS total_failures,
                (SELECT AVG(latency_ms) FROM attempts) AS avg_latency_ms
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("failed to aggregate metrics", e))?;

        let totals = MetricsTotals {
            total_schedules: totals_row.0,
            active_schedules: totals_row.1,
            paused_schedules: totals_row.2,
            total_runs: totals_row.3,
            total_success: totals_row.4,
            total_failures: totals_row.5,
            avg_latency_ms: totals_row.6.unwrap_or(0.0),
        };

        let rows: Vec<(Uuid, i64, i64, i64, Option<f64>, Option<NaiveDateTime>)> = sqlx::query_as(
            r#"
            SELECT
                s.id,
                COUNT(DISTINCT r.id) AS total_runs,
                COUNT(DISTINCT r.id) FILTER (WHERE r.status = 'success'::run_status) AS success_count,
                COUNT(DISTINCT r.id) FILTER (WHERE r.status = 'failed'::run_status) AS failure_count,
                AVG(a.latency_ms) AS avg_latency_ms,
                s.last_run_at
            FROM schedules s
            LEFT JOIN runs r ON r.schedule_id = s.id
            LEFT JOIN attempts a ON a.run_id = r.id
            GROUP BY s.id, s.last_run_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::database_with_source("failed to aggregate per-schedule metrics", e))?;

        let per_schedule = rows
            .into_iter()
            .map(
                |(schedule_id, total_runs, success_count, failure_count, avg_latency_ms, last_run_at)| {
                    ScheduleMetrics {
                        schedule_id,
                        total_runs,
                        success_count,
                        failure_count,
                        avg_latency_ms: avg_latency_ms.unwrap_or(0.0),
                        last_run_at,
                    }
                },
            )
            .collect();

        Ok(MetricsAggregate {
            totals,
            per_schedule,
        })
    }
}

fn next_placeholder(conditions: &[String]) -> usize {
    conditions.len()
}
