//! Row types mapping the four tables to/from the domain entities in
//! `httpcron_core::model`, plus a `COLUMNS` constant per row type for
//! explicit SELECT lists that cast enum columns back to text.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use httpcron_core::error::{Error, Result};
use httpcron_core::model::{
    Attempt, ErrorType, HttpMethod, Run, RunStatus, Schedule, ScheduleStatus, ScheduleType, Target,
};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TargetRow {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: Option<serde_json::Value>,
    pub body: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TargetRow {
    pub const COLUMNS: &'static str =
        "id, name, url, method, headers, body, created_at, updated_at";
}

impl TryFrom<TargetRow> for Target {
    type Error = Error;

    fn try_from(row: TargetRow) -> Result<Self> {
        let headers = match row.headers {
            Some(value) => Some(
                serde_json::from_value::<HashMap<String, String>>(value)
                    .map_err(|e| Error::database(format!("corrupt target headers: {}", e)))?,
            ),
            None => None,
        };
        Ok(Target {
            id: row.id,
            name: row.name,
            url: row.url,
            method: HttpMethod::parse(&row.method)?,
            headers,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Target> for TargetRow {
    fn from(target: &Target) -> Self {
        Self {
            id: target.id,
            name: target.name.clone(),
            url: target.url.clone(),
            method: target.method.as_str().to_string(),
            headers: target
                .headers
                .as_ref()
                .map(|h| serde_json::to_value(h).expect("header map serializes")),
            body: target.body.clone(),
            created_at: target.created_at,
            updated_at: target.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub target_id: Uuid,
    pub schedule_type: String,
    pub interval_seconds: i64,
    pub duration_seconds: Option<i64>,
    pub status: String,
    pub started_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
    pub last_run_at: Option<NaiveDateTime>,
    pub max_retries: i32,
    pub request_timeout_seconds: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ScheduleRow {
    pub const COLUMNS: &'static str = "id, target_id, schedule_type::text as schedule_type, interval_seconds, duration_seconds, status::text as status, started_at, expires_at, last_run_at, max_retries, request_timeout_seconds, created_at, updated_at";
}

fn parse_schedule_type(raw: &str) -> Result<ScheduleType> {
    match raw {
        "interval" => Ok(ScheduleType::Interval),
        "window" => Ok(ScheduleType::Window),
        other => Err(Error::database(format!(
            "unknown schedule_type '{}' in storage",
            other
        ))),
    }
}

fn parse_schedule_status(raw: &str) -> Result<ScheduleStatus> {
    match raw {
        "active" => Ok(ScheduleStatus::Active),
        "paused" => Ok(ScheduleStatus::Paused),
        "completed" => Ok(ScheduleStatus::Completed),
        other => Err(Error::database(format!(
            "unknown schedule status '{}' in storage",
            other
        ))),
    }
}

pub fn schedule_type_str(t: ScheduleType) -> &'static str {
    match t {
        ScheduleType::Interval => "interval",
        ScheduleType::Window => "window",
    }
}

pub fn schedule_status_str(s: ScheduleStatus) -> &'static str {
    match s {
        ScheduleStatus::Active => "active",
        ScheduleStatus::Paused => "paused",
        ScheduleStatus::Completed => "completed",
    }
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = Error;

    fn try_from(row: ScheduleRow) -> Result<Self> {
        Ok(Schedule {
            id: row.id,
            target_id: row.target_id,
            schedule_type: parse_schedule_type(&row.schedule_type)?,
            interval_seconds: row.interval_seconds,
            duration_seconds: row.duration_seconds,
            status: parse_schedule_status(&row.status)?,
            started_at: row.started_at,
            expires_at: row.expires_at,
            last_run_at: row.last_run_at,
            max_retries: row.max_retries,
            request_timeout_seconds: row.request_timeout_seconds,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Schedule> for ScheduleRow {
    fn from(schedule: &Schedule) -> Self {
        Self {
            id: schedule.id,
            target_id: schedule.target_id,
            schedule_type: schedule_type_str(schedule.schedule_type).to_string(),
            interval_seconds: schedule.interval_seconds,
            duration_seconds: schedule.duration_seconds,
            status: schedule_status_str(schedule.status).to_string(),
            started_at: schedule.started_at,
            expires_at: schedule.expires_at,
            last_run_at: schedule.last_run_at,
            max_retries: schedule.max_retries,
            request_timeout_seconds: schedule.request_timeout_seconds,
            created_at: schedule.created_at,
            updated_at: schedule.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub status: String,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl RunRow {
    pub const COLUMNS: &'static str =
        "id, schedule_id, status::text as status, started_at, completed_at, created_at";
}

fn parse_run_status(raw: &str) -> Result<RunStatus> {
    match raw {
        "pending" => Ok(RunStatus::Pending),
        "success" => Ok(RunStatus::Success),
        "failed" => Ok(RunStatus::Failed),
        other => Err(Error::database(format!(
            "unknown run status '{}' in storage",
            other
        ))),
    }
}

pub fn run_status_str(s: RunStatus) -> &'static str {
    match s {
        RunStatus::Pending => "pending",
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
    }
}

impl TryFrom<RunRow> for Run {
    type Error = Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(Run {
            id: row.id,
            schedule_id: row.schedule_id,
            status: parse_run_status(&row.status)?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttemptRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub attempt_number: i32,
    pub status_code: Option<i32>,
    pub latency_ms: f64,
    pub response_size_bytes: i64,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl AttemptRow {
    pub const COLUMNS: &'static str = "id, run_id, attempt_number, status_code, latency_ms, response_size_bytes, error_type::text as error_type, error_message, started_at, completed_at, created_at";
}

fn parse_error_type(raw: &str) -> Result<ErrorType> {
    match raw {
        "timeout" => Ok(ErrorType::Timeout),
        "dns" => Ok(ErrorType::Dns),
        "connection" => Ok(ErrorType::Connection),
        "http_4xx" => Ok(ErrorType::Http4xx),
        "http_5xx" => Ok(ErrorType::Http5xx),
        "unknown" => Ok(ErrorType::Unknown),
        other => Err(Error::database(format!(
            "unknown error_type '{}' in storage",
            other
        ))),
    }
}

pub fn error_type_str(e: ErrorType) -> &'static str {
    match e {
        ErrorType::Timeout => "timeout",
        ErrorType::Dns => "dns",
        ErrorType::Connection => "connection",
        ErrorType::Http4xx => "http_4xx",
        ErrorType::Http5xx => "http_5xx",
        ErrorType::Unknown => "unknown",
    }
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        let error_type = match row.error_type {
            Some(ref raw) => Some(parse_error_type(raw)?),
            None => None,
        };
        Ok(Attempt {
            id: row.id,
            run_id: row.run_id,
            attempt_number: row.attempt_number,
            status_code: row.status_code,
            latency_ms: row.latency_ms,
            response_size_bytes: row.response_size_bytes,
            error_type,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

impl From<&Attempt> for AttemptRow {
    fn from(attempt: &Attempt) -> Self {
        Self {
            id: attempt.id,
            run_id: attempt.run_id,
            attempt_number: attempt.attempt_number,
            status_code: attempt.status_code,
            latency_ms: attempt.latency_ms,
            response_size_bytes: attempt.response_size_bytes,
            error_type: attempt.error_type.map(error_type_str).map(String::from),
            error_message: attempt.error_message.clone(),
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            created_at: attempt.created_at,
        }
    }
}
