//! Domain entities: Target, Schedule, Run, Attempt.
//!
//! These are the in-memory, validated representations the engine and the
//! REST layer operate on. `httpcron-db` maps them to/from SQL row types;
//! this module only enforces the invariants that make sense independent of
//! storage.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// HTTP methods a Target may be dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(Error::invalid_input(
                "method",
                format!("unsupported HTTP method '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered external HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Target {
    /// Validate the URL scheme: must start with http:// or https://.
    pub fn validate_url(url: &str) -> Result<()> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(())
        } else {
            Err(Error::invalid_input(
                "url",
                "must start with http:// or https://",
            ))
        }
    }
}

/// A Schedule's recurrence shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Interval,
    Window,
}

/// A Schedule's lifecycle state: active and paused toggle freely, either
/// can move to completed, and completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Paused,
    Completed,
}

/// A recurring dispatch rule against a Target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub target_id: Uuid,
    pub schedule_type: ScheduleType,
    pub interval_seconds: i64,
    pub duration_seconds: Option<i64>,
    pub status: ScheduleStatus,
    pub started_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
    pub last_run_at: Option<NaiveDateTime>,
    pub max_retries: i32,
    pub request_timeout_seconds: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Schedule {
    /// Window schedules carry duration+expiry; interval schedules carry neither.
    pub fn validate_window_fields(
        schedule_type: ScheduleType,
        duration_seconds: Option<i64>,
    ) -> Result<()> {
        match schedule_type {
            ScheduleType::Window => {
                if duration_seconds.map(|d| d >= 1).unwrap_or(false) {
                    Ok(())
                } else {
                    Err(Error::invalid_input(
                        "duration_seconds",
                        "required and must be >= 1 for window schedules",
                    ))
                }
            }
            ScheduleType::Interval => {
                if duration_seconds.is_some() {
                    Err(Error::invalid_input(
                        "duration_seconds",
                        "must be null for interval schedules",
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Only window schedules expire; interval schedules never do.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.schedule_type == ScheduleType::Window
            && self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Whether the schedule is due to fire at `now`.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        if self.is_expired(now) {
            return false;
        }
        match self.last_run_at {
            None => true,
            Some(last) => now >= last + chrono::Duration::seconds(self.interval_seconds),
        }
    }

    /// Only active<->paused and either->completed are legal transitions,
    /// and completed is terminal.
    pub fn can_transition_to(&self, target: ScheduleStatus) -> bool {
        match (self.status, target) {
            (ScheduleStatus::Completed, _) => false,
            (ScheduleStatus::Active, ScheduleStatus::Paused) => true,
            (ScheduleStatus::Paused, ScheduleStatus::Active) => true,
            (_, ScheduleStatus::Completed) => true,
            _ => false,
        }
    }
}

/// A Run's lifecycle state: pending iff `completed_at` is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Success,
    Failed,
}

/// One scheduled trigger, containing 1..N Attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub status: RunStatus,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Error taxonomy for a single outbound HTTP Attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Timeout,
    Dns,
    Connection,
    Http4xx,
    Http5xx,
    Unknown,
}

/// One outbound HTTP request -- initial or retry -- with measured outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub run_id: Uuid,
    pub attempt_number: i32,
    pub status_code: Option<i32>,
    pub latency_ms: f64,
    pub response_size_bytes: i64,
    pub error_type: Option<ErrorType>,
    pub error_message: Option<String>,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Attempt {
    /// `error_type` is null iff `status_code` is in [200, 400).
    pub fn is_success(status_code: Option<i32>) -> bool {
        matches!(status_code, Some(code) if (200..400).contains(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    #[test]
    fn url_validation_rejects_non_http() {
        assert!(Target::validate_url("https://ok.test").is_ok());
        assert!(Target::validate_url("http://ok.test").is_ok());
        assert!(Target::validate_url("ftp://nope").is_err());
    }

    #[test]
    fn window_schedule_requires_duration() {
        assert!(Schedule::validate_window_fields(ScheduleType::Window, Some(30)).is_ok());
        assert!(Schedule::validate_window_fields(ScheduleType::Window, None).is_err());
        assert!(Schedule::validate_window_fields(ScheduleType::Window, Some(0)).is_err());
    }

    #[test]
    fn interval_schedule_rejects_duration() {
        assert!(Schedule::validate_window_fields(ScheduleType::Interval, None).is_ok());
        assert!(Schedule::validate_window_fields(ScheduleType::Interval, Some(30)).is_err());
    }

    fn interval_schedule(last_run_at: Option<NaiveDateTime>) -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            schedule_type: ScheduleType::Interval,
            interval_seconds: 2,
            duration_seconds: None,
            status: ScheduleStatus::Active,
            started_at: ts(0),
            expires_at: None,
            last_run_at,
            max_retries: 0,
            request_timeout_seconds: 5,
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    #[test]
    fn interval_is_due_on_first_run() {
        let schedule = interval_schedule(None);
        assert!(schedule.is_due(ts(0)));
    }

    #[test]
    fn interval_due_detection_respects_period() {
        let schedule = interval_schedule(Some(ts(0)));
        assert!(!schedule.is_due(ts(1)));
        assert!(schedule.is_due(ts(2)));
        assert!(schedule.is_due(ts(3)));
    }

    #[test]
    fn window_schedule_expires_at_deadline() {
        let mut schedule = interval_schedule(None);
        schedule.schedule_type = ScheduleType::Window;
        schedule.duration_seconds = Some(3);
        schedule.expires_at = Some(ts(3));

        assert!(!schedule.is_expired(ts(2)));
        assert!(schedule.is_expired(ts(3)));
        assert!(!schedule.is_due(ts(3)));
    }

    #[test]
    fn schedule_status_transitions() {
        let mut schedule = interval_schedule(None);
        assert!(schedule.can_transition_to(ScheduleStatus::Paused));
        schedule.status = ScheduleStatus::Paused;
        assert!(schedule.can_transition_to(ScheduleStatus::Active));
        assert!(schedule.can_transition_to(ScheduleStatus::Completed));
        schedule.status = ScheduleStatus::Completed;
        assert!(!schedule.can_transition_to(ScheduleStatus::Active));
        assert!(!schedule.can_transition_to(ScheduleStatus::Paused));
    }

    #[test]
    fn attempt_success_classification() {
        assert!(Attempt::is_success(Some(200)));
        assert!(Attempt::is_success(Some(399)));
        assert!(!Attempt::is_success(Some(400)));
        assert!(!Attempt::is_success(Some(500)));
        assert!(!Attempt::is_success(None));
    }
}
