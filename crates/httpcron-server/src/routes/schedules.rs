//! Schedule CRUD plus pause/resume (spec.md §6), mirroring the Target route
//! shapes but layering the window/interval validation and
//! `can_transition_to` state-machine checks from `httpcron_core::model`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use httpcron_core::error::Error as CoreError;
use httpcron_core::model::{Schedule, ScheduleStatus, ScheduleType};
use serde::Deserialize;
use uuid::Uuid;

use crate::extract::{AppJson, PathId};
use crate::http_error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route("/schedules/:id", get(get_schedule).delete(delete_schedule))
        .route("/schedules/:id/pause", axum::routing::post(pause_schedule))
        .route("/schedules/:id/resume", axum::routing::post(resume_schedule))
}

fn default_max_retries() -> i32 {
    0
}

fn default_request_timeout_seconds() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct ScheduleCreateRequest {
    pub target_id: Uuid,
    pub schedule_type: ScheduleType,
    pub interval_seconds: i64,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub started_at: Option<chrono::NaiveDateTime>,
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: i64,
}

async fn list_schedules(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let schedules = state.repository.list_schedules().await?;
    Ok(Json(schedules))
}

async fn create_schedule(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ScheduleCreateRequest>,
) -> ApiResult<impl IntoResponse> {
    if state.repository.get_target(payload.target_id).await?.is_none() {
        return Err(CoreError::not_found("Target", payload.target_id.to_string()).into());
    }

    if payload.interval_seconds < 1 {
        return Err(CoreError::invalid_input("interval_seconds", "must be >= 1").into());
    }
    if payload.request_timeout_seconds < 1 {
        return Err(CoreError::invalid_input("request_timeout_seconds", "must be >= 1").into());
    }
    Schedule::validate_window_fields(payload.schedule_type, payload.duration_seconds)?;

    let now = chrono::Utc::now().naive_utc();
    let started_at = payload.started_at.unwrap_or(now);
    let expires_at = match payload.schedule_type {
        ScheduleType::Window => {
            payload
                .duration_seconds
                .map(|d| started_at + chrono::Duration::seconds(d))
        }
        ScheduleType::Interval => None,
    };

    let schedule = Schedule {
        id: Uuid::new_v4(),
        target_id: payload.target_id,
        schedule_type: payload.schedule_type,
        interval_seconds: payload.interval_seconds,
        duration_seconds: payload.duration_seconds,
        status: ScheduleStatus::Active,
        started_at,
        expires_at,
        last_run_at: None,
        max_retries: payload.max_retries,
        request_timeout_seconds: payload.request_timeout_seconds,
        created_at: now,
        updated_at: now,
    };

    let created = state.repository.create_schedule(&schedule).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_schedule(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    let schedule = state
        .repository
        .get_schedule(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Schedule", id.to_string()))?;
    Ok(Json(schedule))
}

async fn delete_schedule(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    let deleted = state.repository.delete_schedule(id).await?;
    if !deleted {
        return Err(CoreError::not_found("Schedule", id.to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn transition(
    state: &AppState,
    id: Uuid,
    target: ScheduleStatus,
    action: &str,
) -> ApiResult<impl IntoResponse> {
    let schedule = state
        .repository
        .get_schedule(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Schedule", id.to_string()))?;

    if !schedule.can_transition_to(target) {
        return Err(CoreError::invalid_transition(
            "Schedule",
            id.to_string(),
            format!("{:?}", schedule.status).to_lowercase(),
            action.to_string(),
        )
        .into());
    }

    let now = chrono::Utc::now().naive_utc();
    let updated = state
        .repository
        .update_schedule_status(id, target, now)
        .await?
        .ok_or_else(|| CoreError::not_found("Schedule", id.to_string()))?;
    Ok(Json(updated))
}

async fn pause_schedule(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    transition(&state, id, ScheduleStatus::Paused, "pause").await
}

async fn resume_schedule(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    transition(&state, id, ScheduleStatus::Active, "resume").await
}
