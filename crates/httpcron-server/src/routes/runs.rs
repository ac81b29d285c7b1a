//! Run listing and detail (spec.md §6): `GET /runs`, `GET /runs/{id}`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDateTime;
use httpcron_core::error::Error as CoreError;
use httpcron_core::model::RunStatus;
use httpcron_db::RunListFilter;
use serde::Deserialize;
use uuid::Uuid;

use crate::extract::{AppQuery, PathId};
use crate::http_error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/runs", get(list_runs))
        .route("/runs/:id", get(get_run))
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub schedule_id: Option<Uuid>,
    pub status: Option<RunStatus>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<RunQuery> for RunListFilter {
    fn from(query: RunQuery) -> Self {
        let mut filter = RunListFilter::new();
        filter.schedule_id = query.schedule_id;
        filter.status = query.status;
        filter.start_time = query.start_time;
        filter.end_time = query.end_time;
        filter.limit = query.limit.unwrap_or(100).clamp(1, 1000);
        filter.offset = query.offset.unwrap_or(0).max(0);
        filter
    }
}

async fn list_runs(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<RunQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter: RunListFilter = query.into();
    let runs = state.repository.list_runs(&filter).await?;
    Ok(Json(runs))
}

async fn get_run(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    let run = state
        .repository
        .get_run_with_attempts(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Run", id.to_string()))?;
    Ok(Json(run))
}
