//! `GET /metrics` (spec.md §6): aggregate and per-schedule counters.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::http_error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let aggregate = state.repository.aggregate_metrics().await?;
    Ok(Json(aggregate))
}
