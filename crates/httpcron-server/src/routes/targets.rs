//! Target CRUD (spec.md §6): `POST/GET/PUT/DELETE /targets[/:id]`. Grounded
//! on the `list_tags_handler`/`create_tag_handler`/`get_tag_handler`/
//! `update_tag_handler`/`delete_tag_handler` group in
//! `rustpress-server/src/routes.rs`, replacing ad hoc `sqlx::query` calls
//! with the `Repository` trait.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use httpcron_core::error::Error as CoreError;
use httpcron_core::model::{HttpMethod, Target};
use serde::Deserialize;
use uuid::Uuid;

use crate::extract::{AppJson, PathId};
use crate::http_error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/targets", get(list_targets).post(create_target))
        .route(
            "/targets/:id",
            get(get_target).put(update_target).delete(delete_target),
        )
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

async fn list_targets(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let targets = state.repository.list_targets().await?;
    Ok(Json(targets))
}

async fn create_target(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TargetRequest>,
) -> ApiResult<impl IntoResponse> {
    Target::validate_url(&payload.url)?;

    let now = chrono::Utc::now().naive_utc();
    let target = Target {
        id: Uuid::new_v4(),
        name: payload.name,
        url: payload.url,
        method: payload.method,
        headers: payload.headers,
        body: payload.body,
        created_at: now,
        updated_at: now,
    };

    let created = state.repository.create_target(&target).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_target(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    let target = state
        .repository
        .get_target(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Target", id.to_string()))?;
    Ok(Json(target))
}

async fn update_target(
    State(state): State<AppState>,
    PathId(id): PathId,
    AppJson(payload): AppJson<TargetRequest>,
) -> ApiResult<impl IntoResponse> {
    Target::validate_url(&payload.url)?;

    let existing = state
        .repository
        .get_target(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Target", id.to_string()))?;

    let target = Target {
        id,
        name: payload.name,
        url: payload.url,
        method: payload.method,
        headers: payload.headers,
        body: payload.body,
        created_at: existing.created_at,
        updated_at: chrono::Utc::now().naive_utc(),
    };

    let updated = state.repository.update_target(&target).await?;
    Ok(Json(updated))
}

async fn delete_target(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<impl IntoResponse> {
    let deleted = state.repository.delete_target(id).await?;
    if !deleted {
        return Err(CoreError::not_found("Target", id.to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
