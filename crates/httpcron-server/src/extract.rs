//! Small Axum extractors shared by the route handlers. Grounded on
//! `rustpress-server/src/extract.rs`'s `PathId`/`ValidatedJson` idiom,
//! trimmed to what this control plane needs (no auth, no `validator` crate:
//! field-level validation is done by hand against spec.md's exact rules).

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::http_error::ApiError;

/// A path-parameter UUID, rejecting malformed IDs as 400s rather than the
/// raw Axum path-extraction error.
pub struct PathId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("invalid id format"))?;
        Ok(PathId(id))
    }
}

/// JSON body extraction whose rejection is our `ApiError` (422 on malformed
/// or schema-mismatched bodies, per spec.md §6) instead of Axum's default.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

/// Query-string extraction whose rejection is our `ApiError` (400 on
/// malformed query parameters, per spec.md §6) instead of Axum's default.
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(AppQuery(value))
    }
}
