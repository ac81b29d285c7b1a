//! REST route aggregation. Flat paths (no `/api/v1` prefix), mirroring
//! spec.md §6's surface directly rather than the teacher's versioned,
//! auth-gated `/api/v1` tree in `rustpress-server/src/app.rs`.

pub mod health;
pub mod metrics;
pub mod runs;
pub mod schedules;
pub mod targets;

use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(targets::router())
        .merge(schedules::router())
        .merge(runs::router())
        .merge(metrics::router())
        .with_state(state)
}
