//! Application state shared across every request handler.
//!
//! Grounded on `rustpress-server/src/state.rs`'s `AppState`, scoped down from
//! the CMS's dozen subsystem handles to the three this control plane needs:
//! configuration, the storage `Repository`, and the running Scheduler Engine
//! (so the REST surface can read its in-flight count and drive its shutdown
//! controller).

use std::sync::Arc;

use httpcron_core::config::AppConfig;
use httpcron_db::Repository;
use httpcron_engine::SchedulerEngine;

/// State injected into every Axum handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn Repository>,
    pub engine: Arc<SchedulerEngine>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        repository: Arc<dyn Repository>,
        engine: Arc<SchedulerEngine>,
    ) -> Self {
        Self {
            config,
            repository,
            engine,
        }
    }
}
