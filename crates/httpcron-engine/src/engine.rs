//! The Scheduler Engine tick loop: selects due active schedules, completes
//! expired windows, admits and spawns Run Executors, and sleeps to the next
//! tick boundary. Cancellation and the shutdown grace period are built on
//! this crate's `shutdown` module.

use std::sync::Arc;
use std::time::Duration;

use httpcron_core::config::EngineConfig;
use httpcron_core::model::ScheduleStatus;
use httpcron_core::Clock;
use httpcron_db::Repository;

use crate::dispatcher::HttpDispatcher;
use crate::executor::try_spawn;
use crate::registry::ActiveExecutionRegistry;
use crate::shutdown::{shutdown_aware_sleep, ShutdownController, ShutdownHandle};

/// The long-lived tick loop plus the state it needs each iteration.
pub struct SchedulerEngine {
    repository: Arc<dyn Repository>,
    dispatcher: Arc<HttpDispatcher>,
    clock: Arc<dyn Clock>,
    registry: Arc<ActiveExecutionRegistry>,
    config: EngineConfig,
    shutdown: ShutdownController,
    tasks: ShutdownHandle,
}

impl SchedulerEngine {
    pub fn new(
        repository: Arc<dyn Repository>,
        dispatcher: Arc<HttpDispatcher>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let shutdown = ShutdownController::new();
        let tasks = ShutdownHandle::new(shutdown.clone());
        Self {
            repository,
            dispatcher,
            clock,
            registry: Arc::new(ActiveExecutionRegistry::new()),
            config,
            shutdown,
            tasks,
        }
    }

    /// A handle callers (e.g. the REST process's signal handler) can use to
    /// request shutdown without owning the engine itself.
    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// Current admitted-schedule count, for the `/metrics` or health
    /// surface to report engine liveness.
    pub fn inflight_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs the orphan-recovery sweep, then the tick loop, until shutdown is
    /// signalled; blocks (bounded by `shutdown_grace_seconds`) for in-flight
    /// Run Executors to drain before returning.
    pub async fn run(&self) {
        self.recover_orphans().await;

        loop {
            if self.shutdown.is_shutting_down() {
                break;
            }

            let tick_guard = self.tasks.register_task();
            if let Err(err) = self.tick().await {
                tracing::error!(error = %err, "tick failed, continuing");
            }
            drop(tick_guard);

            if shutdown_aware_sleep(self.config.poll_interval(), &self.shutdown).await {
                break;
            }
        }

        tracing::info!("tick loop exited, draining in-flight run executors");
        self.tasks.wait_for_tasks(self.config.shutdown_grace()).await;
    }

    /// Startup sweep: any Run left `pending` by an unclean shutdown is
    /// rewritten as `failed`/`unknown`/"interrupted" before the tick loop
    /// begins. Idempotent: a second call matches no rows.
    async fn recover_orphans(&self) {
        let now = self.clock.now();
        match self.repository.mark_orphans_on_startup(now).await {
            Ok(0) => {}
            Ok(count) => tracing::warn!(count, "recovered orphaned runs from unclean shutdown"),
            Err(err) => tracing::error!(error = %err, "orphan recovery sweep failed"),
        }
    }

    /// One tick: query due active schedules, complete expired windows, admit
    /// and spawn the rest. Infallible by construction -- a database error
    /// here is logged by the caller and the loop continues.
    async fn tick(&self) -> httpcron_core::error::Result<()> {
        let now = self.clock.now();
        let schedules = self.repository.list_active_schedules().await?;

        for schedule in schedules {
            if schedule.is_expired(now) {
                match self
                    .repository
                    .update_schedule_status(schedule.id, ScheduleStatus::Completed, now)
                    .await
                {
                    Ok(_) => {
                        tracing::info!(schedule_id = %schedule.id, "window schedule completed");
                    }
                    Err(err) => {
                        tracing::error!(schedule_id = %schedule.id, error = %err, "failed to complete expired schedule");
                    }
                }
                continue;
            }

            if schedule.is_due(now) {
                let spawned = try_spawn(
                    self.registry.clone(),
                    self.repository.clone(),
                    self.dispatcher.clone(),
                    self.clock.clone(),
                    schedule.clone(),
                    &self.tasks,
                );
                if !spawned {
                    tracing::debug!(schedule_id = %schedule.id, "schedule already in flight, skipping this tick");
                }
            }
        }

        Ok(())
    }
}

/// Convenience constructor mirroring the other crates' `with_*` builders:
/// builds the shared `reqwest`-backed dispatcher from `EngineConfig`.
pub fn dispatcher_from_config(config: &EngineConfig) -> HttpDispatcher {
    HttpDispatcher::new(config.max_response_bytes)
}
