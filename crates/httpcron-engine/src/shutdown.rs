//! Graceful shutdown primitives for the Scheduler Engine: a
//! broadcast-channel cancellation signal plus an active-task counter so
//! shutdown can wait, bounded by a grace period, for in-flight tick
//! iterations and Run Executors to finish. The engine has exactly one phase
//! (drain in-flight Run Executors); OS signal handling belongs to the
//! `httpcron-server` binary that owns the process.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub type ShutdownReceiver = broadcast::Receiver<()>;
pub type ShutdownSender = broadcast::Sender<()>;

/// Cancellation coordinator: one broadcast signal, observed via `subscribe`.
#[derive(Clone)]
pub struct ShutdownController {
    sender: ShutdownSender,
    is_shutting_down: Arc<AtomicBool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            is_shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> ShutdownReceiver {
        self.sender.subscribe()
    }

    /// Initiates shutdown; idempotent -- a second call is a no-op.
    pub fn shutdown(&self) {
        if self
            .is_shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("scheduler engine shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks in-flight tick iterations and Run Executors so shutdown can wait
/// for them, bounded by a grace period.
#[derive(Clone)]
pub struct ShutdownHandle {
    controller: ShutdownController,
    active_tasks: Arc<AtomicUsize>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ShutdownHandle {
    pub fn new(controller: ShutdownController) -> Self {
        Self {
            controller,
            active_tasks: Arc::new(AtomicUsize::new(0)),
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Hands the handle of a spawned Run Executor task to the shutdown
    /// machinery so it can be force-aborted if it outlives the grace period.
    pub fn track(&self, handle: JoinHandle<()>) {
        self.handles.lock().push(handle);
    }

    /// Registers one in-flight task; the returned guard decrements the
    /// count on drop, covering every exit path including panics.
    pub fn register_task(&self) -> TaskGuard {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            active_tasks: Arc::clone(&self.active_tasks),
        }
    }

    pub fn active_task_count(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> ShutdownReceiver {
        self.controller.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.controller.is_shutting_down()
    }

    /// Blocks until every registered task finishes or `grace` elapses,
    /// whichever comes first. Tasks still active once the grace period
    /// elapses are force-aborted, which cuts off their outbound request
    /// mid-flight; the Run they were driving is left in whatever state its
    /// last successfully committed write left it (`Pending` if no Attempt
    /// had closed yet), to be swept up as an orphan on the next startup.
    pub async fn wait_for_tasks(&self, grace: Duration) {
        let start = std::time::Instant::now();
        loop {
            self.prune_finished_handles();
            let count = self.active_task_count();
            if count == 0 {
                info!("all in-flight run executors finished");
                return;
            }
            if start.elapsed() >= grace {
                warn!(remaining = count, "shutdown grace period elapsed, aborting remaining run executors");
                self.abort_remaining();
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn prune_finished_handles(&self) {
        self.handles.lock().retain(|handle| !handle.is_finished());
    }

    fn abort_remaining(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

/// Decrements a `ShutdownHandle`'s active-task count when dropped.
pub struct TaskGuard {
    active_tasks: Arc<AtomicUsize>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sleeps for `duration`, returning early (with `true`) if shutdown fires
/// first. Used by the tick loop to sleep to the next tick boundary without
/// blocking shutdown.
pub async fn shutdown_aware_sleep(duration: Duration, controller: &ShutdownController) -> bool {
    let mut receiver = controller.subscribe();
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = receiver.recv() => {
            info!("tick sleep interrupted by shutdown signal");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutting_down());
        controller.shutdown();
        controller.shutdown();
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn task_guard_decrements_on_drop() {
        let handle = ShutdownHandle::new(ShutdownController::new());
        assert_eq!(handle.active_task_count(), 0);
        {
            let _guard = handle.register_task();
            assert_eq!(handle.active_task_count(), 1);
        }
        assert_eq!(handle.active_task_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_tasks_returns_once_drained() {
        let handle = ShutdownHandle::new(ShutdownController::new());
        let guard = handle.register_task();
        let handle_clone = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(guard);
        });
        handle.wait_for_tasks(Duration::from_secs(1)).await;
        assert_eq!(handle_clone.active_task_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_tasks_aborts_tracked_handle_past_grace() {
        let handle = ShutdownHandle::new(ShutdownController::new());
        let _guard = handle.register_task();
        let ran_to_completion = Arc::new(AtomicBool::new(false));
        let flag = ran_to_completion.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });
        handle.track(task);

        handle.wait_for_tasks(Duration::from_millis(30)).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!ran_to_completion.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_aware_sleep_returns_early_on_shutdown() {
        let controller = ShutdownController::new();
        let controller_clone = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            controller_clone.shutdown();
        });
        let interrupted = shutdown_aware_sleep(Duration::from_secs(5), &controller).await;
        assert!(interrupted);
    }
}
