//! The Scheduler Engine: tick loop, Active-Execution Registry, Run
//! Executor, HTTP Dispatcher and graceful-shutdown coordination.

pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod registry;
pub mod shutdown;

pub use dispatcher::{HttpDispatcher, Outcome};
pub use engine::SchedulerEngine;
pub use executor::{try_spawn, RunExecutor};
pub use registry::{ActiveExecutionRegistry, AdmissionGuard, OwnedAdmissionGuard};
pub use shutdown::{
    shutdown_aware_sleep, ShutdownController, ShutdownHandle, ShutdownReceiver, ShutdownSender,
    TaskGuard,
};
