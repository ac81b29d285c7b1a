//! Axum application assembly: router plus middleware, bound to a listener
//! and served with graceful shutdown wired to the Scheduler Engine's own
//! `ShutdownController` (spec.md §4.1, §5).
//!
//! Grounded on `rustpress-server/src/app.rs`'s `App` struct and
//! `run`/`graceful_shutdown` wiring, stripped of every CMS-only middleware
//! layer (bot detection, fingerprinting, content security, tenant
//! identification, rate limiting) since none has a SPEC_FULL.md
//! counterpart; only tracing and CORS survive.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use httpcron_engine::ShutdownController;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes::create_router;
use crate::state::AppState;

/// The assembled control-plane application.
pub struct App {
    state: AppState,
    shutdown: ShutdownController,
}

impl App {
    pub fn new(state: AppState, shutdown: ShutdownController) -> Self {
        Self { state, shutdown }
    }

    /// Builds the router: routes plus the tracing/CORS layer stack.
    pub fn build_router(&self) -> Router {
        create_router(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Binds `addr` and serves until the shared `ShutdownController` fires,
    /// then returns once Axum's graceful-shutdown future resolves. Does NOT
    /// itself wait on the Scheduler Engine's task drain -- the caller
    /// (`main.rs`) awaits the engine's `run()` future separately so both
    /// halves shut down on the same signal.
    pub async fn run(self, addr: SocketAddr) -> std::io::Result<()> {
        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "control plane listening");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await
    }
}

async fn wait_for_shutdown(controller: ShutdownController) {
    let mut receiver = controller.subscribe();
    let _ = receiver.recv().await;
    info!("control plane starting graceful shutdown");
}

/// Spawns the OS signal listener that triggers the shared
/// `ShutdownController` on Ctrl+C or SIGTERM (spec.md §4.1 "Startup &
/// shutdown"). Grounded on
/// `rustpress-server/src/shutdown.rs::listen_for_shutdown_signals`.
pub fn spawn_signal_listener(controller: Arc<ShutdownController>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received Ctrl+C"),
            _ = terminate => info!("received SIGTERM"),
        }

        controller.shutdown();
    });
}
