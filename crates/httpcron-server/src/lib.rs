//! The Axum REST control plane: application state, error mapping, route
//! handlers and the `App` server wrapper (spec.md §6).

pub mod app;
pub mod extract;
pub mod http_error;
pub mod routes;
pub mod state;

pub use app::App;
pub use state::AppState;
