//! httpcron server entry point: loads configuration, connects the database,
//! runs migrations, starts the Scheduler Engine and the REST control plane
//! side by side, and shuts both down on the same signal.
//!
//! Grounded on `rustpress-server/src/main.rs`'s `load_config`/`init_tracing`/
//! `init_database`/`run_app` shape, trimmed of the CMS's setup wizard, theme
//! scanning and subsystem initializers this system has no counterpart for.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use httpcron_core::config::AppConfig;
use httpcron_core::clock::SystemClock;
use httpcron_db::{embedded_migrations, DatabasePool, Migrator, PgRepository, PoolConfig};
use httpcron_engine::{dispatcher_from_config, SchedulerEngine};
use httpcron_server::app::{spawn_signal_listener, App};
use httpcron_server::state::AppState;

/// httpcron -- a persistent HTTP request scheduler.
#[derive(Parser, Debug)]
#[command(name = "httpcron")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to bind the control plane to (overrides config and environment).
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind the control plane to.
    #[arg(long)]
    host: Option<String>,
}

mod env_vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const SERVER_HOST: &str = "HTTPCRON_HOST";
    pub const SERVER_PORT: &str = "HTTPCRON_PORT";
    pub const CONFIG_PATH: &str = "HTTPCRON_CONFIG";
    pub const LOG_LEVEL: &str = "RUST_LOG";
}

fn init_tracing(config: &httpcron_core::config::LoggingConfig) {
    let filter = env::var(env_vars::LOG_LEVEL)
        .ok()
        .unwrap_or_else(|| format!("httpcron={0},tower_http={0},sqlx=warn", config.level));

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter));

    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn config_path() -> std::path::PathBuf {
    env::var(env_vars::CONFIG_PATH)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("./config/httpcron.toml"))
}

/// Loads configuration: defaults, then an optional TOML file, then
/// environment variable overrides (spec.md §6 "Configuration").
fn load_config() -> AppConfig {
    let mut config = AppConfig::default();

    let path = config_path();
    if let Ok(content) = std::fs::read_to_string(&path) {
        if let Ok(file) = toml::from_str::<toml::Value>(&content) {
            if let Some(database) = file.get("database") {
                if let Some(url) = database.get("database_url").and_then(|v| v.as_str()) {
                    config.database.url = url.to_string();
                }
            }
            if let Some(server) = file.get("server") {
                if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                    config.server.host = host.to_string();
                }
                if let Some(port) = server.get("port").and_then(|v| v.as_integer()) {
                    config.server.port = port as u16;
                }
            }
            if let Some(engine) = file.get("engine") {
                if let Some(v) = engine.get("poll_interval_seconds").and_then(|v| v.as_integer()) {
                    config.engine.poll_interval_seconds = v as u64;
                }
                if let Some(v) = engine.get("shutdown_grace_seconds").and_then(|v| v.as_integer()) {
                    config.engine.shutdown_grace_seconds = v as u64;
                }
                if let Some(v) = engine.get("max_response_bytes").and_then(|v| v.as_integer()) {
                    config.engine.max_response_bytes = v as usize;
                }
            }
        }
    }

    if let Ok(url) = env::var(env_vars::DATABASE_URL) {
        config.database.url = url;
    }
    if let Ok(host) = env::var(env_vars::SERVER_HOST) {
        config.server.host = host;
    }
    if let Ok(port) = env::var(env_vars::SERVER_PORT) {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }

    config
}

async fn init_database(config: &AppConfig) -> Result<DatabasePool, Box<dyn std::error::Error>> {
    info!("connecting to database");
    let pool = DatabasePool::new(PoolConfig::from(config.database.clone())).await?;
    pool.health_check().await?;
    info!("database connection established");

    if config.database.run_migrations {
        let migrator = Migrator::new().with_migrations(embedded_migrations());
        let applied = migrator.run(pool.inner()).await?;
        if applied.is_empty() {
            info!("no pending migrations");
        } else {
            info!(?applied, "applied migrations");
        }
    }

    Ok(pool)
}

async fn run_app(cli: Cli, mut config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    let config = Arc::new(config);

    info!(host = %config.server.host, port = config.server.port, "configuration loaded");

    let database = init_database(&config).await?;
    let repository: Arc<dyn httpcron_db::Repository> =
        Arc::new(PgRepository::new(database.inner().clone()));

    let dispatcher = Arc::new(dispatcher_from_config(&config.engine));
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(SchedulerEngine::new(
        repository.clone(),
        dispatcher,
        clock,
        config.engine.clone(),
    ));

    let shutdown = Arc::new(engine.shutdown_controller());
    spawn_signal_listener(shutdown.clone());

    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let state = AppState::new(config.clone(), repository, engine.clone());
    let addr: SocketAddr = config.server.address().parse()?;
    let app = App::new(state, (*shutdown).clone());

    info!("httpcron control plane starting on http://{}", addr);
    if let Err(err) = app.run(addr).await {
        error!(error = %err, "control plane server error");
    }

    shutdown.shutdown();
    if let Err(err) = engine_task.await {
        error!(error = %err, "scheduler engine task panicked");
    }

    info!("httpcron shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config();
    init_tracing(&config.logging);
    run_app(cli, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_are_sane() {
        let config = load_config();
        assert!(!config.server.host.is_empty());
        assert!(config.server.port > 0);
        assert!(config.engine.poll_interval_seconds >= 1);
    }
}
