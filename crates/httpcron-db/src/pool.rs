//! Connection pool wrapper around `sqlx::PgPool`, configured from
//! `pool_min`/`pool_max`/connect-timeout settings.

use httpcron_core::config::DatabaseConfig;
use httpcron_core::error::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Pool construction parameters, derived from `DatabaseConfig`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout: std::time::Duration,
    pub idle_timeout: std::time::Duration,
}

impl From<DatabaseConfig> for PoolConfig {
    fn from(config: DatabaseConfig) -> Self {
        Self {
            url: config.url,
            min_connections: config.pool_min,
            max_connections: config.pool_max,
            connect_timeout: config.connect_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// A connected Postgres pool plus the settings used to build it.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn new(config: PoolConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| Error::database_with_source("failed to connect to database", e))?;

        Ok(Self { pool })
    }

    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::database_with_source("database health check failed", e))?;
        Ok(())
    }
}
