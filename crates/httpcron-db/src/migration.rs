//! Hand-rolled migration runner: an ordered list of versioned SQL blobs
//! applied once, tracked in a `_migrations` table.

use httpcron_core::error::{Error, Result};
use sqlx::PgPool;

/// A single versioned migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// The embedded migration set for httpcron's four tables.
pub fn embedded_migrations() -> Vec<Migration> {
    vec![Migration::new(
        1,
        "init",
        include_str!("../migrations/001_init.sql"),
    )]
}

/// Applies pending migrations in version order.
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    pub fn add(&mut self, migration: Migration) -> &mut Self {
        self.migrations.push(migration);
        self.migrations.sort_by_key(|m| m.version);
        self
    }

    pub fn with_migrations(mut self, migrations: Vec<Migration>) -> Self {
        for m in migrations {
            self.add(m);
        }
        self
    }

    async fn ensure_migrations_table(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::database_with_source("failed to create migrations table", e))?;
        Ok(())
    }

    async fn get_applied_migrations(&self, pool: &PgPool) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT version FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await
            .map_err(|e| Error::database_with_source("failed to read applied migrations", e))?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Runs every migration not yet recorded in `_migrations`. Running this
    /// twice in a row is a no-op the second time.
    pub async fn run(&self, pool: &PgPool) -> Result<Vec<i64>> {
        self.ensure_migrations_table(pool).await?;
        let applied = self.get_applied_migrations(pool).await?;

        let mut newly_applied = Vec::new();
        for migration in &self.migrations {
            if applied.contains(&migration.version) {
                continue;
            }

            let mut tx = pool
                .begin()
                .await
                .map_err(|e| Error::database_with_source("failed to open migration tx", e))?;

            sqlx::raw_sql(&migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    Error::database_with_source(
                        format!("migration {} ('{}') failed", migration.version, migration.name),
                        e,
                    )
                })?;

            sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(&migration.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::database_with_source("failed to record migration", e))?;

            tx.commit()
                .await
                .map_err(|e| Error::database_with_source("failed to commit migration", e))?;

            newly_applied.push(migration.version);
        }

        if newly_applied.is_empty() {
            tracing::info!("no pending migrations");
        } else {
            tracing::info!(count = newly_applied.len(), "applied migrations");
        }

        Ok(newly_applied)
    }
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}
