//! Repository trait, SQL migrations and the Postgres repository
//! implementation for httpcron.

pub mod migration;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod repository;

pub use migration::{embedded_migrations, Migration, Migrator};
pub use pool::{DatabasePool, PoolConfig};
pub use postgres::PgRepository;
pub use repository::{
    MetricsAggregate, MetricsTotals, Repository, RunListFilter, RunWithAttempts, ScheduleMetrics,
};
