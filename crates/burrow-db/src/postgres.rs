//! Connection pool for the burrow database.
//!
//! [`PostgresPool::open`] is the only way to get a pool. It connects, then
//! applies the embedded migrations before returning, so a [`BurrowRepo`]
//! handed out by [`PostgresPool::repo`] always sees the `burrows` table.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::burrow_repo::BurrowRepo;
use crate::error::DbError;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Pool sizing for the burrow database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// How long to wait for a free connection, including the first one.
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// A migrated connection pool.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Connect to `url` and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for a malformed URL or a zero-sized
    /// pool, [`DbError::Postgres`] if the server is unreachable, and
    /// [`DbError::Migration`] if the schema cannot be applied.
    pub async fn open(url: &str, settings: PoolSettings) -> Result<Self, DbError> {
        if settings.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be at least 1".to_owned(),
            ));
        }
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("invalid database URL: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        let burrows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM burrows")
            .fetch_one(&pool)
            .await?;
        tracing::info!(
            max_connections = settings.max_connections,
            burrows,
            "Burrow database ready"
        );

        Ok(Self { pool })
    }

    /// Queries on the `burrows` table.
    pub const fn repo(&self) -> BurrowRepo<'_> {
        BurrowRepo::new(&self.pool)
    }

    /// Wait for in-flight queries, then close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Burrow database closed");
    }
}
