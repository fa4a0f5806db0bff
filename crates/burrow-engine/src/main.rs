//! Burrow lifecycle scheduler binary.
//!
//! Wires configuration, logging, the record store, and the scheduler
//! together, then runs until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `burrow-config.yaml` and `BURROW__*` variables
//! 2. Initialize structured logging (tracing)
//! 3. Open the record store (`PostgreSQL` when a URL is configured,
//!    in-memory otherwise)
//! 4. Bootstrap and start the scheduler
//! 5. Wait for Ctrl-C, then stop the scheduler and close the store

mod error;
mod pg_store;

use std::sync::Arc;
use std::time::Duration;

use burrow_core::clock::SystemClock;
use burrow_core::config::{BurrowConfig, DatabaseConfig, LogFormat, LoggingConfig};
use burrow_core::scheduler::Scheduler;
use burrow_core::seed::JsonSeedFile;
use burrow_core::store::{BurrowStore, InMemoryBurrowStore};
use burrow_db::{PoolSettings, PostgresPool};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::pg_store::PgBurrowStore;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the database, or the scheduler
/// cannot be set up, or if shutdown fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is set up from it, so a load failure
    //    is reported through the default subscriber.
    let loaded = BurrowConfig::load_default();
    let default_logging = LoggingConfig::default();
    init_tracing(loaded.as_ref().map_or(&default_logging, |c| &c.logging));
    let config = loaded.map_err(EngineError::from)?;

    // 2. Logging is live from here on.
    info!(
        update_interval_ms = config.scheduler.update_interval_ms,
        report_interval_ms = config.scheduler.report_interval_ms,
        max_burrow_age = config.scheduler.max_burrow_age,
        depth_increment_rate = config.scheduler.depth_increment_rate,
        seed_file = %config.bootstrap.seed_file.display(),
        reports = %config.reports.directory.display(),
        "burrow-engine starting"
    );

    // 3. Open the store.
    let (store, pool) = open_store(&config.database).await?;

    // 4. Start the scheduler.
    let scheduler = Scheduler::new(
        &config,
        store,
        Arc::new(JsonSeedFile::new(config.bootstrap.seed_file.clone())),
        Arc::new(SystemClock),
    )
    .map_err(EngineError::from)?;
    let running = scheduler.start().await;
    info!(bootstrap = ?running.bootstrap(), "Scheduler running");

    // 5. Run until interrupted.
    let signal = tokio::signal::ctrl_c().await.map_err(|e| EngineError::Signal {
        message: e.to_string(),
    });
    if let Err(e) = &signal {
        warn!(error = %e, "Failed to wait for Ctrl-C, shutting down");
    } else {
        info!("Shutdown requested");
    }

    let (_, stats) = running.stop().await.map_err(EngineError::from)?;
    info!(
        update_passes = stats.update_passes,
        report_passes = stats.report_passes,
        reports_written = stats.reports_written,
        failed_passes = stats.failed_passes,
        "burrow-engine stopped"
    );

    if let Some(pool) = pool {
        pool.close().await;
    }
    signal?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn open_store(
    database: &DatabaseConfig,
) -> Result<(Arc<dyn BurrowStore>, Option<PostgresPool>), EngineError> {
    let Some(url) = database.url.as_deref() else {
        warn!("No database URL configured, burrows are kept in memory only");
        return Ok((Arc::new(InMemoryBurrowStore::new()), None));
    };

    let settings = PoolSettings {
        max_connections: database.max_connections,
        connect_timeout: Duration::from_millis(database.connect_timeout_ms),
    };
    let pool = PostgresPool::open(url, settings).await?;

    Ok((Arc::new(PgBurrowStore::new(pool.clone())), Some(pool)))
}
