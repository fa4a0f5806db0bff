//! Single update and report passes over the full record set.
//!
//! A pass reads every burrow once, then works record by record. A failure
//! writing one record is logged and counted; the remaining records are
//! still processed and the failed record is retried on the next pass,
//! because its `updated_at` was not moved. Only a failed full scan abandons
//! a pass.

use burrow_types::Burrow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::lifecycle::{Decision, LifecycleEngine};
use crate::report::{ReportError, ReportOutcome, ReportWriter};
use crate::stats;
use crate::store::{BurrowStore, StoreError};

/// Errors that abandon a whole pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The full scan failed.
    #[error("failed to scan burrows: {source}")]
    Scan {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// The report could not be written.
    #[error("failed to write report: {source}")]
    Report {
        /// The underlying report error.
        #[from]
        source: ReportError,
    },
}

/// Counters describing one update pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Burrows returned by the scan.
    pub scanned: usize,
    /// Burrows whose age/depth/timestamp were written.
    pub advanced: usize,
    /// Burrows deleted for reaching the maximum age.
    pub evicted: usize,
    /// Burrows updated less than one interval ago.
    pub unchanged: usize,
    /// Burrows whose write or delete failed; retried next pass.
    pub failed: usize,
}

/// Advance or evict every burrow in the store as of `now`.
///
/// # Errors
///
/// Returns [`PassError::Scan`] if the store cannot be listed. Per-record
/// failures are counted in [`PassSummary::failed`] instead.
pub async fn run_update_pass(
    store: &dyn BurrowStore,
    engine: &LifecycleEngine,
    now: DateTime<Utc>,
) -> Result<PassSummary, PassError> {
    let burrows = store.list_all().await?;
    Ok(apply_update_pass(store, engine, now, &burrows).await)
}

/// Advance or evict an already-scanned set of burrows as of `now`.
///
/// Records are handled in slice order, one store write each.
pub async fn apply_update_pass(
    store: &dyn BurrowStore,
    engine: &LifecycleEngine,
    now: DateTime<Utc>,
    burrows: &[Burrow],
) -> PassSummary {
    let mut summary = PassSummary {
        scanned: burrows.len(),
        ..PassSummary::default()
    };

    for burrow in burrows {
        apply_one(store, engine, now, burrow, &mut summary).await;
    }

    info!(
        scanned = summary.scanned,
        advanced = summary.advanced,
        evicted = summary.evicted,
        unchanged = summary.unchanged,
        failed = summary.failed,
        "Update pass complete"
    );
    summary
}

async fn apply_one(
    store: &dyn BurrowStore,
    engine: &LifecycleEngine,
    now: DateTime<Utc>,
    burrow: &Burrow,
    summary: &mut PassSummary,
) {
    let decision = match engine.decide(now, burrow) {
        Ok(decision) => decision,
        Err(e) => {
            warn!(burrow_id = %burrow.id, error = %e, "Lifecycle computation failed");
            summary.failed = summary.failed.saturating_add(1);
            return;
        }
    };

    match decision {
        Decision::Noop => {
            summary.unchanged = summary.unchanged.saturating_add(1);
        }
        Decision::Evict { age } => match store.delete(burrow.id).await {
            Ok(()) => {
                info!(burrow_id = %burrow.id, name = %burrow.name, age, "Evicted burrow");
                summary.evicted = summary.evicted.saturating_add(1);
            }
            Err(e) => {
                warn!(burrow_id = %burrow.id, error = %e, "Failed to evict burrow");
                summary.failed = summary.failed.saturating_add(1);
            }
        },
        Decision::Advance { cycles, update } => match store.update(burrow.id, update).await {
            Ok(()) => {
                debug!(
                    burrow_id = %burrow.id,
                    cycles,
                    age = update.age,
                    depth_before = burrow.depth,
                    depth_after = update.depth,
                    "Advanced burrow"
                );
                summary.advanced = summary.advanced.saturating_add(1);
            }
            Err(e) => {
                warn!(burrow_id = %burrow.id, error = %e, "Failed to update burrow");
                summary.failed = summary.failed.saturating_add(1);
            }
        },
    }
}

/// Aggregate the current record set and write a report stamped `now`.
///
/// # Errors
///
/// Returns [`PassError::Scan`] if the store cannot be listed, or
/// [`PassError::Report`] if the report cannot be persisted.
pub async fn run_report_pass(
    store: &dyn BurrowStore,
    writer: &ReportWriter,
    now: DateTime<Utc>,
) -> Result<ReportOutcome, PassError> {
    let burrows = store.list_all().await?;
    let stats = stats::aggregate(&burrows);
    let outcome = writer.write(&stats, now).await?;

    match &outcome {
        ReportOutcome::Written(path) => info!(
            path = %path.display(),
            burrows = stats.burrow_count,
            total_depth = stats.total_depth,
            available = stats.available_count,
            "Report generated"
        ),
        ReportOutcome::Skipped => info!("No burrows to report, skipping"),
    }
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::arithmetic_side_effects)]
mod tests {
    use burrow_types::BurrowId;
    use chrono::TimeDelta;

    use super::*;
    use crate::config::SchedulerConfig;
    use crate::lifecycle::EvictionPolicy;
    use crate::store::{InMemoryBurrowStore, StoreCall};

    fn engine() -> LifecycleEngine {
        LifecycleEngine::new(&SchedulerConfig {
            update_interval_ms: 60_000,
            report_interval_ms: 3_600_000,
            max_burrow_age: 36_000,
            depth_increment_rate: 0.009,
            eviction_policy: EvictionPolicy::PreUpdateAge,
        })
        .unwrap()
    }

    fn burrow(
        id: i64,
        depth: f64,
        width: f64,
        occupied: bool,
        age: u64,
        updated_at: DateTime<Utc>,
    ) -> Burrow {
        Burrow {
            id: BurrowId(id),
            name: format!("Burrow {id}"),
            depth,
            width,
            is_occupied: occupied,
            age,
            updated_at,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn hour_of_downtime_is_caught_up_in_one_pass() {
        let now = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([burrow(1, 5.0, 2.0, true, 0, now - TimeDelta::minutes(60))])
            .await;

        let summary = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(summary.advanced, 1);

        let stored = store.get(BurrowId(1)).await.unwrap();
        assert_eq!(stored.age, 60);
        assert!(approx(stored.depth, 5.54));
        assert_eq!(stored.updated_at, now);
    }

    #[tokio::test]
    async fn old_burrow_gets_delete_and_no_update() {
        let now = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([burrow(7, 10.0, 1.0, true, 36_000, now - TimeDelta::minutes(1))])
            .await;

        let summary = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(summary.evicted, 1);
        assert_eq!(store.calls(), vec![StoreCall::Delete(BurrowId(7))]);
        assert!(store.get(BurrowId(7)).await.is_none());
    }

    #[tokio::test]
    async fn recent_burrow_gets_no_write() {
        let now = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([burrow(1, 5.0, 2.0, true, 0, now - TimeDelta::seconds(30))])
            .await;

        let summary = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(summary.unchanged, 1);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn immediate_second_pass_writes_nothing() {
        let now = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([burrow(1, 5.0, 2.0, false, 0, now - TimeDelta::minutes(3))])
            .await;

        run_update_pass(&store, &engine(), now).await.unwrap();
        let calls_after_first = store.calls().len();
        let second = run_update_pass(&store, &engine(), now).await.unwrap();

        assert_eq!(second.unchanged, 1);
        assert_eq!(store.calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn mixed_burrows() {
        let now = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([
                burrow(1, 10.0, 1.0, false, 36_000, now - TimeDelta::hours(24)),
                burrow(2, 5.0, 1.0, true, 0, now - TimeDelta::minutes(60)),
                burrow(3, 8.0, 1.0, false, 30, now - TimeDelta::minutes(1)),
            ])
            .await;

        let summary = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(
            summary,
            PassSummary {
                scanned: 3,
                advanced: 2,
                evicted: 1,
                unchanged: 0,
                failed: 0,
            }
        );
        assert!(store.get(BurrowId(1)).await.is_none());
        assert_eq!(store.get(BurrowId(3)).await.unwrap().age, 31);
        assert!(approx(store.get(BurrowId(3)).await.unwrap().depth, 8.0));
    }

    #[tokio::test]
    async fn depth_grows_only_after_burrow_is_rented() {
        let start = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([burrow(1, 5.0, 2.0, false, 0, start)])
            .await;

        run_update_pass(&store, &engine(), start + TimeDelta::minutes(10))
            .await
            .unwrap();
        assert!(approx(store.get(BurrowId(1)).await.unwrap().depth, 5.0));

        store.set_occupied(BurrowId(1), true).await.unwrap();
        run_update_pass(&store, &engine(), start + TimeDelta::minutes(20))
            .await
            .unwrap();

        let stored = store.get(BurrowId(1)).await.unwrap();
        assert_eq!(stored.age, 20);
        assert!(approx(stored.depth, 5.09));
    }

    #[tokio::test]
    async fn one_failed_write_does_not_stop_the_pass() {
        let now = Utc::now();
        let last = now - TimeDelta::minutes(2);
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([
                burrow(1, 1.0, 1.0, true, 0, last),
                burrow(2, 1.0, 1.0, true, 0, last),
                burrow(3, 1.0, 1.0, true, 0, last),
            ])
            .await;
        store.fail_update_of(BurrowId(2));

        let summary = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(summary.advanced, 2);
        assert_eq!(summary.failed, 1);

        // The failed record is untouched and is picked up next time.
        let untouched = store.get(BurrowId(2)).await.unwrap();
        assert_eq!(untouched.age, 0);
        assert_eq!(untouched.updated_at, last);

        store.clear_faults();
        let retry = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(retry.advanced, 1);
        assert_eq!(store.get(BurrowId(2)).await.unwrap().age, 2);
    }

    #[tokio::test]
    async fn failed_eviction_is_retried_next_pass() {
        let now = Utc::now();
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([burrow(4, 1.0, 1.0, false, 40_000, now - TimeDelta::minutes(5))])
            .await;
        store.fail_delete_of(BurrowId(4));

        let first = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(first.failed, 1);
        assert!(store.get(BurrowId(4)).await.is_some());

        store.clear_faults();
        let second = run_update_pass(&store, &engine(), now).await.unwrap();
        assert_eq!(second.evicted, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn scan_failure_abandons_the_pass() {
        let store = InMemoryBurrowStore::new();
        store.fail_list(true);
        let result = run_update_pass(&store, &engine(), Utc::now()).await;
        assert!(matches!(result, Err(PassError::Scan { .. })));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn evicted_burrow_is_absent_from_next_report() {
        let now = Utc::now();
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path());
        let store = InMemoryBurrowStore::new();
        store
            .insert_existing([
                burrow(1, 50.0, 9.0, false, 36_000, now - TimeDelta::minutes(1)),
                burrow(2, 5.0, 2.0, true, 0, now - TimeDelta::minutes(1)),
            ])
            .await;

        run_update_pass(&store, &engine(), now).await.unwrap();
        let outcome = run_report_pass(&store, &writer, now).await.unwrap();

        let ReportOutcome::Written(path) = outcome else {
            panic!("expected a report");
        };
        let body = tokio::fs::read_to_string(path).await.unwrap();
        assert!(body.contains("Largest Burrow: Burrow 2"));
        assert!(!body.contains("Burrow 1"));
        assert!(body.contains("Available Burrows: 0"));
    }

    #[tokio::test]
    async fn empty_store_produces_no_report() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path().join("reports"));
        let store = InMemoryBurrowStore::new();

        let outcome = run_report_pass(&store, &writer, Utc::now()).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Skipped);
        assert!(!tmp.path().join("reports").exists());
    }

    #[tokio::test]
    async fn report_scan_failure_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path());
        let store = InMemoryBurrowStore::new();
        store.fail_list(true);
        let result = run_report_pass(&store, &writer, Utc::now()).await;
        assert!(matches!(result, Err(PassError::Scan { .. })));
    }
}
