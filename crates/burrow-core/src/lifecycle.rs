//! Per-burrow time catch-up and eviction.
//!
//! [`LifecycleEngine::decide`] is pure: given the current time and a burrow
//! snapshot it returns what should happen to that burrow, without touching
//! the store. Applying the decision is the job of the update pass
//! (see [`crate::pass`]).
//!
//! # Catch-up
//!
//! A burrow is advanced by the number of *whole* update intervals elapsed
//! since its `updated_at`, in a single step. A burrow that missed several
//! ticks (scheduler downtime, a slow pass) therefore receives the correct
//! number of cycles at once. The new `updated_at` moves forward by whole
//! intervals only, so the sub-interval remainder carries into the next pass
//! instead of being dropped.
//!
//! # Eviction
//!
//! By default the eviction threshold is compared against the age *before*
//! this pass's cycles are added, so a burrow can live through one more pass
//! after reaching its nominal age. [`EvictionPolicy::ProjectedAge`] compares
//! against `age + cycles` instead and evicts one pass earlier.

use burrow_types::{Burrow, BurrowUpdate};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::config::SchedulerConfig;

/// Errors raised by the lifecycle engine.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The configured parameters cannot drive the engine.
    #[error("invalid lifecycle configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// Advancing `updated_at` would leave the representable time range.
    #[error("timestamp overflow advancing burrow by {cycles} cycles")]
    TimeOverflow {
        /// Cycles that were being applied.
        cycles: u64,
    },
}

/// Which age is compared against the maximum burrow age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Compare the age stored before this pass.
    #[default]
    PreUpdateAge,
    /// Compare the age the burrow would have after this pass.
    ProjectedAge,
}

/// Outcome of evaluating one burrow.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Less than one interval has elapsed; nothing to write.
    Noop,
    /// The burrow has reached its maximum age and must be deleted.
    Evict {
        /// Age stored on the record at eviction time.
        age: u64,
    },
    /// Write the new age, depth, and timestamp.
    Advance {
        /// Whole intervals applied in this step.
        cycles: u64,
        /// The values to persist.
        update: BurrowUpdate,
    },
}

/// Pure lifecycle computation for burrows.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEngine {
    interval: TimeDelta,
    interval_ms: i64,
    max_age: u64,
    depth_increment_rate: f64,
    policy: EvictionPolicy,
}

impl LifecycleEngine {
    /// Build an engine from scheduler configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidConfig`] if the update interval is
    /// zero or too large, or the depth rate is negative or not finite.
    pub fn new(config: &SchedulerConfig) -> Result<Self, LifecycleError> {
        let interval_ms = i64::try_from(config.update_interval_ms).map_err(|_err| {
            LifecycleError::InvalidConfig {
                reason: "update interval exceeds i64 milliseconds".to_owned(),
            }
        })?;
        if interval_ms <= 0 {
            return Err(LifecycleError::InvalidConfig {
                reason: "update interval must be at least 1ms".to_owned(),
            });
        }
        let interval =
            TimeDelta::try_milliseconds(interval_ms).ok_or_else(|| LifecycleError::InvalidConfig {
                reason: "update interval out of range".to_owned(),
            })?;

        let rate = config.depth_increment_rate;
        if !rate.is_finite() || rate < 0.0 {
            return Err(LifecycleError::InvalidConfig {
                reason: format!("depth increment rate must be finite and >= 0, got {rate}"),
            });
        }

        Ok(Self {
            interval,
            interval_ms,
            max_age: config.max_burrow_age,
            depth_increment_rate: rate,
            policy: config.eviction_policy,
        })
    }

    /// Decide what happens to `burrow` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TimeOverflow`] if the new timestamp cannot
    /// be represented.
    pub fn decide(&self, now: DateTime<Utc>, burrow: &Burrow) -> Result<Decision, LifecycleError> {
        let elapsed = now.signed_duration_since(burrow.updated_at);
        if elapsed < self.interval {
            return Ok(Decision::Noop);
        }

        // Flooring in milliseconds first does not change the result because
        // the interval is a whole number of milliseconds.
        let whole = elapsed
            .num_milliseconds()
            .checked_div(self.interval_ms)
            .unwrap_or(0);
        let cycles = u64::try_from(whole).unwrap_or(0);
        if cycles == 0 {
            return Ok(Decision::Noop);
        }

        let projected_age = burrow.age.saturating_add(cycles);
        let compared_age = match self.policy {
            EvictionPolicy::PreUpdateAge => burrow.age,
            EvictionPolicy::ProjectedAge => projected_age,
        };
        if compared_age >= self.max_age {
            return Ok(Decision::Evict { age: burrow.age });
        }

        let depth = if burrow.is_occupied {
            burrow.depth + cycles_as_f64(cycles) * self.depth_increment_rate
        } else {
            burrow.depth
        };

        let updated_at = whole
            .checked_mul(self.interval_ms)
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|advance| burrow.updated_at.checked_add_signed(advance))
            .ok_or(LifecycleError::TimeOverflow { cycles })?;

        Ok(Decision::Advance {
            cycles,
            update: BurrowUpdate {
                depth,
                age: projected_age,
                updated_at,
            },
        })
    }
}

#[allow(clippy::cast_precision_loss)]
const fn cycles_as_f64(cycles: u64) -> f64 {
    // Cycle counts stay far below 2^52 for any realistic interval.
    cycles as f64
}
