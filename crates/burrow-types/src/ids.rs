//! Type-safe identifier wrappers.
//!
//! Burrow identifiers are assigned by the store (a `BIGSERIAL` column in
//! `PostgreSQL`, a monotonic counter in the in-memory store) and never change
//! once assigned. Wrapping them prevents accidental mixing with ages or
//! counts, which share the same integer representation.

use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a burrow.
///
/// Ordering follows the numeric value, which is also creation order for
/// both bundled stores. Aggregation relies on this ordering for
/// deterministic tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BurrowId(pub i64);

impl BurrowId {
    /// Return the inner numeric value.
    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for BurrowId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BurrowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<BurrowId> for i64 {
    fn from(id: BurrowId) -> Self {
        id.0
    }
}
