//! Point-in-time aggregate statistics over the full burrow set.
//!
//! Statistics are always recomputed from a complete scan. There are no
//! running totals to keep in sync with creations, evictions, or occupancy
//! changes, so an aggregate always matches the records it was built from.

use burrow_types::{Burrow, BurrowId};

/// A burrow selected as the largest or smallest by volume.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedBurrow {
    /// Identifier of the burrow.
    pub id: BurrowId,
    /// Name of the burrow.
    pub name: String,
    /// Volume in cubic meters at aggregation time.
    pub volume: f64,
}

impl RankedBurrow {
    fn from_burrow(burrow: &Burrow, volume: f64) -> Self {
        Self {
            id: burrow.id,
            name: burrow.name.clone(),
            volume,
        }
    }
}

/// Aggregate over a burrow snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BurrowStats {
    /// Number of burrows aggregated.
    pub burrow_count: usize,
    /// Sum of depths over all burrows, occupied or not.
    pub total_depth: f64,
    /// Number of unoccupied burrows.
    pub available_count: usize,
    /// The burrow with the largest volume.
    pub largest: Option<RankedBurrow>,
    /// The burrow with the smallest volume.
    pub smallest: Option<RankedBurrow>,
}

impl BurrowStats {
    /// Whether the aggregate was built from an empty snapshot.
    pub const fn is_empty(&self) -> bool {
        self.burrow_count == 0
    }
}

/// Aggregate a snapshot of burrows.
///
/// Ties on volume go to the burrow with the lowest id, independent of the
/// order the store returned them in.
pub fn aggregate(burrows: &[Burrow]) -> BurrowStats {
    let mut ordered: Vec<&Burrow> = burrows.iter().collect();
    ordered.sort_by_key(|b| b.id);

    let mut stats = BurrowStats {
        burrow_count: ordered.len(),
        ..BurrowStats::default()
    };
    let mut largest: Option<(&Burrow, f64)> = None;
    let mut smallest: Option<(&Burrow, f64)> = None;

    for burrow in ordered {
        stats.total_depth += burrow.depth;
        if !burrow.is_occupied {
            stats.available_count = stats.available_count.saturating_add(1);
        }

        let volume = burrow.volume();
        if largest.is_none_or(|(_, best)| volume > best) {
            largest = Some((burrow, volume));
        }
        if smallest.is_none_or(|(_, best)| volume < best) {
            smallest = Some((burrow, volume));
        }
    }

    stats.largest = largest.map(|(b, v)| RankedBurrow::from_burrow(b, v));
    stats.smallest = smallest.map(|(b, v)| RankedBurrow::from_burrow(b, v));
    stats
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn burrow(id: i64, width: f64, depth: f64, occupied: bool) -> Burrow {
        Burrow {
            id: BurrowId(id),
            name: format!("Burrow {id}"),
            depth,
            width,
            is_occupied: occupied,
            age: 0,
            updated_at: Utc::now(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn empty_snapshot_yields_zero_aggregate() {
        let stats = aggregate(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats.total_depth, 0.0);
        assert_eq!(stats.available_count, 0);
        assert!(stats.largest.is_none());
        assert!(stats.smallest.is_none());
    }

    #[test]
    fn ranks_two_burrows_by_volume() {
        let burrows = vec![burrow(1, 2.0, 5.0, true), burrow(2, 3.0, 10.0, false)];
        let stats = aggregate(&burrows);

        let largest = stats.largest.unwrap();
        let smallest = stats.smallest.unwrap();
        assert_eq!(largest.id, BurrowId(2));
        assert!(approx(largest.volume, 70.69));
        assert_eq!(smallest.id, BurrowId(1));
        assert!(approx(smallest.volume, 15.71));
        assert_eq!(stats.available_count, 1);
        assert!(approx(stats.total_depth, 15.0));
    }

    #[test]
    fn total_depth_ignores_occupancy() {
        let burrows = vec![
            burrow(1, 1.0, 1.25, true),
            burrow(2, 1.0, 2.5, false),
            burrow(3, 1.0, 4.0, true),
        ];
        let stats = aggregate(&burrows);
        assert!(approx(stats.total_depth, 7.75));
        assert_eq!(stats.available_count, 1);
        assert_eq!(stats.burrow_count, 3);
    }

    #[test]
    fn single_burrow_is_both_largest_and_smallest() {
        let stats = aggregate(&[burrow(9, 2.0, 2.0, false)]);
        assert_eq!(stats.largest.unwrap().id, BurrowId(9));
        assert_eq!(stats.smallest.unwrap().id, BurrowId(9));
    }

    #[test]
    fn ties_go_to_lowest_id_regardless_of_input_order() {
        let burrows = vec![
            burrow(5, 2.0, 3.0, false),
            burrow(2, 2.0, 3.0, false),
            burrow(8, 2.0, 3.0, false),
        ];
        let stats = aggregate(&burrows);
        assert_eq!(stats.largest.unwrap().id, BurrowId(2));
        assert_eq!(stats.smallest.unwrap().id, BurrowId(2));
    }

    #[test]
    fn zero_volume_burrow_can_be_smallest() {
        let burrows = vec![burrow(1, 2.0, 0.0, true), burrow(2, 1.0, 1.0, true)];
        let stats = aggregate(&burrows);
        assert_eq!(stats.smallest.unwrap().volume, 0.0);
        assert_eq!(stats.available_count, 0);
    }
}
