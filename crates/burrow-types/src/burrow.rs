//! The burrow record and the values used to create and advance it.
//!
//! A [`Burrow`] is owned by the store; the lifecycle core only ever holds
//! copies read during a full scan. Creation goes through a
//! [`BurrowDefinition`] (the seed file format), and every lifecycle write is
//! a single [`BurrowUpdate`] so that age, depth, and `updated_at` always move
//! together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::BurrowId;

/// A burrow tracked by the lifecycle scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Burrow {
    /// Store-assigned identifier, immutable once created.
    pub id: BurrowId,
    /// Unique human label, immutable after creation.
    pub name: String,
    /// Depth in meters. Grows only while the burrow is occupied.
    pub depth: f64,
    /// Width in meters. Fixed at creation, only used to derive volume.
    pub width: f64,
    /// Whether a gopher currently rents the burrow.
    ///
    /// Toggled by the rental path; the lifecycle core only reads it.
    pub is_occupied: bool,
    /// Number of whole update cycles the burrow has lived through.
    pub age: u64,
    /// Timestamp of the last lifecycle update applied to this record.
    pub updated_at: DateTime<Utc>,
}

impl Burrow {
    /// Cylinder volume of this burrow in cubic meters.
    pub fn volume(&self) -> f64 {
        volume(self.width, self.depth)
    }
}

/// Cylinder volume `pi * (width / 2)^2 * depth`.
///
/// Used only for ranking burrows in reports; never persisted.
pub fn volume(width: f64, depth: f64) -> f64 {
    let radius = width / 2.0;
    std::f64::consts::PI * radius * radius * depth
}

/// The fields needed to create a burrow.
///
/// Matches the seed file format, where occupancy is spelled `occupied`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurrowDefinition {
    /// Unique human label.
    pub name: String,
    /// Initial depth in meters.
    pub depth: f64,
    /// Width in meters.
    pub width: f64,
    /// Initial occupancy.
    #[serde(rename = "occupied", default)]
    pub is_occupied: bool,
    /// Initial age in update cycles.
    #[serde(default)]
    pub age: u64,
}

/// A lifecycle write: the new age, depth, and update timestamp of a burrow.
///
/// Stores must apply all three fields atomically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurrowUpdate {
    /// New depth in meters.
    pub depth: f64,
    /// New age in update cycles.
    pub age: u64,
    /// New last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn volume_uses_cylinder_model() {
        assert!(approx(volume(2.0, 5.0), 15.71));
        assert!(approx(volume(3.0, 10.0), 70.69));
    }

    #[test]
    fn zero_depth_has_zero_volume() {
        assert_eq!(volume(4.0, 0.0), 0.0);
    }

    #[test]
    fn definition_reads_seed_format() {
        let json = r#"{"name":"Hilltop","depth":1.5,"width":0.8,"occupied":true,"age":12}"#;
        let def: BurrowDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.name, "Hilltop");
        assert!(def.is_occupied);
        assert_eq!(def.age, 12);
    }

    #[test]
    fn definition_defaults_occupancy_and_age() {
        let json = r#"{"name":"Meadow","depth":2.0,"width":1.0}"#;
        let def: BurrowDefinition = serde_json::from_str(json).unwrap();
        assert!(!def.is_occupied);
        assert_eq!(def.age, 0);
    }

    #[test]
    fn burrow_volume_matches_free_function() {
        let burrow = Burrow {
            id: BurrowId(1),
            name: "Creek".to_owned(),
            depth: 10.0,
            width: 3.0,
            is_occupied: false,
            age: 0,
            updated_at: Utc::now(),
        };
        assert_eq!(burrow.volume(), volume(3.0, 10.0));
    }
}
