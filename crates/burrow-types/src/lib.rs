//! Shared type definitions for the burrow lifecycle scheduler.
//!
//! This crate is the single source of truth for the burrow record and the
//! values exchanged between the lifecycle core, the store implementations,
//! and the seed loader.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed store-assigned identifiers
//! - [`burrow`] -- The burrow record, seed definitions, and lifecycle writes

pub mod burrow;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use burrow::{Burrow, BurrowDefinition, BurrowUpdate, volume};
pub use ids::BurrowId;
