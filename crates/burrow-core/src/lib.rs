//! Lifecycle engine, statistics, reports, and scheduling for burrow records.
//!
//! This crate owns the two periodic jobs of the burrow service: the update
//! pass that ages, deepens, and evicts burrows, and the report pass that
//! summarizes the surviving set to a text file.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait with system and manual implementations.
//! - [`config`] -- Layered configuration loading from `burrow-config.yaml`
//!   and `BURROW__*` environment variables.
//! - [`lifecycle`] -- Catch-up arithmetic deciding what happens to a burrow.
//! - [`pass`] -- One update pass and one report pass over a store.
//! - [`report`] -- Report text and collision-safe report files.
//! - [`scheduler`] -- Bootstrap and the two-timer event loop.
//! - [`seed`] -- [`SeedLoader`] trait and the JSON seed file.
//! - [`stats`] -- Aggregate statistics over a burrow set.
//! - [`store`] -- [`BurrowStore`] trait and the in-memory store.
//!
//! [`Clock`]: clock::Clock
//! [`SeedLoader`]: seed::SeedLoader
//! [`BurrowStore`]: store::BurrowStore

pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod pass;
pub mod report;
pub mod scheduler;
pub mod seed;
pub mod stats;
pub mod store;

pub use burrow_types::{Burrow, BurrowDefinition, BurrowId, BurrowUpdate};
