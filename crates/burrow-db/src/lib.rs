//! `PostgreSQL` persistence for burrow records.
//!
//! # Modules
//!
//! - [`postgres`] -- Migrated connection pool and its sizing
//! - [`burrow_repo`] -- Queries on the `burrows` table
//! - [`error`] -- Shared error types

pub mod burrow_repo;
pub mod error;
pub mod postgres;

// Re-export primary types for convenience.
pub use burrow_repo::{BurrowRepo, BurrowRow};
pub use error::DbError;
pub use postgres::{PoolSettings, PostgresPool};
