//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors and the two constraint failures callers act on.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// No row with this id exists.
    #[error("burrow {0} not found")]
    NotFound(i64),

    /// A burrow with this name already exists.
    #[error("burrow name already exists: {0}")]
    DuplicateName(String),

    /// A value does not fit the column it is stored in.
    #[error("value out of range for column {column}: {value}")]
    OutOfRange {
        /// Column name.
        column: &'static str,
        /// Offending value, formatted.
        value: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
