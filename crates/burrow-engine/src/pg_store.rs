//! `PostgreSQL`-backed [`BurrowStore`].
//!
//! [`PgBurrowStore`] adapts [`BurrowRepo`] to the core store trait and
//! folds [`DbError`] into [`StoreError`].

use async_trait::async_trait;
use burrow_core::store::{BurrowStore, StoreError};
use burrow_db::{BurrowRepo, DbError, PostgresPool};
use burrow_types::{Burrow, BurrowDefinition, BurrowId, BurrowUpdate};

/// Burrow store persisted in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgBurrowStore {
    pool: PostgresPool,
}

impl PgBurrowStore {
    /// Wrap an opened pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    const fn repo(&self) -> BurrowRepo<'_> {
        self.pool.repo()
    }
}

#[async_trait]
impl BurrowStore for PgBurrowStore {
    async fn list_all(&self) -> Result<Vec<Burrow>, StoreError> {
        self.repo().list_all().await.map_err(into_store_error)
    }

    async fn list_occupied(&self) -> Result<Vec<Burrow>, StoreError> {
        self.repo().list_occupied().await.map_err(into_store_error)
    }

    async fn create(&self, definition: &BurrowDefinition) -> Result<Burrow, StoreError> {
        self.repo().create(definition).await.map_err(into_store_error)
    }

    async fn create_bulk(&self, definitions: &[BurrowDefinition]) -> Result<Vec<Burrow>, StoreError> {
        self.repo()
            .create_bulk(definitions)
            .await
            .map_err(into_store_error)
    }

    async fn update(&self, id: BurrowId, update: BurrowUpdate) -> Result<(), StoreError> {
        self.repo().update(id, update).await.map_err(into_store_error)
    }

    async fn delete(&self, id: BurrowId) -> Result<(), StoreError> {
        self.repo().delete(id).await.map_err(into_store_error)
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.repo()
            .delete_all()
            .await
            .map(|_| ())
            .map_err(into_store_error)
    }
}

fn into_store_error(error: DbError) -> StoreError {
    match error {
        DbError::NotFound(id) => StoreError::NotFound { id: BurrowId(id) },
        DbError::DuplicateName(name) => StoreError::DuplicateName { name },
        other => StoreError::Backend {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_errors_keep_their_meaning() {
        assert_eq!(
            into_store_error(DbError::NotFound(7)),
            StoreError::NotFound { id: BurrowId(7) }
        );
        assert_eq!(
            into_store_error(DbError::DuplicateName("Den".to_owned())),
            StoreError::DuplicateName {
                name: "Den".to_owned()
            }
        );
    }

    #[test]
    fn other_errors_become_backend_errors() {
        let err = into_store_error(DbError::Config("bad url".to_owned()));
        assert!(matches!(err, StoreError::Backend { message } if message.contains("bad url")));
    }
}
