//! Persistence for the `burrows` table.
//!
//! Every lifecycle write goes through [`BurrowRepo::update`], a single
//! `UPDATE` statement, so depth, age, and `updated_at` change together or
//! not at all.

use burrow_types::{Burrow, BurrowDefinition, BurrowId, BurrowUpdate};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DbError;

const SELECT_COLUMNS: &str = "id, name, depth, width, is_occupied, age, updated_at";

/// Operations on the `burrows` table.
pub struct BurrowRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BurrowRepo<'a> {
    /// Create a new repository bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every burrow, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Burrow>, DbError> {
        let rows = sqlx::query_as::<_, BurrowRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM burrows ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Burrow::try_from).collect()
    }

    /// Occupied burrows, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn list_occupied(&self) -> Result<Vec<Burrow>, DbError> {
        let rows = sqlx::query_as::<_, BurrowRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM burrows WHERE is_occupied ORDER BY id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Burrow::try_from).collect()
    }

    /// Insert one burrow.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DuplicateName`] if the name is taken.
    pub async fn create(&self, definition: &BurrowDefinition) -> Result<Burrow, DbError> {
        let mut tx = self.pool.begin().await?;
        let burrow = insert(&mut tx, definition).await?;
        tx.commit().await?;

        tracing::debug!(id = %burrow.id, name = %burrow.name, "Created burrow");
        Ok(burrow)
    }

    /// Insert several burrows in one transaction.
    ///
    /// Either all definitions are inserted or none are.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DuplicateName`] if any name is taken, including
    /// by an earlier definition in the same batch.
    pub async fn create_bulk(&self, definitions: &[BurrowDefinition]) -> Result<Vec<Burrow>, DbError> {
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(definitions.len());
        for definition in definitions {
            created.push(insert(&mut tx, definition).await?);
        }
        tx.commit().await?;

        tracing::debug!(count = created.len(), "Created burrows");
        Ok(created)
    }

    /// Write a lifecycle update to one burrow.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no burrow has this id.
    pub async fn update(&self, id: BurrowId, update: BurrowUpdate) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE burrows
              SET depth = $2, age = $3, updated_at = $4
              WHERE id = $1",
        )
        .bind(id.0)
        .bind(update.depth)
        .bind(age_to_column(update.age)?)
        .bind(update.updated_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id.0));
        }
        Ok(())
    }

    /// Delete one burrow.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no burrow has this id.
    pub async fn delete(&self, id: BurrowId) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM burrows WHERE id = $1")
            .bind(id.0)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id.0));
        }
        Ok(())
    }

    /// Delete every burrow. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM burrows").execute(self.pool).await?;
        tracing::info!(deleted = result.rows_affected(), "Deleted all burrows");
        Ok(result.rows_affected())
    }
}

async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    definition: &BurrowDefinition,
) -> Result<Burrow, DbError> {
    let row = sqlx::query_as::<_, BurrowRow>(&format!(
        r"INSERT INTO burrows (name, depth, width, is_occupied, age)
          VALUES ($1, $2, $3, $4, $5)
          RETURNING {SELECT_COLUMNS}"
    ))
    .bind(&definition.name)
    .bind(definition.depth)
    .bind(definition.width)
    .bind(definition.is_occupied)
    .bind(age_to_column(definition.age)?)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| duplicate_or(e, &definition.name))?;

    Burrow::try_from(row)
}

fn duplicate_or(error: sqlx::Error, name: &str) -> DbError {
    let unique = error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        DbError::DuplicateName(name.to_owned())
    } else {
        DbError::Postgres(error)
    }
}

fn age_to_column(age: u64) -> Result<i64, DbError> {
    i64::try_from(age).map_err(|e| DbError::OutOfRange {
        column: "age",
        value: format!("{age} ({e})"),
    })
}

/// A row from the `burrows` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BurrowRow {
    /// Auto-incremented burrow id.
    pub id: i64,
    /// Unique name.
    pub name: String,
    /// Depth in meters.
    pub depth: f64,
    /// Width in meters.
    pub width: f64,
    /// Occupancy flag.
    pub is_occupied: bool,
    /// Age in update cycles.
    pub age: i64,
    /// Last lifecycle update.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BurrowRow> for Burrow {
    type Error = DbError;

    fn try_from(row: BurrowRow) -> Result<Self, Self::Error> {
        let age = u64::try_from(row.age).map_err(|e| DbError::OutOfRange {
            column: "age",
            value: format!("{} ({e})", row.age),
        })?;
        Ok(Self {
            id: BurrowId(row.id),
            name: row.name,
            depth: row.depth,
            width: row.width,
            is_occupied: row.is_occupied,
            age,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(age: i64) -> BurrowRow {
        BurrowRow {
            id: 4,
            name: "Meadow".to_owned(),
            depth: 2.5,
            width: 1.5,
            is_occupied: true,
            age,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn row_converts_to_burrow() {
        let burrow = Burrow::try_from(row(12)).unwrap();
        assert_eq!(burrow.id, BurrowId(4));
        assert_eq!(burrow.age, 12);
        assert!(burrow.is_occupied);
    }

    #[test]
    fn negative_age_is_rejected() {
        let err = Burrow::try_from(row(-1)).unwrap_err();
        assert!(matches!(err, DbError::OutOfRange { column: "age", .. }));
    }

    #[test]
    fn age_beyond_bigint_is_rejected() {
        assert!(age_to_column(u64::MAX).is_err());
        assert_eq!(age_to_column(36_000).unwrap(), 36_000);
    }

    #[test]
    fn non_unique_errors_pass_through() {
        let err = duplicate_or(sqlx::Error::RowNotFound, "Meadow");
        assert!(matches!(err, DbError::Postgres(sqlx::Error::RowNotFound)));
    }
}
