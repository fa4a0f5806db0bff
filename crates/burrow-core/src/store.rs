//! The record store seam and an in-memory implementation.
//!
//! The lifecycle core needs only a narrow CRUD surface from storage. Each
//! [`BurrowStore::update`] must apply depth, age, and `updated_at` together
//! or not at all. Stores must tolerate concurrent callers (the rental path
//! toggles occupancy from request handlers while the scheduler runs).
//!
//! [`InMemoryBurrowStore`] backs tests and database-less runs. It also
//! records every lifecycle write and supports injected failures so tests
//! can observe exactly which calls a pass made.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use burrow_types::{Burrow, BurrowDefinition, BurrowId, BurrowUpdate};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Errors returned by a [`BurrowStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No burrow with this id exists.
    #[error("burrow {id} not found")]
    NotFound {
        /// The missing id.
        id: BurrowId,
    },

    /// A burrow with this name already exists.
    #[error("burrow name {name:?} already exists")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// The backing store failed.
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// CRUD and bulk operations over burrow records.
#[async_trait]
pub trait BurrowStore: Send + Sync {
    /// Return every burrow, in the store's scan order.
    async fn list_all(&self) -> Result<Vec<Burrow>, StoreError>;

    /// Return the occupied burrows.
    ///
    /// The default filters [`list_all`](Self::list_all).
    async fn list_occupied(&self) -> Result<Vec<Burrow>, StoreError> {
        let mut burrows = self.list_all().await?;
        burrows.retain(|b| b.is_occupied);
        Ok(burrows)
    }

    /// Create one burrow; `updated_at` is set to the creation time.
    async fn create(&self, definition: &BurrowDefinition) -> Result<Burrow, StoreError>;

    /// Create several burrows at once.
    async fn create_bulk(&self, definitions: &[BurrowDefinition]) -> Result<Vec<Burrow>, StoreError>;

    /// Atomically write new depth, age, and `updated_at`.
    async fn update(&self, id: BurrowId, update: BurrowUpdate) -> Result<(), StoreError>;

    /// Delete one burrow.
    async fn delete(&self, id: BurrowId) -> Result<(), StoreError>;

    /// Delete every burrow.
    async fn delete_all(&self) -> Result<(), StoreError>;
}

/// A store call observed by [`InMemoryBurrowStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// [`BurrowStore::update`] was called.
    Update(BurrowId, BurrowUpdate),
    /// [`BurrowStore::delete`] was called.
    Delete(BurrowId),
}

#[derive(Debug, Default)]
struct Faults {
    fail_list: bool,
    fail_create: bool,
    fail_update: BTreeSet<BurrowId>,
    fail_delete: BTreeSet<BurrowId>,
}

#[derive(Debug, Default)]
struct Records {
    next_id: i64,
    burrows: BTreeMap<BurrowId, Burrow>,
}

impl Records {
    fn insert(&mut self, definition: &BurrowDefinition, now: DateTime<Utc>) -> Result<Burrow, StoreError> {
        if self.burrows.values().any(|b| b.name == definition.name) {
            return Err(StoreError::DuplicateName {
                name: definition.name.clone(),
            });
        }
        let id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend {
                message: "burrow id space exhausted".to_owned(),
            })?;
        self.next_id = id;
        let burrow = Burrow {
            id: BurrowId(id),
            name: definition.name.clone(),
            depth: definition.depth,
            width: definition.width,
            is_occupied: definition.is_occupied,
            age: definition.age,
            updated_at: now,
        };
        self.burrows.insert(burrow.id, burrow.clone());
        Ok(burrow)
    }
}

/// A [`BurrowStore`] held entirely in memory.
///
/// Scan order is ascending id. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct InMemoryBurrowStore {
    records: RwLock<Records>,
    calls: Mutex<Vec<StoreCall>>,
    faults: Mutex<Faults>,
}

impl InMemoryBurrowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert fully-formed burrows, keeping their ids and timestamps.
    ///
    /// Used to restore state, and by tests that need precise `updated_at`
    /// values. Later creations continue after the highest id seen.
    pub async fn insert_existing(&self, burrows: impl IntoIterator<Item = Burrow>) {
        let mut records = self.records.write().await;
        for burrow in burrows {
            records.next_id = records.next_id.max(burrow.id.into_inner());
            records.burrows.insert(burrow.id, burrow);
        }
    }

    /// Fetch one burrow.
    pub async fn get(&self, id: BurrowId) -> Option<Burrow> {
        self.records.read().await.burrows.get(&id).cloned()
    }

    /// Number of stored burrows.
    pub async fn len(&self) -> usize {
        self.records.read().await.burrows.len()
    }

    /// Whether the store holds no burrows.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.burrows.is_empty()
    }

    /// Flip occupancy.
    ///
    /// Occupancy belongs to the external rental path; this lets tests and
    /// local runs stand in for it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub async fn set_occupied(&self, id: BurrowId, occupied: bool) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let burrow = records
            .burrows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id })?;
        burrow.is_occupied = occupied;
        Ok(())
    }

    /// Every update and delete call received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make full scans fail until cleared.
    pub fn fail_list(&self, fail: bool) {
        self.faults().fail_list = fail;
    }

    /// Make creations fail until cleared.
    pub fn fail_create(&self, fail: bool) {
        self.faults().fail_create = fail;
    }

    /// Make updates of `id` fail.
    pub fn fail_update_of(&self, id: BurrowId) {
        self.faults().fail_update.insert(id);
    }

    /// Make deletions of `id` fail.
    pub fn fail_delete_of(&self, id: BurrowId) {
        self.faults().fail_delete.insert(id);
    }

    /// Clear all injected failures.
    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: StoreCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn injected(message: &str) -> StoreError {
        StoreError::Backend {
            message: message.to_owned(),
        }
    }
}

#[async_trait]
impl BurrowStore for InMemoryBurrowStore {
    async fn list_all(&self) -> Result<Vec<Burrow>, StoreError> {
        if self.faults().fail_list {
            return Err(Self::injected("injected list failure"));
        }
        Ok(self.records.read().await.burrows.values().cloned().collect())
    }

    async fn create(&self, definition: &BurrowDefinition) -> Result<Burrow, StoreError> {
        if self.faults().fail_create {
            return Err(Self::injected("injected create failure"));
        }
        self.records.write().await.insert(definition, Utc::now())
    }

    async fn create_bulk(&self, definitions: &[BurrowDefinition]) -> Result<Vec<Burrow>, StoreError> {
        if self.faults().fail_create {
            return Err(Self::injected("injected create failure"));
        }
        let mut records = self.records.write().await;

        // All-or-nothing, like the transactional database implementation.
        let mut names: BTreeSet<&str> = records.burrows.values().map(|b| b.name.as_str()).collect();
        for definition in definitions {
            if !names.insert(definition.name.as_str()) {
                return Err(StoreError::DuplicateName {
                    name: definition.name.clone(),
                });
            }
        }

        let now = Utc::now();
        definitions
            .iter()
            .map(|definition| records.insert(definition, now))
            .collect()
    }

    async fn update(&self, id: BurrowId, update: BurrowUpdate) -> Result<(), StoreError> {
        self.record(StoreCall::Update(id, update));
        if self.faults().fail_update.contains(&id) {
            return Err(Self::injected("injected update failure"));
        }
        let mut records = self.records.write().await;
        let burrow = records
            .burrows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id })?;
        burrow.depth = update.depth;
        burrow.age = update.age;
        burrow.updated_at = update.updated_at;
        Ok(())
    }

    async fn delete(&self, id: BurrowId) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(id));
        if self.faults().fail_delete.contains(&id) {
            return Err(Self::injected("injected delete failure"));
        }
        self.records
            .write()
            .await
            .burrows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { id })
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.records.write().await.burrows.clear();
        Ok(())
    }
}
