//! Initial burrow set loaded when the store is empty at startup.

use std::path::PathBuf;

use async_trait::async_trait;
use burrow_types::BurrowDefinition;

/// Errors that can occur while loading the seed set.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The seed file could not be read.
    #[error("failed to read seed file {path}: {source}")]
    Read {
        /// The seed file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The seed file is not a JSON array of burrow definitions.
    #[error("failed to parse seed file {path}: {source}")]
    Parse {
        /// The seed file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A definition has unusable dimensions.
    #[error("invalid seed burrow {name:?}: {reason}")]
    Invalid {
        /// Name of the offending definition.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Source of the initial burrow set.
#[async_trait]
pub trait SeedLoader: Send + Sync {
    /// Load the definitions to create on first start.
    async fn load_initial_set(&self) -> Result<Vec<BurrowDefinition>, SeedError>;
}

/// Seed set stored as a JSON array, e.g.
///
/// ```json
/// [{ "name": "Hilltop", "depth": 1.2, "width": 0.6, "occupied": true, "age": 0 }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonSeedFile {
    path: PathBuf,
}

impl JsonSeedFile {
    /// Seed from the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SeedLoader for JsonSeedFile {
    async fn load_initial_set(&self) -> Result<Vec<BurrowDefinition>, SeedError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SeedError::Read {
                path: self.path.clone(),
                source,
            })?;
        let definitions: Vec<BurrowDefinition> =
            serde_json::from_slice(&bytes).map_err(|source| SeedError::Parse {
                path: self.path.clone(),
                source,
            })?;
        definitions.iter().try_for_each(validate)?;
        Ok(definitions)
    }
}

/// A fixed seed set, for tests and embedding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSeed(pub Vec<BurrowDefinition>);

#[async_trait]
impl SeedLoader for StaticSeed {
    async fn load_initial_set(&self) -> Result<Vec<BurrowDefinition>, SeedError> {
        self.0.iter().try_for_each(validate)?;
        Ok(self.0.clone())
    }
}

fn validate(definition: &BurrowDefinition) -> Result<(), SeedError> {
    let invalid = |reason: &str| SeedError::Invalid {
        name: definition.name.clone(),
        reason: reason.to_owned(),
    };
    if definition.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if !definition.depth.is_finite() || definition.depth < 0.0 {
        return Err(invalid("depth must be finite and >= 0"));
    }
    if !definition.width.is_finite() || definition.width < 0.0 {
        return Err(invalid("width must be finite and >= 0"));
    }
    Ok(())
}
