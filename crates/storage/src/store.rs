//! Snapshot store implementations

use crate::snapshot::EngineSnapshot;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Errors during snapshot persistence
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key-value save/restore contract for engine state
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StorageError>;
    fn load(&self) -> Result<Option<EngineSnapshot>, StorageError>;
}

/// File-backed store: one JSON document, written atomically via a
/// temp file and rename
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = json.len(), "Snapshot saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<EngineSnapshot>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read(&self.path)?;
        let snapshot = serde_json::from_slice(&json)?;
        info!(path = %self.path.display(), "Snapshot loaded");
        Ok(Some(snapshot))
    }
}

/// In-memory store for tests and embedded use
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<EngineSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<EngineSnapshot>, StorageError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
