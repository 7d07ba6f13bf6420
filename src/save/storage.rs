//! Persistence backends for save slots and settings

use super::{SaveState, SlotId, StorageError};
use crate::types::Settings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Fixed key the persisted data is stored under
pub const STORAGE_KEY: &str = "shiori";

/// Everything that survives a restart
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredData {
    pub settings: Settings,
    pub save_states: BTreeMap<SlotId, SaveState>,
}

#[async_trait]
pub trait SaveStorage: Send + Sync {
    /// Read the stored data; `None` if nothing was stored yet
    async fn read(&self) -> Result<Option<StoredData>, StorageError>;
    async fn write(&self, data: &StoredData) -> Result<(), StorageError>;
}

/// Keeps the serialized JSON in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    json: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The JSON document as it would be written to durable storage
    pub fn raw(&self) -> Option<String> {
        self.json
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SaveStorage for MemoryStorage {
    async fn read(&self) -> Result<Option<StoredData>, StorageError> {
        match self.raw() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, data: &StoredData) -> Result<(), StorageError> {
        let json = serde_json::to_string(data)?;
        *self
            .json
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(json);
        Ok(())
    }
}

/// A single JSON file named after [`STORAGE_KEY`] in a directory
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    base_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.base_path.join(format!("{STORAGE_KEY}.json"))
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path(),
            source,
        }
    }
}

#[async_trait]
impl SaveStorage for JsonFileStorage {
    async fn read(&self) -> Result<Option<StoredData>, StorageError> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    async fn write(&self, data: &StoredData) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| self.io_error(e))?;
        let json = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(self.path(), json)
            .await
            .map_err(|e| self.io_error(e))
    }
}
