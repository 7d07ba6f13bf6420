//! Save states, page history and save slots
//!
//! A [`SaveState`] is a value copy of the game state taken at a page
//! boundary or on demand. The [`History`] keeps the most recent pages with
//! their snapshots; [`SaveSlots`] persists chosen snapshots through a
//! [`SaveStorage`] backend on every change.

mod export;
mod history;
mod slots;
mod storage;

pub use export::{SAVE_FILE_EXTENSION, SaveFile, export_save_file, import_save_file, save_file_name};
pub use history::{History, Page, PageContent};
pub use slots::{QUICK_SAVE_SLOT, SaveSlots, SlotId};
pub use storage::{JsonFileStorage, MemoryStorage, STORAGE_KEY, SaveStorage, StoredData};

use crate::types::{Context, GameState, Progress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid save data: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Save file must be a JSON object")]
    NotAnObject,
}

/// An immutable snapshot of the game state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub context: Context,
    pub progress: Progress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl SaveState {
    /// Deep-copy the current state, stamped with the current time
    pub fn capture(state: &GameState) -> Self {
        Self {
            context: state.context(),
            progress: state.progress(),
            text: None,
            date: Some(Utc::now()),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Serialize to pretty JSON bytes
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json.into_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let json = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(json)?)
    }

    /// Identity of the captured position, ignoring text and date
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "context": self.context,
            "progress": self.progress,
        });
        format!("{:x}", md5::compute(canonical.to_string().as_bytes()))
    }
}
