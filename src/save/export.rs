//! Save-file export and import
//!
//! A save file bundles optional settings and optional save states into one
//! JSON document for the player to download or upload.

use super::{SaveState, SlotId, StorageError};
use crate::types::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extension given to exported save files
pub const SAVE_FILE_EXTENSION: &str = "shiori-save";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_states: Option<BTreeMap<SlotId, SaveState>>,
}

/// Build the export document.
///
/// `filter` selects slots: `None` exports all of them, `Some(&[])` leaves
/// save states out entirely.
pub fn export_save_file(
    settings: Option<&Settings>,
    save_states: &BTreeMap<SlotId, SaveState>,
    filter: Option<&[SlotId]>,
) -> Result<String, StorageError> {
    let save_states = match filter {
        None => Some(save_states.clone()),
        Some([]) => None,
        Some(ids) => Some(
            save_states
                .iter()
                .filter(|(id, _)| ids.contains(*id))
                .map(|(id, ss)| (*id, ss.clone()))
                .collect(),
        ),
    };
    let file = SaveFile {
        settings: settings.cloned(),
        save_states,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse an uploaded save file. Anything but a JSON object is rejected.
pub fn import_save_file(json: &str) -> Result<SaveFile, StorageError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(StorageError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

/// `<stem>.shiori-save`
pub fn save_file_name(stem: &str) -> String {
    format!("{stem}.{SAVE_FILE_EXTENSION}")
}
