use super::{SaveState, SaveStorage, StorageError, StoredData, export};
use crate::types::Settings;

pub type SlotId = u32;

/// Slot used by quick-save and quick-load
pub const QUICK_SAVE_SLOT: SlotId = 0;

/// Named save slots plus settings, written through to storage on every
/// change
#[derive(Debug)]
pub struct SaveSlots<S> {
    storage: S,
    data: StoredData,
}

impl<S: SaveStorage> SaveSlots<S> {
    /// Load whatever the storage holds
    pub async fn open(storage: S) -> Result<Self, StorageError> {
        let data = storage.read().await?.unwrap_or_default();
        log::debug!(
            target: "shiori::storage",
            "Opened save storage with {} slot(s)",
            data.save_states.len()
        );
        Ok(Self { storage, data })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn store(&mut self, id: SlotId, save_state: SaveState) -> Result<(), StorageError> {
        let mut next = self.data.clone();
        next.save_states.insert(id, save_state);
        self.commit(next).await
    }

    /// Returns whether the slot existed
    pub async fn delete(&mut self, id: SlotId) -> Result<bool, StorageError> {
        if !self.data.save_states.contains_key(&id) {
            return Ok(false);
        }
        let mut next = self.data.clone();
        next.save_states.remove(&id);
        self.commit(next).await?;
        Ok(true)
    }

    pub fn get(&self, id: SlotId) -> Option<&SaveState> {
        self.data.save_states.get(&id)
    }

    /// All slots in id order
    pub fn list(&self) -> impl Iterator<Item = (SlotId, &SaveState)> {
        self.data.save_states.iter().map(|(id, ss)| (*id, ss))
    }

    pub fn len(&self) -> usize {
        self.data.save_states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.save_states.is_empty()
    }

    /// The most recently dated save
    pub fn last_save(&self) -> Option<(SlotId, &SaveState)> {
        self.list()
            .filter(|(_, ss)| ss.date.is_some())
            .max_by_key(|(_, ss)| ss.date)
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    pub async fn set_settings(&mut self, settings: Settings) -> Result<(), StorageError> {
        if self.data.settings == settings {
            return Ok(());
        }
        let next = StoredData {
            settings,
            save_states: self.data.save_states.clone(),
        };
        self.commit(next).await
    }

    /// Export settings (if `with_settings`) and the slots picked by `filter`
    pub fn export(
        &self,
        with_settings: bool,
        filter: Option<&[SlotId]>,
    ) -> Result<String, StorageError> {
        let settings = with_settings.then_some(&self.data.settings);
        export::export_save_file(settings, &self.data.save_states, filter)
    }

    /// Merge an exported document: settings replace the current ones,
    /// imported slots overwrite slots with the same id.
    pub async fn import(&mut self, json: &str) -> Result<(), StorageError> {
        let file = export::import_save_file(json)?;
        let mut next = self.data.clone();
        if let Some(settings) = file.settings {
            next.settings = settings;
        }
        if let Some(save_states) = file.save_states {
            next.save_states.extend(save_states);
        }
        self.commit(next).await
    }

    /// Write `next` and adopt it only once the write succeeded
    async fn commit(&mut self, next: StoredData) -> Result<(), StorageError> {
        self.storage.write(&next).await?;
        self.data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EventLoop;
    use crate::save::MemoryStorage;
    use crate::types::{GameState, TextSpeed};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// Reads nothing, refuses every write
    struct ReadOnlyStorage;

    #[async_trait]
    impl SaveStorage for ReadOnlyStorage {
        async fn read(&self) -> Result<Option<StoredData>, StorageError> {
            Ok(None)
        }

        async fn write(&self, _: &StoredData) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "readonly".into(),
                source: std::io::Error::other("read-only storage"),
            })
        }
    }

    fn save_at(index: usize, minutes_ago: i64) -> SaveState {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        state.index.set(index);
        SaveState {
            date: Some(Utc::now() - Duration::minutes(minutes_ago)),
            ..SaveState::capture(&state)
        }
    }

    #[tokio::test]
    async fn every_change_is_written_through() {
        let mut slots = SaveSlots::open(MemoryStorage::new()).await.unwrap();
        slots.store(1, save_at(10, 0)).await.unwrap();
        assert!(slots.storage().raw().unwrap().contains("\"1\""));

        assert!(slots.delete(1).await.unwrap());
        assert!(!slots.delete(1).await.unwrap());
        let stored = slots.storage().read().await.unwrap().unwrap();
        assert!(stored.save_states.is_empty());
    }

    #[tokio::test]
    async fn reopening_restores_slots_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let storage = crate::save::JsonFileStorage::new(dir.path());
        let mut slots = SaveSlots::open(storage.clone()).await.unwrap();
        slots.store(2, save_at(5, 0)).await.unwrap();
        slots
            .set_settings(Settings {
                text_speed: TextSpeed::Slow,
                ..Settings::default()
            })
            .await
            .unwrap();

        let reopened = SaveSlots::open(storage).await.unwrap();
        assert_eq!(reopened.get(2), slots.get(2));
        assert_eq!(reopened.settings().text_speed, TextSpeed::Slow);
    }

    #[tokio::test]
    async fn last_save_is_most_recent_by_date() {
        let mut slots = SaveSlots::open(MemoryStorage::new()).await.unwrap();
        slots.store(1, save_at(1, 30)).await.unwrap();
        slots.store(2, save_at(2, 5)).await.unwrap();
        slots.store(3, save_at(3, 60)).await.unwrap();
        assert_eq!(slots.last_save().map(|(id, _)| id), Some(2));
        assert_eq!(slots.list().map(|(id, _)| id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn import_merges_into_existing_slots() {
        let mut source = SaveSlots::open(MemoryStorage::new()).await.unwrap();
        source.store(4, save_at(4, 0)).await.unwrap();
        let exported = source.export(false, None).unwrap();

        let mut target = SaveSlots::open(MemoryStorage::new()).await.unwrap();
        target.store(1, save_at(1, 0)).await.unwrap();
        target.import(&exported).await.unwrap();
        assert_eq!(target.len(), 2);
        assert_eq!(target.get(4), source.get(4));
    }

    #[tokio::test]
    async fn failed_writes_leave_slots_unchanged() {
        let mut slots = SaveSlots::open(ReadOnlyStorage).await.unwrap();
        assert!(slots.store(1, save_at(1, 0)).await.is_err());
        assert!(slots.get(1).is_none());
        assert!(slots.last_save().is_none());

        let slow = Settings {
            text_speed: TextSpeed::Slow,
            ..Settings::default()
        };
        assert!(slots.set_settings(slow).await.is_err());
        assert_eq!(slots.settings(), &Settings::default());

        let mut source = SaveSlots::open(MemoryStorage::new()).await.unwrap();
        source.store(4, save_at(4, 0)).await.unwrap();
        let exported = source.export(true, None).unwrap();
        assert!(slots.import(&exported).await.is_err());
        assert!(slots.is_empty());
        let exported = slots.export(false, None).unwrap();
        assert!(exported.contains("{}"));
    }
}
