use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use super::{KeyValueStore, StoreError, StoreEvent, event_channel, notify, validate_key};

#[derive(Debug)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            events: event_channel(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        let blobs = self.blobs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &str, raw: String) -> Result<(), StoreError> {
        validate_key(key)?;
        {
            let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
            blobs.insert(key.to_string(), raw);
        }
        notify(&self.events, key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
