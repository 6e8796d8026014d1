mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid key {0:?}: use letters, digits, '-', '_' or '.' and do not start with '.'")]
    InvalidKey(String),
    #[error("storage I/O failed for key {key:?}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize value for key {key:?}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
}

pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, raw: String) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "failed to read stored blob");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding malformed stored blob");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.write(key, raw)
    }
}

pub fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(value) = store.get(key) else {
        return T::default();
    };
    serde_json::from_value(value).unwrap_or_else(|err| {
        warn!(key, error = %err, "stored blob has unexpected shape; using defaults");
        T::default()
    })
}

pub fn save<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
{
    let value = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &value)
}

pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

pub(crate) fn event_channel() -> broadcast::Sender<StoreEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

pub(crate) fn notify(events: &broadcast::Sender<StoreEvent>, key: &str) {
    // No receivers is not an error: nobody is watching yet.
    let _ = events.send(StoreEvent {
        key: key.to_string(),
    });
}
