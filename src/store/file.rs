use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::debug;

use super::{KeyValueStore, StoreError, StoreEvent, event_channel, notify, validate_key};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    events: broadcast::Sender<StoreEvent>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: String::new(),
            source,
        })?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self {
            root,
            events: event_channel(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn write(&self, key: &str, raw: String) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::write(&path, raw).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;
        notify(&self.events, key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
