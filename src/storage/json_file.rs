//! Key-value store persisted as a single JSON object file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KeyValueStore;
use crate::error::FeedError;

/// [`KeyValueStore`] persisted to one JSON object file.
///
/// The file is read on every `get` and rewritten on every `set`/`clear`.
/// A single-user, single-process writer is assumed; the mutex only orders
/// writes issued from this process.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, FeedError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(FeedError::Storage(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            FeedError::Storage(format!("parsing {}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), FeedError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                FeedError::Storage(format!("creating {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| FeedError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| FeedError::Storage(format!("writing {}: {e}", self.path.display())))
    }

    fn modify<F>(&self, change: F) -> Result<(), FeedError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| FeedError::Storage("state file lock poisoned".to_string()))?;
        let mut values = self.read_all()?;
        change(&mut values);
        self.write_all(&values)?;
        tracing::debug!(path = %self.path.display(), "client state saved");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, FeedError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FeedError> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn clear(&self, key: &str) -> Result<(), FeedError> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("market-feed-{}", uuid::Uuid::new_v4()))
            .join("state.json")
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let store = JsonFileStore::new(temp_path());
        assert_eq!(store.get("anything").ok().flatten(), None);
    }

    #[test]
    fn values_survive_a_new_store_instance() {
        let path = temp_path();
        let store = JsonFileStore::new(&path);
        assert!(store.set("recent_searches", "[\"cosmic\"]").is_ok());
        assert!(store.set("theme", "dark").is_ok());

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.get("recent_searches").ok().flatten().as_deref(),
            Some("[\"cosmic\"]")
        );
        assert!(reopened.clear("theme").is_ok());
        assert_eq!(store.get("theme").ok().flatten(), None);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let path = temp_path();
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let _ = std::fs::write(&path, "not json");
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("k"), Err(FeedError::Storage(_))));
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
