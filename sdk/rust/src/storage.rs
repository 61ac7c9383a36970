//! Persistent key-value storage for the auth token.
//!
//! Mirrors the browser `localStorage` contract: synchronous string reads and
//! writes keyed by name.

use crate::error::{ErrorCode, ResultExt, SdkError, SdkResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::warn;

/// Synchronous key-value storage.
pub trait TokenStorage: Send + Sync {
    /// Returns the stored value, or `None` if the key is absent.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Stores a value under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> SdkResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> SdkResult<()>;
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-populated with one item.
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::new();
        if let Ok(mut items) = storage.items.write() {
            items.insert(key.into(), value.into());
        }
        storage
    }
}

impl TokenStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> SdkResult<()> {
        self.items
            .write()
            .map_err(|_| SdkError::storage("Storage lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> SdkResult<()> {
        self.items
            .write()
            .map_err(|_| SdkError::storage("Storage lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON object on disk.
///
/// The file is re-read on every lookup so writes made by other processes are
/// picked up. Writes go through a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> SdkResult<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(SdkError::storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SdkError::storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(SdkError::storage(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn store(&self, items: &Map<String, Value>) -> SdkResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_sdk_err(ErrorCode::StorageError)?;
        }
        let body = serde_json::to_vec_pretty(items).map_sdk_err(ErrorCode::SerializeError)?;

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_sdk_err(ErrorCode::StorageError)?;
        file.write_all(&body).map_sdk_err(ErrorCode::StorageError)?;
        file.sync_all().map_sdk_err(ErrorCode::StorageError)?;
        fs::rename(&tmp, &self.path).map_sdk_err(ErrorCode::StorageError)
    }
}

impl TokenStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(items) => items.get(key).and_then(|v| v.as_str()).map(str::to_string),
            Err(e) => {
                warn!("Token storage unreadable, treating as empty: {}", e);
                None
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) -> SdkResult<()> {
        let mut items = self.load()?;
        items.insert(key.to_string(), Value::String(value.to_string()));
        self.store(&items)
    }

    fn remove_item(&self, key: &str) -> SdkResult<()> {
        let mut items = self.load()?;
        if items.remove(key).is_some() {
            self.store(&items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("jwt"), None);

        storage.set_item("jwt", "abc").unwrap();
        assert_eq!(storage.get_item("jwt").as_deref(), Some("abc"));

        storage.remove_item("jwt").unwrap();
        storage.remove_item("jwt").unwrap();
        assert_eq!(storage.get_item("jwt"), None);
    }

    #[test]
    fn test_file_storage_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get_item("jwt"), None);
        storage.set_item("jwt", "abc").unwrap();
        storage.set_item("other", "x").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get_item("jwt").as_deref(), Some("abc"));

        reopened.remove_item("jwt").unwrap();
        assert_eq!(storage.get_item("jwt"), None);
        assert_eq!(storage.get_item("other").as_deref(), Some("x"));
    }

    #[test]
    fn test_file_storage_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "[1, 2]").unwrap();

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get_item("jwt"), None);
        assert_eq!(
            storage.set_item("jwt", "abc").unwrap_err().code,
            ErrorCode::StorageError
        );
    }
}
