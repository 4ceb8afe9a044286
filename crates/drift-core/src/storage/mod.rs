//! Device-resident persistence.
//!
//! The device exposes a string-keyed blob store (`KeyValueStore`); the
//! [`LocalStore`] layers the note collection, the guest identifier, and the
//! pending-sync list on top of it.

mod local_store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub use local_store::LocalStore;

use crate::error::{Error, Result};

/// String-keyed get/set/remove of single serialized blobs.
///
/// No partial-field access: each logical key holds one whole value.
/// Implementations must report write failures as [`Error::StorageWrite`] —
/// that error is the only signal that an optimistic mutation did not land.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed blob store: one file per key under a directory.
///
/// Writes go to a temp file first and are renamed into place, so a reader
/// never observes a torn blob.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.json.tmp"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let temp = self.temp_path(key);
        std::fs::write(&temp, value)
            .map_err(|error| storage_write_error(&temp, &error))?;
        let target = self.key_path(key);
        std::fs::rename(&temp, &target).map_err(|error| {
            let _ = std::fs::remove_file(&temp);
            storage_write_error(&target, &error)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(storage_write_error(&self.key_path(key), &error)),
        }
    }
}

fn storage_write_error(path: &Path, error: &std::io::Error) -> Error {
    Error::StorageWrite(format!("{}: {error}", path.display()))
}

/// In-memory blob store, primarily for tests.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().expect("kv poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("kv poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().expect("kv poisoned").remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn file_store_roundtrips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path().join("drift")).unwrap();

        assert_eq!(store.get("notes").unwrap(), None);
        store.set("notes", "[]").unwrap();
        assert_eq!(store.get("notes").unwrap().as_deref(), Some("[]"));

        store.set("notes", "[1]").unwrap();
        assert_eq!(store.get("notes").unwrap().as_deref(), Some("[1]"));

        store.remove("notes").unwrap();
        assert_eq!(store.get("notes").unwrap(), None);
        store.remove("notes").unwrap();
    }

    #[test]
    fn file_store_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();
        store.set("guest_id", "guest_1_abc").unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["guest_id.json".to_string()]);
    }

    #[test]
    fn memory_store_roundtrips() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
