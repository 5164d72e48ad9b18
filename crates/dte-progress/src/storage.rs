// storage.rs — KeyValueStore trait and its backends.
//
// The KeyValueStore trait is the seam between the progress core and whatever
// durable storage the platform offers. Two backends ship with the crate:
//
// - MemoryStore: a map behind a mutex. Used by tests and as the
//   session-scoped store (it disappears with the process).
// - DirStore: one file per key in a directory. Every process that points at
//   the same directory shares the same state, the way browser tabs share one
//   origin's storage.
//
// Values are opaque strings; callers own their encoding.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StorageError;

/// Origin-scoped string key/value storage.
///
/// Methods take `&self`: backends are shared handles, and interior
/// mutability (or the file system) carries the writes.
pub trait KeyValueStore {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every key.
    fn clear(&self) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries()?.clear();
        Ok(())
    }
}

/// Directory backend: `<dir>/<key>` holds the value of `key`.
///
/// Writes go to a hidden temporary file first and are renamed into place, so
/// a reader in another process sees the old value or the new one, never a
/// partial write. Names starting with `.` are reserved for those temporaries
/// and are not valid keys.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Open a store in `dir`, creating the directory if it doesn't exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StorageError::IoError {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a file name inside the store directory is a key (as opposed to
    /// an in-flight temporary).
    pub fn is_key_file(name: &str) -> bool {
        validate_key(name).is_ok()
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        || key.len() > 200;
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl KeyValueStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::IoError { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, std::process::id()));
        fs::write(&tmp, value).map_err(|source| StorageError::IoError {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StorageError::IoError { path, source }
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::IoError { path, source }),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::IoError {
            path: self.dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| StorageError::IoError {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if Self::is_key_file(name) && entry.path().is_file() {
                self.remove(name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn memory_store_clear() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn shared_memory_store_through_arc() {
        let store = Arc::new(MemoryStore::new());
        let other = Arc::clone(&store);
        store.set("planProgress", "{}").unwrap();
        assert_eq!(other.get("planProgress").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn dir_store_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path().join("store")).unwrap();

        store.set("planProgress", r#"{"discover":"completed"}"#).unwrap();
        store.set("planProgress", r#"{"train":"completed"}"#).unwrap();
        assert_eq!(
            store.get("planProgress").unwrap().as_deref(),
            Some(r#"{"train":"completed"}"#)
        );
    }

    #[test]
    fn dir_store_is_shared_between_handles() {
        let dir = tempdir().unwrap();
        let a = DirStore::open(dir.path()).unwrap();
        let b = DirStore::open(dir.path()).unwrap();
        a.set("__unlock_train_seen", "1").unwrap();
        assert_eq!(b.get("__unlock_train_seen").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn dir_store_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(store.get("answers").unwrap(), None);
        store.remove("answers").unwrap();
    }

    #[test]
    fn dir_store_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.set(key, "x"),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn dir_store_clear_leaves_no_keys() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        store.set("kcTotal", "1").unwrap();
        store.set("planProgress", "{}").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get("kcTotal").unwrap(), None);
        assert_eq!(store.get("planProgress").unwrap(), None);
    }

    #[test]
    fn temporaries_are_not_key_files() {
        assert!(DirStore::is_key_file("planProgress"));
        assert!(!DirStore::is_key_file(".planProgress.42.tmp"));
    }
}
