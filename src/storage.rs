//! Key-value string storage for preferences and history.

use crate::error::{GenFrameError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage key for the theme choice.
pub const THEME_KEY: &str = "theme";
/// Storage key for the aspect-ratio choice.
pub const ASPECT_RATIO_KEY: &str = "aspectRatio";
/// Storage key for the style choice.
pub const STYLE_KEY: &str = "imageStyle";
/// Storage key for the serialized history list.
pub const HISTORY_KEY: &str = "imageHistory";

/// Simple string storage, read and written by key.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a value. Missing keys are fine.
    fn remove(&self, key: &str) -> Result<()>;
}

fn poisoned<T>(_: T) -> GenFrameError {
    GenFrameError::Storage("store lock poisoned".into())
}

/// Volatile store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// Store backed by one JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store; an
    /// unreadable one is reported.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                GenFrameError::Storage(format!("{} is not a valid store: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "opened store");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.flush(&next)?;
        *values = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(THEME_KEY).unwrap(), None);
        store.set(THEME_KEY, "light").unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("light"));
        store.remove(THEME_KEY).unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set(ASPECT_RATIO_KEY, "16:9").unwrap();
        store.set(STYLE_KEY, "Anime").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(ASPECT_RATIO_KEY).unwrap().as_deref(), Some("16:9"));
        assert_eq!(reopened.get(STYLE_KEY).unwrap().as_deref(), Some("Anime"));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[not an object").unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, GenFrameError::Storage(_)));
    }

    #[test]
    fn test_file_store_failed_write_keeps_old_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.set(THEME_KEY, "dark").unwrap();

        // A directory where the temp file goes makes every write fail.
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        assert!(store.set(THEME_KEY, "light").is_err());
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));

        assert!(store.remove(THEME_KEY).is_err());
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_file_store_remove_missing_key_skips_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.remove(HISTORY_KEY).unwrap();
        assert!(!path.exists());
    }
}
