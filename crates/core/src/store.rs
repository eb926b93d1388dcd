//! Key-value persistence port and its two backends.
//!
//! The engine only needs last-write-wins `get`/`set` over opaque string keys.
//! Reads never fail: a missing or unreadable value is reported as absent and
//! callers fall back to their defaults.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Every preset, as a JSON array.
pub const KEY_PRESETS: &str = "sheetguard.presets";
/// Id of the active preset.
pub const KEY_ACTIVE_PRESET: &str = "sheetguard.active_preset";
/// Per-rule enabled and intercept overrides.
pub const KEY_RULE_OVERRIDES: &str = "sheetguard.rule_overrides";
/// Last confirmed table set with its context tag.
pub const KEY_SNAPSHOT: &str = "sheetguard.snapshot";
/// Most recently delivered live table set.
pub const KEY_LIVE: &str = "sheetguard.live";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store capacity exceeded while writing '{key}'")]
    CapacityExceeded { key: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Opaque string-keyed persistence substrate.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Read and deserialize `key`, falling back to `T::default()` when the value
/// is absent or does not parse.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &str) -> T {
    load(store, key).unwrap_or_default()
}

/// Read and deserialize `key`. Parse failures are logged and reported as
/// absent.
pub fn load<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!(key, error = %err, "Discarding unreadable persisted value");
            None
        }
    }
}

/// Serialize `value` and write it under `key`.
pub fn save<T: Serialize>(store: &mut dyn KvStore, key: &str, value: &T) -> Result<(), StoreError> {
    store.set(key, serde_json::to_value(value)?)
}

/// Write `value`, and on a capacity failure discard the snapshot and retry
/// exactly once.
pub fn save_with_eviction<T: Serialize>(
    store: &mut dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_value(value)?;
    match store.set(key, json.clone()) {
        Err(StoreError::CapacityExceeded { .. }) => {
            tracing::warn!(key, "Store full, evicting snapshot and retrying once");
            store.remove(KEY_SNAPSHOT)?;
            store.set(key, json)
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Volatile store, optionally bounded by the total size of serialized values.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
    capacity_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once serialized values exceed `bytes`.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity_bytes: Some(bytes),
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.to_string().len())
            .sum()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        if let Some(capacity) = self.capacity_bytes {
            if self.used_bytes_without(key) + value.to_string().len() > capacity {
                return Err(StoreError::CapacityExceeded {
                    key: key.to_string(),
                });
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// One pretty-printed JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read store file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Store file is not valid JSON");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let classify = |err: io::Error| match err.raw_os_error() {
            // ENOSPC / EDQUOT
            Some(28) | Some(122) => StoreError::CapacityExceeded {
                key: key.to_string(),
            },
            _ => StoreError::Io(err),
        };
        fs::write(&tmp, serde_json::to_string_pretty(&value)?).map_err(classify)?;
        fs::rename(&tmp, &path).map_err(classify)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn load_or_default_falls_back_on_garbage() {
        let mut store = MemoryStore::new();
        store.set("k", json!("not a list")).unwrap();
        let parsed: Vec<String> = load_or_default(&store, "k");
        assert!(parsed.is_empty());
        let missing: Vec<String> = load_or_default(&store, "absent");
        assert!(missing.is_empty());
    }

    #[test]
    fn memory_store_enforces_capacity() {
        let mut store = MemoryStore::with_capacity(10);
        store.set("a", json!("12345")).unwrap();
        let err = store.set("b", json!("123456789")).unwrap_err();
        assert_matches!(err, StoreError::CapacityExceeded { key } if key == "b");
        // Overwriting a key does not count its old value.
        store.set("a", json!("1234567")).unwrap();
    }

    #[test]
    fn eviction_drops_snapshot_and_retries_once() {
        let mut store = MemoryStore::with_capacity(40);
        store.set(KEY_SNAPSHOT, json!("x".repeat(30))).unwrap();
        save_with_eviction(&mut store, KEY_LIVE, &"y".repeat(20)).unwrap();
        assert!(store.get(KEY_SNAPSHOT).is_none());
        assert!(store.get(KEY_LIVE).is_some());

        let err = save_with_eviction(&mut store, KEY_PRESETS, &"z".repeat(50)).unwrap_err();
        assert_matches!(err, StoreError::CapacityExceeded { .. });
    }

    #[test]
    fn file_store_round_trips_and_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set("a/b c", json!({"v": 1})).unwrap();
        assert_eq!(store.get("a/b c"), Some(json!({"v": 1})));
        assert!(dir.path().join("a_b_c.json").exists());

        store.remove("a/b c").unwrap();
        assert!(store.get("a/b c").is_none());
        store.remove("a/b c").unwrap();
    }

    #[test]
    fn file_store_treats_corrupt_file_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get("broken").is_none());
    }
}
