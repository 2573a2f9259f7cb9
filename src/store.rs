//! Durable credential storage
//!
//! The authorization flow persists two JSON records per deployment: the
//! dynamic client registration and the current token set. This module
//! provides the [`CredentialStore`] trait over that storage plus two
//! implementations:
//!
//! - [`FileStore`] -- one `<key>.json` file per record in a local state
//!   directory, created lazily on first write.
//! - [`MemoryStore`] -- a `HashMap` behind a mutex, used by tests and
//!   ephemeral runs.
//!
//! A record that is absent *or fails to parse* reads back as `None`; the
//! next `set` for the same key overwrites it, so a corrupted file self-heals
//! without operator intervention. No locking is performed -- the store
//! assumes a single active process per machine.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::Result;

/// Abstraction over named-JSON-record storage.
///
/// Keys are flat strings; each key maps to exactly one JSON document that is
/// replaced wholesale on every `set`. Implementations must treat unreadable
/// or unparseable records as absent rather than as errors.
///
/// The store is always passed into consumers explicitly (as
/// `Arc<dyn CredentialStore>`), never reached through a global, so tests can
/// substitute a [`MemoryStore`].
pub trait CredentialStore: Send + Sync {
    /// Returns the record stored under `key`, or `None` when the record is
    /// absent or cannot be parsed as JSON.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Replaces the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McplinkError::Io`] if the record cannot be
    /// written to durable storage.
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Removes the record stored under `key`.
    ///
    /// Returns `true` when a record existed and was removed, `false` when no
    /// record was present.
    fn delete(&self, key: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// File-backed [`CredentialStore`] keeping one pretty-printed JSON file per
/// key inside a state directory.
///
/// The directory is created on the first `set`; `get` and `delete` on a
/// missing directory simply report absence.
///
/// # Examples
///
/// ```no_run
/// use mcplink::store::{CredentialStore, FileStore};
///
/// let store = FileStore::new("/tmp/mcplink-state".into());
/// store.set("tokens", &serde_json::json!({"access_token": "abc"})).unwrap();
/// assert!(store.get("tokens").is_some());
/// assert!(store.delete("tokens").unwrap());
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. No filesystem access happens until
    /// the first operation.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the file backing `key`.
    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.record_path(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                // Unparseable records read as absent; the next set repairs them.
                tracing::warn!("discarding corrupt record {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let body = serde_json::to_string_pretty(value)?;
        std::fs::write(self.record_path(key), body)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.record_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`CredentialStore`] used by tests and ephemeral runs.
///
/// # Examples
///
/// ```
/// use mcplink::store::{CredentialStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// assert!(store.get("missing").is_none());
/// store.set("k", &serde_json::json!(1)).unwrap();
/// assert_eq!(store.get("k"), Some(serde_json::json!(1)));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .remove(key)
            .is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // MemoryStore
    // -----------------------------------------------------------------------

    #[test]
    fn test_memory_store_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_memory_store_set_then_get() {
        let store = MemoryStore::new();
        store
            .set("client", &serde_json::json!({"client_id": "abc"}))
            .expect("set");
        assert_eq!(
            store.get("client"),
            Some(serde_json::json!({"client_id": "abc"}))
        );
    }

    #[test]
    fn test_memory_store_set_replaces_wholesale() {
        let store = MemoryStore::new();
        store.set("k", &serde_json::json!({"a": 1, "b": 2})).unwrap();
        store.set("k", &serde_json::json!({"a": 3})).unwrap();
        assert_eq!(store.get("k"), Some(serde_json::json!({"a": 3})));
    }

    #[test]
    fn test_memory_store_delete_reports_presence() {
        let store = MemoryStore::new();
        store.set("k", &serde_json::json!(true)).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert!(store.get("k").is_none());
    }

    // -----------------------------------------------------------------------
    // FileStore
    // -----------------------------------------------------------------------

    #[test]
    fn test_file_store_get_missing_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("state"));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        let value = serde_json::json!({"access_token": "tok", "expires_at": null});
        store.set("tokens", &value).expect("set");
        assert_eq!(store.get("tokens"), Some(value));
    }

    #[test]
    fn test_file_store_creates_directory_lazily() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("nested").join("state");
        let store = FileStore::new(state.clone());
        assert!(!state.exists(), "directory must not exist before first set");
        store.set("k", &serde_json::json!(1)).expect("set");
        assert!(state.exists(), "set must create the directory");
    }

    #[test]
    fn test_file_store_corrupt_record_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        store.set("tokens", &serde_json::json!({"a": 1})).unwrap();
        std::fs::write(dir.path().join("tokens.json"), "{not json").unwrap();
        assert!(
            store.get("tokens").is_none(),
            "corrupt record must read as absent"
        );
    }

    #[test]
    fn test_file_store_corrupt_record_self_heals_on_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("tokens.json"), "garbage").unwrap();
        assert!(store.get("tokens").is_none());
        store.set("tokens", &serde_json::json!({"a": 2})).unwrap();
        assert_eq!(store.get("tokens"), Some(serde_json::json!({"a": 2})));
    }

    #[test]
    fn test_file_store_delete_missing_returns_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        assert!(!store.delete("absent").unwrap());
    }

    #[test]
    fn test_file_store_delete_removes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        store.set("k", &serde_json::json!("v")).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!dir.path().join("k.json").exists());
    }

    #[test]
    fn test_keys_map_to_independent_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf());
        store.set("client", &serde_json::json!({"id": 1})).unwrap();
        store.set("tokens", &serde_json::json!({"id": 2})).unwrap();
        assert!(store.delete("client").unwrap());
        assert_eq!(store.get("tokens"), Some(serde_json::json!({"id": 2})));
    }
}
