#![forbid(unsafe_code)]

//! Key/value storage backends and the session working map.
//!
//! # Design
//!
//! [`Storage`] is the backend contract (a string-to-string map that may
//! refuse writes). [`WorkingStorage`] sits in front of a backend and keeps a
//! working map of everything read or written this session, which gives the
//! guarantee callers rely on:
//!
//! > after `set_item(k, v)`, `get_item(k)` returns `v` for the rest of the
//! > session, whatever the backend does.
//!
//! Values are not guaranteed to survive into the next session.
//!
//! # Failure Modes
//!
//! - **Quota exceeded**: the backend's contents are copied into the working
//!   map, the backend is emptied and the write retried once. If the retry
//!   fails too the value is too big; it stays in the working map only.
//! - **Other backend errors**: logged; the working map still answers reads.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;

/// A string key/value backend.
pub trait Storage {
    /// # Errors
    ///
    /// Backend-specific read failures.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// [`StorageError::QuotaExceeded`] when the value does not fit, or a
    /// backend failure.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Backend-specific failures. Removing a missing key is not an error.
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Backend-specific failures.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory backend with an optional byte quota over keys plus values.
///
/// Serializable, so a session's contents can be snapshotted and restored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    /// Bytes currently used (keys plus values).
    #[must_use]
    pub fn used(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let replaced = self.entries.get(key).map_or(0, |old| key.len() + old.len());
            let needed = self.used() - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    needed,
                    quota,
                });
            }
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

struct Inner<S> {
    backend: S,
    // `None` records a key known to be absent.
    working: BTreeMap<String, Option<String>>,
}

/// Session cache in front of a backend. Cloning shares the same session.
pub struct WorkingStorage<S> {
    inner: Rc<RefCell<Inner<S>>>,
}

impl<S> Clone for WorkingStorage<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for WorkingStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkingStorage")
            .field("working", &self.inner.borrow().working.len())
            .finish_non_exhaustive()
    }
}

impl<S: Storage> WorkingStorage<S> {
    pub fn new(backend: S) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                backend,
                working: BTreeMap::new(),
            })),
        }
    }

    /// Read through the working map, falling back to the backend once.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        if let Some(cached) = inner.working.get(key) {
            return cached.clone();
        }
        let value = match inner.backend.get_item(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "not reading from storage backend");
                None
            }
        };
        inner.working.insert(key.to_owned(), value.clone());
        value
    }

    /// Write `value`; it is readable for the rest of the session even if
    /// the backend refuses it.
    pub fn set_item(&self, key: &str, value: &str) {
        let mut inner = self.inner.borrow_mut();
        inner
            .working
            .insert(key.to_owned(), Some(value.to_owned()));
        match inner.backend.set_item(key, value) {
            Ok(()) => {}
            Err(err) if err.is_quota() => {
                inner.evict_backend();
                if let Err(err) = inner.backend.set_item(key, value) {
                    warn!(key, %err, "value too big for storage backend; kept for this session only");
                }
            }
            Err(err) => warn!(key, %err, "failed to write to storage backend"),
        }
    }

    /// Forget `key` in this session and in the backend.
    pub fn remove_item(&self, key: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.working.insert(key.to_owned(), None);
        if let Err(err) = inner.backend.remove_item(key) {
            warn!(key, %err, "failed to remove from storage backend");
        }
    }

    /// Run `f` against the backend.
    pub fn with_backend<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.borrow().backend)
    }
}

impl<S: Storage> Inner<S> {
    /// Move everything the backend holds into the working map and empty it.
    fn evict_backend(&mut self) {
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "cannot list storage backend for eviction");
                return;
            }
        };
        debug!(evicted = keys.len(), "storage quota hit; moving backend into working map");
        for key in keys {
            if !self.working.contains_key(&key) {
                let value = self.backend.get_item(&key).ok().flatten();
                self.working.insert(key.clone(), value);
            }
            if let Err(err) = self.backend.remove_item(&key) {
                warn!(key = %key, %err, "failed to evict from storage backend");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Backend that fails every call.
    struct Broken;

    impl Storage for Broken {
        fn get_item(&self, _: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Backend("corrupt".into()))
        }
        fn set_item(&mut self, _: &str, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("corrupt".into()))
        }
        fn remove_item(&mut self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Backend("corrupt".into()))
        }
        fn keys(&self) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Backend("corrupt".into()))
        }
    }

    #[test]
    fn memory_quota_counts_keys_and_values() {
        let mut storage = MemoryStorage::with_quota(10);
        storage.set_item("ab", "cdef").unwrap();
        assert_eq!(storage.used(), 6);
        // Replacing a value only counts the difference.
        storage.set_item("ab", "cdefghij").unwrap();
        let err = storage.set_item("x", "yz").unwrap_err();
        assert_eq!(
            err,
            StorageError::QuotaExceeded {
                key: "x".into(),
                needed: 13,
                quota: 10
            }
        );
    }

    #[test]
    fn set_then_get_within_session() {
        let storage = WorkingStorage::new(MemoryStorage::new());
        storage.set_item("a", "1");
        assert_eq!(storage.get_item("a").as_deref(), Some("1"));
        assert_eq!(storage.with_backend(|b| b.len()), 1);
    }

    #[test]
    fn reads_are_cached_from_backend() {
        let mut backend = MemoryStorage::new();
        backend.set_item("saved", "yes").unwrap();
        let storage = WorkingStorage::new(backend);
        assert_eq!(storage.get_item("saved").as_deref(), Some("yes"));
        assert_eq!(storage.get_item("missing"), None);
    }

    #[test]
    fn quota_evicts_backend_but_keeps_session_values() {
        let mut backend = MemoryStorage::with_quota(12);
        backend.set_item("old", "abcdef").unwrap();
        let storage = WorkingStorage::new(backend);
        storage.set_item("new", "ghijkl");
        assert_eq!(storage.get_item("old").as_deref(), Some("abcdef"));
        assert_eq!(storage.get_item("new").as_deref(), Some("ghijkl"));
        let backend_keys = storage.with_backend(|b| b.keys().unwrap());
        assert_eq!(backend_keys, vec!["new".to_string()]);
    }

    #[test]
    fn oversized_value_stays_in_session() {
        let storage = WorkingStorage::new(MemoryStorage::with_quota(4));
        storage.set_item("big", "far too large");
        assert_eq!(storage.get_item("big").as_deref(), Some("far too large"));
        assert!(storage.with_backend(MemoryStorage::is_empty));
    }

    #[test]
    fn broken_backend_degrades_to_session_only() {
        let storage = WorkingStorage::new(Broken);
        assert_eq!(storage.get_item("a"), None);
        storage.set_item("a", "1");
        assert_eq!(storage.get_item("a").as_deref(), Some("1"));
        storage.remove_item("a");
        assert_eq!(storage.get_item("a"), None);
    }

    #[test]
    fn snapshot_restores_contents() {
        let mut storage = MemoryStorage::with_quota(100);
        storage.set_item("k", "v").unwrap();
        let json = serde_json::to_string(&storage).unwrap();
        let restored: MemoryStorage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, storage);
    }
}
