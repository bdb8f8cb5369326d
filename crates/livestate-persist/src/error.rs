#![forbid(unsafe_code)]

//! Persistence errors.

use std::fmt;

use livestate_core::ModelError;

/// Failure reported by a [`crate::Storage`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Writing `key` would take the backend past its size quota.
    QuotaExceeded { key: String, needed: usize, quota: usize },
    /// Any other backend failure (corruption, I/O, unavailable).
    Backend(String),
}

impl StorageError {
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotaExceeded { key, needed, quota } => write!(
                f,
                "writing '{key}' needs {needed} bytes, over the {quota} byte quota"
            ),
            Self::Backend(msg) => write!(f, "storage backend failed: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from saving or loading a model.
#[derive(Debug)]
pub enum PersistError {
    Storage(StorageError),
    Model(ModelError),
    Json(serde_json::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Json(e) => write!(f, "stored data is not valid JSON: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ModelError> for PersistError {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
