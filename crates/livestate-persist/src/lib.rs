#![forbid(unsafe_code)]

//! Key/value persistence for livestate models.
//!
//! [`WorkingStorage`] keeps a session-local copy of everything read or
//! written so a backend running out of space never loses a value mid-session;
//! [`Saveable`] binds a model to one storage key.

pub mod error;
pub mod saveable;
pub mod storage;

pub use error::{PersistError, StorageError};
pub use saveable::{FETCHED_AT, Saveable};
pub use storage::{MemoryStorage, Storage, WorkingStorage};
