#![forbid(unsafe_code)]

//! Saving a model's fields under one storage key.
//!
//! The stored form is the JSON text of [`Model::unbuild`]. Loading goes
//! through [`Model::refill_json`], so nested models are reconciled rather
//! than replaced.

use livestate_core::{Model, underscore};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::PersistError;
use crate::storage::{Storage, WorkingStorage};

/// Field compared by [`Saveable::merge_newest`].
pub const FETCHED_AT: &str = "fetched_at";

/// A model bound to a storage key.
pub struct Saveable<S> {
    model: Model,
    key: String,
    storage: WorkingStorage<S>,
}

impl<S> std::fmt::Debug for Saveable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saveable")
            .field("model", &self.model)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<S: Storage + 'static> Saveable<S> {
    pub fn new(model: Model, key: impl Into<String>, storage: WorkingStorage<S>) -> Self {
        Self {
            model,
            key: key.into(),
            storage,
        }
    }

    /// Key derived from the class name: `UserProfile` → `user_profile`.
    pub fn for_class(model: Model, storage: WorkingStorage<S>) -> Self {
        let key = underscore(model.class().name());
        Self::new(model, key, storage)
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the model's current fields.
    ///
    /// # Errors
    ///
    /// [`PersistError::Model`] if the fields cannot be exported (cycles).
    pub fn save(&self) -> Result<(), PersistError> {
        let text = serde_json::to_string(&self.model.unbuild()?)?;
        debug!(key = %self.key, bytes = text.len(), "save");
        self.storage.set_item(&self.key, &text);
        Ok(())
    }

    /// The stored document, if any.
    ///
    /// # Errors
    ///
    /// [`PersistError::Json`] if the stored text does not parse.
    pub fn fetch(&self) -> Result<Option<Json>, PersistError> {
        match self.storage.get_item(&self.key) {
            Some(text) if !text.is_empty() => Ok(Some(serde_json::from_str(&text)?)),
            _ => Ok(None),
        }
    }

    /// Refill from storage, or from `defaults` (then saved) if nothing is
    /// stored yet.
    ///
    /// # Errors
    ///
    /// Fetch errors and refill errors.
    pub fn load_with_defaults(&self, defaults: &Json) -> Result<(), PersistError> {
        match self.fetch()? {
            Some(saved) => self.model.refill_json(&saved)?,
            None => {
                self.model.refill_json(defaults)?;
                self.save()?;
            }
        }
        Ok(())
    }

    /// Take `incoming` (and save it) only if its `fetched_at` is newer than
    /// the stored one; otherwise refill from what is stored.
    ///
    /// # Errors
    ///
    /// Fetch errors and refill errors.
    pub fn merge_newest(&self, incoming: &Json) -> Result<(), PersistError> {
        let saved = self.fetch()?;
        let saved_at = saved
            .as_ref()
            .and_then(|s| s.get(FETCHED_AT))
            .and_then(Json::as_f64)
            .filter(|t| *t != 0.0);
        let incoming_at = incoming.get(FETCHED_AT).and_then(Json::as_f64);
        let take_incoming = match (&saved, saved_at) {
            (None, _) | (Some(_), None) => true,
            (Some(_), Some(saved_at)) => incoming_at.is_some_and(|at| saved_at < at),
        };
        match saved {
            Some(saved) if !take_incoming => self.model.refill_json(&saved)?,
            _ => {
                self.model.refill_json(incoming)?;
                self.save()?;
            }
        }
        Ok(())
    }

    /// Drop the stored document.
    pub fn clear_storage(&self) {
        self.storage.remove_item(&self.key);
    }

    /// Save after every aggregate change of the model. Failures are logged.
    pub fn autosave(&self) {
        let storage = self.storage.clone();
        let key = self.key.clone();
        self.model.on_change(move |model, _| {
            match model.unbuild().map_err(PersistError::from).and_then(|json| {
                serde_json::to_string(&json).map_err(PersistError::from)
            }) {
                Ok(text) => storage.set_item(&key, &text),
                Err(err) => warn!(key = %key, %err, "autosave failed"),
            }
        });
    }
}
