#![forbid(unsafe_code)]

//! Deep cloning of value graphs.
//!
//! # Design
//!
//! [`CloneCache`] maps each original reference (record or model) to its
//! copy. A copy is registered *before* its contents are cloned, so a graph
//! that refers back to an ancestor gets the ancestor's copy instead of
//! recursing forever. The cache can be shared across several
//! [`Model::deep_clone_with`] calls to keep references between roots aligned.
//!
//! # Invariants
//!
//! 1. Clone and original share no mutable state.
//! 2. Shared sub-objects stay shared (once) in the copy.
//! 3. A model's copy is of the same class and has no handlers; the class
//!    init hook runs on it as on any new instance.
//!
//! # Failure Modes
//!
//! - **Class not cloneable** (root only): [`ModelError::NotCloneable`].
//!   Nested models of such classes are copied as plain records.

use tracing::debug;

use crate::error::ModelError;
use crate::model::Model;
use crate::value::{Record, RefKey, Value};

/// Original-to-copy table for one cloning pass.
#[derive(Debug, Default)]
pub struct CloneCache {
    entries: Vec<(RefKey, Value)>,
}

impl CloneCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The copy already made for `original`, if any.
    #[must_use]
    pub fn get(&self, original: &Value) -> Option<Value> {
        let key = original.ref_key()?;
        self.lookup(key)
    }

    fn lookup(&self, key: RefKey) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, copy)| copy.clone())
    }

    fn insert(&mut self, key: RefKey, copy: Value) {
        self.entries.push((key, copy));
    }
}

impl Model {
    /// Independent copy of this model and everything it refers to.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotCloneable`] unless the class opted in with
    /// `ModelClassBuilder::cloneable`.
    pub fn deep_clone(&self) -> Result<Model, ModelError> {
        let mut cache = CloneCache::new();
        let copy = self.deep_clone_with(&mut cache)?;
        debug!(class = self.class().name(), copied = cache.len(), "deep clone");
        Ok(copy)
    }

    /// [`deep_clone`](Self::deep_clone) reusing copies recorded in `cache`.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotCloneable`] unless the class opted in.
    pub fn deep_clone_with(&self, cache: &mut CloneCache) -> Result<Model, ModelError> {
        if !self.class().is_cloneable() {
            return Err(ModelError::NotCloneable {
                class: self.class().name().to_owned(),
            });
        }
        if let Some(Value::Model(copy)) = cache.lookup(self.ref_key()) {
            return Ok(copy);
        }
        let copy = self.class().instantiate();
        cache.insert(self.ref_key(), Value::Model(copy.clone()));
        let attributes: Vec<(String, Value)> = self
            .attributes()
            .into_iter()
            .map(|(name, value)| (name, clone_value(&value, cache)))
            .collect();
        let extras: Vec<(String, Value)> = self
            .extras()
            .into_iter()
            .map(|(name, value)| (name, clone_value(&value, cache)))
            .collect();
        copy.set_attributes(attributes.into_iter().chain(extras));
        Ok(copy)
    }
}

/// Deep copy of `value`, recording reference copies in `cache`.
pub fn clone_value(value: &Value, cache: &mut CloneCache) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::List(items) => Value::List(items.iter().map(|v| clone_value(v, cache)).collect()),
        Value::Record(record) => {
            let key = record.ref_key();
            if let Some(copy) = cache.lookup(key) {
                return copy;
            }
            let copy = Record::new();
            cache.insert(key, Value::Record(copy.clone()));
            for (name, v) in record.entries() {
                copy.insert(name, clone_value(&v, cache));
            }
            Value::Record(copy)
        }
        Value::Model(model) => {
            let key = model.ref_key();
            if let Some(copy) = cache.lookup(key) {
                return copy;
            }
            if model.class().is_cloneable() {
                model
                    .deep_clone_with(cache)
                    .map_or(Value::Null, Value::Model)
            } else {
                let copy = Record::new();
                cache.insert(key, Value::Record(copy.clone()));
                for (name, v) in model.attributes() {
                    copy.insert(name, clone_value(&v, cache));
                }
                Value::Record(copy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelClass;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn person() -> ModelClass {
        ModelClass::builder("person")
            .fields(["name", "friends", "best_friend"])
            .cloneable()
            .build()
    }

    #[test]
    fn clone_is_independent() {
        let original = person().build([("name", "Ann")]);
        let copy = original.deep_clone().unwrap();
        assert!(!copy.ptr_eq(&original));
        copy.set("name", "Bob").unwrap();
        assert_eq!(original.get("name").and_then(|v| v.as_str().map(String::from)), Some("Ann".into()));
    }

    #[test]
    fn clone_does_not_copy_handlers() {
        let original = person().instantiate();
        original.on_change(|_, _| {});
        let copy = original.deep_clone().unwrap();
        assert!(!copy.has_handlers("change"));
    }

    #[test]
    fn nested_records_and_lists_are_copied() {
        let record = Record::from_entries([("age", Value::from(3))]);
        let original = person().build([(
            "friends",
            Value::List(vec![Value::Record(record.clone())]),
        )]);
        let copy = original.deep_clone().unwrap();
        let copied = copy.get("friends").unwrap();
        let inner = copied.as_list().unwrap()[0].as_record().unwrap().clone();
        assert!(!inner.ptr_eq(&record));
        inner.insert("age", 4);
        assert_eq!(record.get("age").and_then(|v| v.as_i64()), Some(3));
    }

    #[test]
    fn self_reference_maps_to_the_copy() {
        let original = person().instantiate();
        original.set("best_friend", original.clone()).unwrap();
        let copy = original.deep_clone().unwrap();
        let best = copy.get("best_friend").unwrap();
        assert!(best.as_model().is_some_and(|m| m.ptr_eq(&copy)));
        original.set("best_friend", Value::Null).unwrap();
        copy.set("best_friend", Value::Null).unwrap();
    }

    #[test]
    fn shared_subobjects_stay_shared() {
        let shared = Record::from_entries([("x", Value::from(1))]);
        let original = person().build([
            ("friends", Value::Record(shared.clone())),
            ("best_friend", Value::Record(shared)),
        ]);
        let copy = original.deep_clone().unwrap();
        let a = copy.get("friends").unwrap();
        let b = copy.get("best_friend").unwrap();
        assert!(a.as_record().unwrap().ptr_eq(b.as_record().unwrap()));
    }

    #[test]
    fn shared_cache_aligns_separate_roots() {
        let class = person();
        let ann = class.build([("name", "Ann")]);
        let bob = class.build([("best_friend", Value::from(ann.clone()))]);
        let mut cache = CloneCache::new();
        let ann_copy = ann.deep_clone_with(&mut cache).unwrap();
        let bob_copy = bob.deep_clone_with(&mut cache).unwrap();
        let friend = bob_copy.get("best_friend").unwrap();
        assert!(friend.as_model().is_some_and(|m| m.ptr_eq(&ann_copy)));
    }

    #[test]
    fn non_cloneable_root_is_rejected() {
        let m = ModelClass::from_attributes("plain", ["a"]).instantiate();
        assert_eq!(
            m.deep_clone().unwrap_err(),
            ModelError::NotCloneable {
                class: "plain".into()
            }
        );
    }

    #[test]
    fn non_cloneable_child_becomes_a_record() {
        let child = ModelClass::from_attributes("plain", ["a"]).build([("a", 1)]);
        let original = person().build([("best_friend", Value::from(child))]);
        let copy = original.deep_clone().unwrap();
        let best = copy.get("best_friend").unwrap();
        assert_eq!(best.to_json().unwrap(), json!({"a": 1}));
        assert!(best.as_record().is_some());
    }

    #[test]
    fn clone_value_keeps_scalars() {
        let mut cache = CloneCache::new();
        let v = clone_value(&Value::from("hi"), &mut cache);
        assert!(v.strict_eq(&Value::from("hi")));
        assert!(cache.is_empty());
    }
}
