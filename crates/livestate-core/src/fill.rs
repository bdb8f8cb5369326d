#![forbid(unsafe_code)]

//! Reconciling incoming documents into a live model graph.
//!
//! # Design
//!
//! A class picks one [`Refill`] strategy:
//!
//! - `Attributes`: bulk-assign the document's keys.
//! - `Custom`: a user routine.
//! - `Spec`: a [`FillSpec`] saying, per key, whether the value is a plain
//!   scalar, one nested model, or a list of nested models.
//!
//! With a spec, nested models already present are refilled in place so
//! outside references stay valid, and lists are merged by identity:
//!
//! ```text
//! previous  [A, B]        incoming  [{B..}, {A..}]   →  [B, A] (same objects)
//! previous  [A, B]        incoming  [{C..}]          →  [C]    (A, B dropped)
//! ```
//!
//! # Invariants
//!
//! 1. The whole refill runs in one transaction and ends with exactly one
//!    aggregate `change`.
//! 2. A merged list follows the incoming order.
//! 3. Only truthy identities match. Each previous element is claimed at most
//!    once; a later duplicate identity gets the freshly built candidate.
//!
//! # Failure Modes
//!
//! - **Document is not an object**: [`ModelError::NotAnObject`].
//! - **List field given a non-list**: [`ModelError::NotAList`] (`null` counts
//!   as an empty list).
//! - Constructor errors propagate; fields already assigned keep their new
//!   values and the transaction still closes.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::error::ModelError;
use crate::model::{CHANGE, Model, ModelClass, ModelHandler, change_event};
use crate::value::{Record, Value};

pub(crate) type IdentityFn = Rc<dyn Fn(&Model) -> Option<Value>>;
pub(crate) type RefillFn = Rc<dyn Fn(&Model, &Value) -> Result<(), ModelError>>;

/// Builds a nested model from its sub-document.
#[derive(Clone)]
pub struct Constructor {
    f: Rc<dyn Fn(&Value) -> Result<Model, ModelError>>,
}

impl Constructor {
    pub fn new(f: impl Fn(&Value) -> Result<Model, ModelError> + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Build a model from `data`.
    ///
    /// # Errors
    ///
    /// Whatever the wrapped constructor reports.
    pub fn construct(&self, data: &Value) -> Result<Model, ModelError> {
        (self.f)(data)
    }
}

/// Instantiate the class, then refill from the sub-document.
impl From<ModelClass> for Constructor {
    fn from(class: ModelClass) -> Self {
        Self::new(move |data| class.build_from(data))
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor").finish_non_exhaustive()
    }
}

/// How one spec key is filled.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar,
    One(Constructor),
    Many(Constructor),
}

/// Per-key reconciliation rules, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FillSpec {
    fields: Vec<(String, FieldKind)>,
}

impl FillSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.with(name.into(), FieldKind::Scalar)
    }

    #[must_use]
    pub fn one(self, name: impl Into<String>, constructor: impl Into<Constructor>) -> Self {
        self.with(name.into(), FieldKind::One(constructor.into()))
    }

    #[must_use]
    pub fn many(self, name: impl Into<String>, constructor: impl Into<Constructor>) -> Self {
        self.with(name.into(), FieldKind::Many(constructor.into()))
    }

    fn with(mut self, name: String, kind: FieldKind) -> Self {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = kind,
            None => self.fields.push((name, kind)),
        }
        self
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }

    #[must_use]
    pub fn kind(&self, name: &str) -> Option<&FieldKind> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, k)| k)
    }
}

/// Refill strategy of a class.
#[derive(Clone, Default)]
pub enum Refill {
    #[default]
    Attributes,
    Custom(RefillFn),
    Spec(FillSpec),
}

impl fmt::Debug for Refill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributes => f.write_str("Attributes"),
            Self::Custom(_) => f.write_str("Custom"),
            Self::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
        }
    }
}

impl Model {
    /// Reconciliation identity, if the class has one and it is truthy.
    #[must_use]
    pub fn identity(&self) -> Option<Value> {
        self.class().identity_of(self)
    }

    /// Merge `data` into this model using the class refill strategy.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotAnObject`] if `data` is not a record (except for
    /// custom strategies, which see `data` as given), [`ModelError::NotAList`]
    /// for a list field given something else, and constructor errors.
    pub fn refill(&self, data: &Value) -> Result<(), ModelError> {
        let _span = debug_span!("refill", class = self.class().name()).entered();
        let strategy = self.class().refill_strategy().clone();
        self.transaction(|| -> Result<(), ModelError> {
            match &strategy {
                Refill::Attributes => {
                    let record = self.expect_record(data)?;
                    self.set_attributes_from(record);
                }
                Refill::Custom(f) => f(self, data)?,
                Refill::Spec(spec) => self.refill_spec(spec, self.expect_record(data)?)?,
            }
            self.mark_changed();
            Ok(())
        })
    }

    /// [`refill`](Self::refill) from a JSON document.
    ///
    /// # Errors
    ///
    /// As [`refill`](Self::refill).
    pub fn refill_json(&self, data: &serde_json::Value) -> Result<(), ModelError> {
        self.refill(&Value::from_json(data))
    }

    fn expect_record<'v>(&self, data: &'v Value) -> Result<&'v Record, ModelError> {
        data.as_record().ok_or_else(|| ModelError::NotAnObject {
            context: format!("refill of {}", self.class().name()),
        })
    }

    fn refill_spec(&self, spec: &FillSpec, data: &Record) -> Result<(), ModelError> {
        for (name, value) in data.entries() {
            match spec.kind(&name) {
                Some(FieldKind::Scalar) => match self.get(&name) {
                    Some(Value::Model(child)) if value.as_record().is_some() => {
                        self.refill_child(&name, &child, &value)?;
                    }
                    _ => self.assign(&name, value),
                },
                Some(FieldKind::One(constructor)) => match (self.get(&name), &value) {
                    (_, Value::Null) => self.assign(&name, Value::Null),
                    (Some(Value::Model(child)), Value::Record(_)) => {
                        self.refill_child(&name, &child, &value)?;
                    }
                    _ => {
                        let child = constructor.construct(&value)?;
                        self.assign(&name, Value::Model(child));
                    }
                },
                Some(FieldKind::Many(constructor)) => {
                    let merged = self.merge_many(&name, &value, constructor)?;
                    self.assign(&name, merged);
                }
                None => self.assign(&name, value),
            }
        }
        Ok(())
    }

    /// Refill a nested model in place, relaying its aggregate change to this
    /// model's `<name>_change` for the duration of the call.
    fn refill_child(&self, name: &str, child: &Model, data: &Value) -> Result<(), ModelError> {
        let parent = self.clone();
        let event = change_event(name);
        let relay = ModelHandler::new(move |child, _| {
            parent.transactional_trigger(&event, vec![Value::Model(child.clone())]);
        });
        child.on_handler(CHANGE, relay.clone());
        let result = child.refill(data);
        child.remove_handler(CHANGE, &relay);
        result
    }

    fn merge_many(
        &self,
        name: &str,
        incoming: &Value,
        constructor: &Constructor,
    ) -> Result<Value, ModelError> {
        let items: &[Value] = match incoming {
            Value::List(items) => items,
            Value::Null => &[],
            _ => {
                return Err(ModelError::NotAList {
                    field: name.to_owned(),
                });
            }
        };
        let previous: Vec<Model> = self
            .get(name)
            .and_then(|v| {
                v.as_list()
                    .map(|list| list.iter().filter_map(|v| v.as_model().cloned()).collect())
            })
            .unwrap_or_default();
        let mut claimed = vec![false; previous.len()];
        let mut merged = Vec::with_capacity(items.len());
        let mut reused = 0usize;

        for data in items {
            let candidate = constructor.construct(data)?;
            let existing = candidate.identity().and_then(|id| {
                (0..previous.len()).find(|&i| {
                    !claimed[i] && previous[i].identity().is_some_and(|old| old.strict_eq(&id))
                })
            });
            match existing {
                Some(i) => {
                    claimed[i] = true;
                    previous[i].refill(data)?;
                    merged.push(Value::Model(previous[i].clone()));
                    reused += 1;
                }
                None => merged.push(Value::Model(candidate)),
            }
        }

        let dropped = claimed.iter().filter(|c| !**c).count();
        debug!(
            field = name,
            reused,
            created = merged.len() - reused,
            dropped,
            "merged list"
        );
        Ok(Value::List(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    fn item_class() -> ModelClass {
        ModelClass::builder("item")
            .fields(["id", "label"])
            .identity_field("id")
            .build()
    }

    fn list_class() -> ModelClass {
        ModelClass::builder("list")
            .fill(FillSpec::new().scalar("title").many("items", item_class()))
            .build()
    }

    fn items(m: &Model) -> Vec<Model> {
        m.get("items")
            .and_then(|v| v.as_list().map(|l| l.iter().filter_map(|v| v.as_model().cloned()).collect()))
            .unwrap_or_default()
    }

    #[test]
    fn spec_keys_become_fields() {
        let class = list_class();
        assert_eq!(class.fields().to_vec(), vec!["title".to_string(), "items".to_string()]);
    }

    #[test]
    fn reorder_keeps_instances() {
        let list = list_class().instantiate();
        list.refill_json(&json!({"items": [{"id": "A"}, {"id": "B"}]})).unwrap();
        let before = items(&list);
        list.refill_json(&json!({"items": [{"id": "B", "label": "b"}, {"id": "A"}]}))
            .unwrap();
        let after = items(&list);
        assert!(after[0].ptr_eq(&before[1]));
        assert!(after[1].ptr_eq(&before[0]));
        assert_eq!(after[0].get("label").and_then(|v| v.as_str().map(String::from)), Some("b".into()));
    }

    #[test]
    fn unmatched_identities_are_replaced() {
        let list = list_class().instantiate();
        list.refill_json(&json!({"items": [{"id": "A"}, {"id": "B"}]})).unwrap();
        let before = items(&list);
        list.refill_json(&json!({"items": [{"id": "C"}]})).unwrap();
        let after = items(&list);
        assert_eq!(after.len(), 1);
        assert!(before.iter().all(|old| !old.ptr_eq(&after[0])));
        assert_eq!(after[0].identity().and_then(|v| v.as_str().map(String::from)), Some("C".into()));
    }

    #[test]
    fn duplicate_identity_claims_once() {
        let list = list_class().instantiate();
        list.refill_json(&json!({"items": [{"id": "A"}]})).unwrap();
        let before = items(&list);
        list.refill_json(&json!({"items": [{"id": "A"}, {"id": "A"}]})).unwrap();
        let after = items(&list);
        assert!(after[0].ptr_eq(&before[0]));
        assert!(!after[1].ptr_eq(&before[0]));
    }

    #[test]
    fn falsy_identities_never_match() {
        let list = list_class().instantiate();
        list.refill_json(&json!({"items": [{"id": ""}]})).unwrap();
        let before = items(&list);
        list.refill_json(&json!({"items": [{"id": ""}]})).unwrap();
        assert!(!items(&list)[0].ptr_eq(&before[0]));
    }

    #[test]
    fn refill_announces_one_change() {
        let list = list_class().instantiate();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        list.on_change(move |_, _| c.set(c.get() + 1));
        list.refill_json(&json!({"title": "t", "items": [{"id": "A"}]})).unwrap();
        assert_eq!(count.get(), 1);
        list.refill_json(&json!({"title": "t"})).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn nested_one_is_refilled_in_place_and_relayed() {
        let class = ModelClass::builder("order")
            .fill(FillSpec::new().one("customer", item_class()))
            .build();
        let order = class.instantiate();
        order.refill_json(&json!({"customer": {"id": "c1", "label": "Ann"}})).unwrap();
        let customer = order.get("customer").and_then(|v| v.as_model().cloned()).unwrap();

        let relayed = Rc::new(Cell::new(0));
        let r = Rc::clone(&relayed);
        order.on("customer_change", move |_, _| r.set(r.get() + 1));
        order.refill_json(&json!({"customer": {"id": "c1", "label": "Bob"}})).unwrap();

        let now = order.get("customer").and_then(|v| v.as_model().cloned()).unwrap();
        assert!(now.ptr_eq(&customer));
        assert_eq!(customer.get("label").and_then(|v| v.as_str().map(String::from)), Some("Bob".into()));
        assert_eq!(relayed.get(), 1);
        assert!(!customer.has_handlers(CHANGE));
    }

    #[test]
    fn unknown_keys_pass_through() {
        let list = list_class().instantiate();
        list.refill_json(&json!({"colour": "red"})).unwrap();
        assert_eq!(list.extra("colour").and_then(|v| v.as_str().map(String::from)), Some("red".into()));
    }

    #[test]
    fn malformed_documents_are_errors() {
        let list = list_class().instantiate();
        assert!(matches!(
            list.refill_json(&json!([1, 2])),
            Err(ModelError::NotAnObject { .. })
        ));
        assert_eq!(
            list.refill_json(&json!({"items": 3})),
            Err(ModelError::NotAList {
                field: "items".into()
            })
        );
        assert!(!list.in_transaction());
    }

    #[test]
    fn custom_refill_runs_in_a_transaction() {
        let class = ModelClass::builder("upper")
            .field("name")
            .refill_with(|m, data| {
                assert!(m.in_transaction());
                let name = data.as_str().unwrap_or_default().to_uppercase();
                m.set("name", name)
            })
            .build();
        let m = class.instantiate();
        m.refill(&Value::from("ann")).unwrap();
        assert_eq!(m.get("name").and_then(|v| v.as_str().map(String::from)), Some("ANN".into()));
    }

    #[test]
    fn attributes_refill_is_bulk_assignment() {
        let m = item_class().instantiate();
        m.refill_json(&json!({"id": "x", "label": "y"})).unwrap();
        assert_eq!(m.unbuild().unwrap(), json!({"id": "x", "label": "y"}));
    }
}
