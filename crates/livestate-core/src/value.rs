#![forbid(unsafe_code)]

//! Dynamic values stored in model fields.
//!
//! # Design
//!
//! A [`Value`] is JSON-shaped data extended with two reference kinds:
//!
//! - [`Record`]: a shared plain object. Cloning a `Record` handle shares the
//!   same map, so records can alias each other and form cycles.
//! - [`Model`]: a shared attribute store.
//!
//! Lists are value-typed (`Vec<Value>`); they cannot form cycles on their own.
//!
//! # Equality
//!
//! [`Value::strict_eq`] compares scalars by value, lists element-wise and
//! records/models by reference. That is the default change-detection rule
//! for model fields. Deep comparison lives in [`crate::Equality`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Number};

use crate::error::ModelError;
use crate::model::Model;

/// Identity key for reference values. Only ever compared, never dereferenced.
pub(crate) type RefKey = *const ();

/// A field value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Record(Record),
    Model(Model),
}

impl Value {
    /// Convert a JSON document. Every JSON object becomes a fresh [`Record`].
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.clone()),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Record(Record::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))),
            )),
        }
    }

    /// Export as JSON, calling `unbuild` on nested models.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Cycle`] if a record or model contains itself.
    pub fn to_json(&self) -> Result<serde_json::Value, ModelError> {
        self.to_json_guarded(&mut Vec::new())
    }

    pub(crate) fn to_json_guarded(
        &self,
        ancestors: &mut Vec<RefKey>,
    ) -> Result<serde_json::Value, ModelError> {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json_guarded(ancestors))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Record(record) => {
                let key = record.ref_key();
                if ancestors.contains(&key) {
                    return Err(ModelError::Cycle);
                }
                ancestors.push(key);
                let mut map = Map::new();
                for (name, value) in record.entries() {
                    map.insert(name, value.to_json_guarded(ancestors)?);
                }
                ancestors.pop();
                serde_json::Value::Object(map)
            }
            Self::Model(model) => model.unbuild_guarded(ancestors)?,
        })
    }

    /// Strict equality: scalars by value, lists element-wise, references by identity.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Self::Record(a), Self::Record(b)) => a.ptr_eq(b),
            (Self::Model(a), Self::Model(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Falsy values are `Null`, `false`, `0`, `NaN` and the empty string.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Self::String(s) => !s.is_empty(),
            Self::List(_) | Self::Record(_) | Self::Model(_) => true,
        }
    }

    /// Identity key for records and models.
    pub(crate) fn ref_key(&self) -> Option<RefKey> {
        match self {
            Self::Record(r) => Some(r.ref_key()),
            Self::Model(m) => Some(m.ref_key()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Record(r) => fmt::Debug::fmt(r, f),
            Self::Model(m) => fmt::Debug::fmt(m, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl From<Model> for Value {
    fn from(m: Model) -> Self {
        Self::Model(m)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(&json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// A shared plain object.
///
/// Cloning the handle shares the underlying map; use
/// [`Model::deep_clone`](crate::Model::deep_clone) or [`Record::shallow_copy`]
/// for an independent copy.
#[derive(Clone, Default)]
pub struct Record {
    inner: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from key/value pairs.
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(
                entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            )),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().get(key).cloned()
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.borrow_mut().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.borrow_mut().remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.borrow().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys().cloned().collect()
    }

    /// Snapshot of the entries, in key order. The borrow is released before
    /// returning, so callers may mutate the record while iterating.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// A new record with the same entries (values are shared, not cloned).
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        Self::from_entries(self.entries())
    }

    /// Whether both handles point at the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ref_key(&self) -> RefKey {
        Rc::as_ptr(&self.inner).cast()
    }
}

// Keys only: a record may contain itself.
impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("keys", &self.keys())
            .finish()
    }
}
