#![forbid(unsafe_code)]

//! Change-detection predicates for model fields.
//!
//! A field setter fires `<field>_change` only when its [`Equality`] says the
//! new value differs from the old one. The default is [`Equality::strict`];
//! [`Equality::structural`] gives deep comparison so that replacing a list or
//! record with an identical copy is silent.
//!
//! A custom predicate must be an equivalence relation (reflexive, symmetric,
//! transitive). Anything else leads to confusing change events; it is not
//! checked.

use std::fmt;
use std::rc::Rc;

use crate::value::{RefKey, Value};

type EqualityFn = dyn Fn(&Value, &Value) -> bool;

/// A shared equality predicate.
#[derive(Clone)]
pub struct Equality {
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    Strict,
    Structural,
    Custom(Rc<EqualityFn>),
}

impl Equality {
    /// Scalars by value, lists element-wise, records and models by reference.
    #[must_use]
    pub fn strict() -> Self {
        Self { kind: Kind::Strict }
    }

    /// Deep comparison of lists, records and model attributes.
    #[must_use]
    pub fn structural() -> Self {
        Self {
            kind: Kind::Structural,
        }
    }

    /// A caller-supplied predicate.
    pub fn custom(f: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        Self {
            kind: Kind::Custom(Rc::new(f)),
        }
    }

    #[must_use]
    pub fn eq(&self, a: &Value, b: &Value) -> bool {
        match &self.kind {
            Kind::Strict => a.strict_eq(b),
            Kind::Structural => structural_eq(a, b, &mut Vec::new()),
            Kind::Custom(f) => f(a, b),
        }
    }
}

impl Default for Equality {
    fn default() -> Self {
        Self::strict()
    }
}

impl fmt::Debug for Equality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            Kind::Strict => "strict",
            Kind::Structural => "structural",
            Kind::Custom(_) => "custom",
        };
        f.debug_tuple("Equality").field(&name).finish()
    }
}

/// `in_progress` holds pairs currently being compared; meeting one again
/// means a cycle, which is treated as equal.
fn structural_eq(a: &Value, b: &Value, in_progress: &mut Vec<(RefKey, RefKey)>) -> bool {
    if let (Some(ka), Some(kb)) = (a.ref_key(), b.ref_key()) {
        if ka == kb {
            return true;
        }
        if in_progress.contains(&(ka, kb)) {
            return true;
        }
        in_progress.push((ka, kb));
        let equal = match (a, b) {
            (Value::Record(x), Value::Record(y)) => {
                entries_eq(&x.entries(), &y.entries(), in_progress)
            }
            (Value::Model(x), Value::Model(y)) => {
                let xa: Vec<_> = x.attributes().into_iter().collect();
                let ya: Vec<_> = y.attributes().into_iter().collect();
                entries_eq(&xa, &ya, in_progress)
            }
            _ => false,
        };
        in_progress.pop();
        return equal;
    }
    match (a, b) {
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|(p, q)| structural_eq(p, q, in_progress))
        }
        _ => a.strict_eq(b),
    }
}

fn entries_eq(
    x: &[(String, Value)],
    y: &[(String, Value)],
    in_progress: &mut Vec<(RefKey, RefKey)>,
) -> bool {
    x.len() == y.len()
        && x
            .iter()
            .zip(y)
            .all(|((kx, vx), (ky, vy))| kx == ky && structural_eq(vx, vy, in_progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().map(|&n| Value::from(n)).collect())
    }

    #[test]
    fn strict_is_default() {
        let eq = Equality::default();
        let a = Record::from_entries([("n", Value::from(1))]);
        let b = a.shallow_copy();
        assert!(!eq.eq(&Value::from(a), &Value::from(b)));
    }

    #[test]
    fn structural_compares_contents() {
        let eq = Equality::structural();
        let a = Record::from_entries([("n", list(&[1, 2, 3]))]);
        let b = Record::from_entries([("n", list(&[1, 2, 3]))]);
        assert!(eq.eq(&Value::from(a.clone()), &Value::from(b.clone())));
        b.insert("extra", true);
        assert!(!eq.eq(&Value::from(a), &Value::from(b)));
    }

    #[test]
    fn structural_terminates_on_cycles() {
        let eq = Equality::structural();
        let a = Record::new();
        a.insert("self", a.clone());
        let b = Record::new();
        b.insert("self", b.clone());
        assert!(eq.eq(&Value::from(a.clone()), &Value::from(b.clone())));
        a.remove("self");
        b.remove("self");
    }

    #[test]
    fn custom_predicate() {
        let eq = Equality::custom(|a, b| a.as_str().map(str::len) == b.as_str().map(str::len));
        assert!(eq.eq(&Value::from("abc"), &Value::from("xyz")));
        assert!(!eq.eq(&Value::from("abc"), &Value::from("xy")));
    }
}
