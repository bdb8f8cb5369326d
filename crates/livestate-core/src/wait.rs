#![forbid(unsafe_code)]

//! Condition helpers: run a callback when a field takes a value.
//!
//! Matching is strict ([`Value::strict_eq`]) regardless of the class
//! equality. A field that was never set matches nothing.
//!
//! `when_equal` is one-shot per registration. All pending waiters for a field
//! share a single `<field>_change` handler, registered with the first waiter.
//! `whenever_equal` fires now (if matching) and on every later change that
//! lands on the expected value.
//!
//! Waiters are checked against the field's value when the change event is
//! dispatched, not when it was queued. A value overwritten inside the same
//! transaction releases nobody.

use std::rc::Rc;

use crate::error::ModelError;
use crate::model::{Model, change_event};
use crate::value::Value;

pub(crate) type Callback = Rc<dyn Fn(&Model)>;

struct Waiter {
    expected: Value,
    callback: Callback,
}

/// Pending waiters for one field. The relay handler stays registered once
/// installed, even after the list empties.
#[derive(Default)]
pub(crate) struct WaitList {
    relay_installed: bool,
    pending: Vec<Waiter>,
}

impl Model {
    fn currently_equals(&self, field: &str, expected: &Value) -> bool {
        self.get(field).is_some_and(|v| v.strict_eq(expected))
    }

    /// Call `f` once, as soon as `field` strictly equals `expected`
    /// (immediately if it already does).
    ///
    /// A queued change event only releases a waiter if the field still holds
    /// the expected value when the event is dispatched.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownField`] if the class does not declare `field`.
    pub fn when_equal(
        &self,
        field: &str,
        expected: impl Into<Value>,
        f: impl Fn(&Model) + 'static,
    ) -> Result<&Self, ModelError> {
        self.class().require_field(field)?;
        self.wait_for(field, expected.into(), Rc::new(f));
        Ok(self)
    }

    /// Call `f` now if `field` strictly equals `expected`, and again after
    /// every change event on `field` that lands on `expected` and leaves the
    /// field equal to it.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownField`] if the class does not declare `field`.
    pub fn whenever_equal(
        &self,
        field: &str,
        expected: impl Into<Value>,
        f: impl Fn(&Model) + 'static,
    ) -> Result<&Self, ModelError> {
        self.class().require_field(field)?;
        self.watch_for(field, expected.into(), Rc::new(f));
        Ok(self)
    }

    /// `when_equal` on a field already known to exist.
    pub(crate) fn wait_for(&self, field: &str, expected: Value, callback: Callback) {
        if self.currently_equals(field, &expected) {
            callback(self);
            return;
        }

        let install_relay = {
            let mut waiters = self.waiters().borrow_mut();
            let list = waiters.entry(field.to_owned()).or_default();
            list.pending.push(Waiter { expected, callback });
            !std::mem::replace(&mut list.relay_installed, true)
        };
        if install_relay {
            let name = field.to_owned();
            self.on(&change_event(field), move |model, _| {
                let Some(current) = model.get(&name) else {
                    return;
                };
                let ready: Vec<Callback> = {
                    let mut waiters = model.waiters().borrow_mut();
                    let Some(list) = waiters.get_mut(&name) else {
                        return;
                    };
                    let mut ready = Vec::new();
                    list.pending.retain(|w| {
                        if w.expected.strict_eq(&current) {
                            ready.push(Rc::clone(&w.callback));
                            false
                        } else {
                            true
                        }
                    });
                    ready
                };
                for callback in ready {
                    callback(model);
                }
            });
        }
    }

    /// `whenever_equal` on a field already known to exist.
    pub(crate) fn watch_for(&self, field: &str, expected: Value, callback: Callback) {
        let name = field.to_owned();
        self.now_and_on(&change_event(field), &[], move |model, args| {
            // A stale event (its value was overwritten before dispatch) or an
            // event for another value is not a transition to `expected`.
            let lands_on_expected = args.first().is_none_or(|v| v.strict_eq(&expected));
            if lands_on_expected && model.currently_equals(&name, &expected) {
                callback(model);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelClass;
    use std::cell::{Cell, RefCell};

    fn bagel() -> Model {
        ModelClass::from_attributes("bagel", ["state", "count"]).instantiate()
    }

    fn spy() -> (Rc<Cell<u32>>, impl Fn(&Model) + 'static) {
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);
        (count, move |_: &Model| c.set(c.get() + 1))
    }

    #[test]
    fn when_equal_fires_immediately_if_matching() {
        let m = bagel();
        m.set("state", "toasted").unwrap();
        let (count, f) = spy();
        m.when_equal("state", "toasted", f).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn when_equal_fires_once_on_match() {
        let m = bagel();
        let (count, f) = spy();
        m.when_equal("state", "toasted", f).unwrap();
        m.set("state", "raw").unwrap();
        assert_eq!(count.get(), 0);
        m.set("state", "toasted").unwrap();
        assert_eq!(count.get(), 1);
        m.set("state", "raw").unwrap();
        m.set("state", "toasted").unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn waiters_share_one_relay() {
        let m = bagel();
        let (toasted, f1) = spy();
        let (burnt, f2) = spy();
        m.when_equal("state", "toasted", f1).unwrap();
        m.when_equal("state", "burnt", f2).unwrap();
        m.set("state", "toasted").unwrap();
        assert_eq!((toasted.get(), burnt.get()), (1, 0));
        m.set("state", "burnt").unwrap();
        assert_eq!((toasted.get(), burnt.get()), (1, 1));

        // Relay survives emptying the waiter list.
        let (again, f3) = spy();
        m.when_equal("state", "raw", f3).unwrap();
        m.set("state", "raw").unwrap();
        assert_eq!(again.get(), 1);
    }

    #[test]
    fn when_equal_uses_strict_matching() {
        let m = bagel();
        let (count, f) = spy();
        m.when_equal("count", "1", f).unwrap();
        m.set("count", 1).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn whenever_equal_fires_now_and_on_each_match() {
        let m = bagel();
        m.set("state", "toasted").unwrap();
        let (count, f) = spy();
        m.whenever_equal("state", "toasted", f).unwrap();
        assert_eq!(count.get(), 1);
        m.set("state", "raw").unwrap();
        m.set("state", "toasted").unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let m = bagel();
        assert!(m.when_equal("colour", "red", |_| {}).is_err());
        assert!(m.whenever_equal("colour", "red", |_| {}).is_err());
    }

    #[test]
    fn value_overwritten_in_transaction_releases_nobody() {
        let m = bagel();
        m.set("state", "raw").unwrap();
        let fired_with = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&fired_with);
        m.when_equal("state", "toasted", move |model| {
            seen.borrow_mut().push(model.get("state"));
        })
        .unwrap();

        m.transaction(|| {
            m.set("state", "toasted").unwrap();
            m.set("state", "burnt").unwrap();
        });
        assert!(fired_with.borrow().is_empty());

        m.set("state", "toasted").unwrap();
        let fired = fired_with.borrow();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].as_ref().is_some_and(|v| v.as_str() == Some("toasted")));
    }

    #[test]
    fn whenever_equal_ignores_overwritten_values() {
        let m = bagel();
        m.set("state", "raw").unwrap();
        let (count, f) = spy();
        m.whenever_equal("state", "toasted", f).unwrap();
        m.transaction(|| {
            m.set("state", "toasted").unwrap();
            m.set("state", "burnt").unwrap();
        });
        assert_eq!(count.get(), 0);
        m.transaction(|| {
            m.set("state", "raw").unwrap();
            m.set("state", "toasted").unwrap();
        });
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn callback_may_register_another_waiter() {
        let m = bagel();
        let (count, f) = spy();
        let f = Rc::new(f);
        m.when_equal("state", "a", move |model| {
            let f = Rc::clone(&f);
            model.when_equal("state", "b", move |m| f(m)).unwrap();
        })
        .unwrap();
        m.set("state", "a").unwrap();
        m.set("state", "b").unwrap();
        assert_eq!(count.get(), 1);
    }
}
