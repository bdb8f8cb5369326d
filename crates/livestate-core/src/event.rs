#![forbid(unsafe_code)]

//! Named-event registry.
//!
//! # Design
//!
//! [`EventRegistry<C>`] maps event names to an ordered list of handlers.
//! Handlers receive the owning object as context `C` plus the trigger
//! arguments. The registry is scoped to one owner; there is no global table.
//!
//! # Invariants
//!
//! 1. Handlers fire in registration order. Duplicates are allowed.
//! 2. `trigger` dispatches a snapshot of the handler list, so registering or
//!    removing handlers from inside a handler never skips or duplicates a
//!    call in the dispatch already under way.
//! 3. A handler registered with `once_on` is deregistered when a dispatch
//!    takes its snapshot, so it runs exactly once in that dispatch, even when
//!    the event is re-triggered from inside a handler.
//! 4. Removing a handler compares by reference (`Rc::ptr_eq`) and removes
//!    only the first match.
//!
//! # Failure Modes
//!
//! - **Removing an unknown handler**: no-op, returns `None`.
//! - **Triggering an event nobody listens to**: no-op.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::inflect::camelize;
use crate::value::Value;

type HandlerFn<C> = dyn Fn(&C, &[Value]);

/// A registered event callback. Clones compare equal to the original.
pub struct Handler<C> {
    f: Rc<HandlerFn<C>>,
}

impl<C> Handler<C> {
    pub fn new(f: impl Fn(&C, &[Value]) + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Whether `self` and `other` are the same registration.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }

    pub fn call(&self, ctx: &C, args: &[Value]) {
        (self.f)(ctx, args);
    }
}

// Manual Clone: shares the same Rc and does not require `C: Clone`.
impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<C> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

struct Entry<C> {
    handler: Handler<C>,
    once: bool,
}

impl<C> Clone for Entry<C> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            once: self.once,
        }
    }
}

/// A declared event name and its derived accessor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName {
    name: String,
    camel: String,
}

impl EventName {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            camel: camelize(name, false),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// `foo_bar` → `onFooBar`.
    #[must_use]
    pub fn on_accessor(&self) -> String {
        format!("on{}", self.camel)
    }

    /// `foo_bar` → `triggerFooBar`.
    #[must_use]
    pub fn trigger_accessor(&self) -> String {
        format!("trigger{}", self.camel)
    }
}

/// Per-owner mapping from event name to handlers.
pub struct EventRegistry<C> {
    handlers: RefCell<HashMap<String, Vec<Entry<C>>>>,
    declared: RefCell<BTreeMap<String, EventName>>,
}

impl<C> Default for EventRegistry<C> {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(HashMap::new()),
            declared: RefCell::new(BTreeMap::new()),
        }
    }
}

impl<C> fmt::Debug for EventRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<String, usize> = self
            .handlers
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        f.debug_struct("EventRegistry")
            .field("declared", &self.declared.borrow().keys().collect::<Vec<_>>())
            .field("handlers", &counts)
            .finish()
    }
}

impl<C> EventRegistry<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an event name. Declaring the same name again is a no-op.
    pub fn declare(&self, name: &str) -> EventName {
        self.declared
            .borrow_mut()
            .entry(name.to_owned())
            .or_insert_with(|| EventName::new(name))
            .clone()
    }

    #[must_use]
    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.borrow().contains_key(name)
    }

    /// Declared events, in name order.
    #[must_use]
    pub fn declared(&self) -> Vec<EventName> {
        self.declared.borrow().values().cloned().collect()
    }

    /// Register a handler to run whenever `name` fires.
    pub fn on(&self, name: &str, handler: Handler<C>) -> &Self {
        self.push(name, handler, false);
        self
    }

    /// Register a handler that deregisters itself before its first call.
    pub fn once_on(&self, name: &str, handler: Handler<C>) -> &Self {
        self.push(name, handler, true);
        self
    }

    fn push(&self, name: &str, handler: Handler<C>, once: bool) {
        self.handlers
            .borrow_mut()
            .entry(name.to_owned())
            .or_default()
            .push(Entry { handler, once });
    }

    /// Invoke a snapshot of the handlers for `name` with `ctx` as receiver.
    pub fn trigger(&self, ctx: &C, name: &str, args: &[Value]) {
        let snapshot: Vec<Entry<C>> = {
            let mut handlers = self.handlers.borrow_mut();
            let Some(entries) = handlers.get_mut(name) else {
                return;
            };
            if entries.is_empty() {
                return;
            }
            let snapshot = entries.clone();
            // Once-handlers are claimed by this dispatch.
            entries.retain(|e| !e.once);
            snapshot
        };
        for entry in &snapshot {
            entry.handler.call(ctx, args);
        }
    }

    /// Remove the first registration of `handler` under `name`.
    pub fn remove_handler(&self, name: &str, handler: &Handler<C>) -> Option<Handler<C>> {
        let mut handlers = self.handlers.borrow_mut();
        let entries = handlers.get_mut(name)?;
        let index = entries.iter().position(|e| e.handler.same(handler))?;
        Some(entries.remove(index).handler)
    }

    /// Remove every handler registered under `name`.
    pub fn remove_handlers(&self, name: &str) {
        if let Some(entries) = self.handlers.borrow_mut().get_mut(name) {
            entries.clear();
        }
    }

    #[must_use]
    pub fn has_handlers(&self, name: &str) -> bool {
        self.handlers
            .borrow()
            .get(name)
            .is_some_and(|entries| !entries.is_empty())
    }

    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.borrow().get(name).map_or(0, Vec::len)
    }

    /// Drop every handler for every event.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}
