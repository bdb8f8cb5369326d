#![forbid(unsafe_code)]

//! Observable attribute store.
//!
//! # Design
//!
//! A [`ModelClass`] describes a kind of store: its declared fields, extra
//! events, change-detection [`Equality`], identity accessor, refill strategy
//! and whether it can be deep-cloned. [`ModelClass::instantiate`] produces a
//! [`Model`], a shared handle (`Rc`) over:
//!
//! - the attribute map (declared fields only),
//! - passthrough extras (undeclared keys assigned in bulk, never observed),
//! - an owned [`EventRegistry`],
//! - the optional open [`Transaction`].
//!
//! Cloning a `Model` handle shares the store; [`Model::deep_clone`] makes an
//! independent copy.
//!
//! # Events
//!
//! Every model declares `change`, `destroy` and `<field>_change` for each
//! field. Setting a field to a value its equality considers different stores
//! it and queues `<field>_change(new_value)`; any `<field>_change` trigger
//! marks the aggregate `change`.
//!
//! # Invariants
//!
//! 1. `<field>_change` fires once per externally observable change.
//! 2. `change` fires at most once per top-level mutating call, after every
//!    queued field event (including ones queued by handlers) has run.
//! 3. A nested transactional call runs inline in the open transaction.
//! 4. Setting a field to an equal value fires nothing.
//!
//! # Failure Modes
//!
//! - **Unknown field**: `set`, `set_later` and `field` return
//!   [`ModelError::UnknownField`]; bulk assignment stores the key as an extra.
//! - **Runaway handlers**: handlers that keep re-queueing each other are cut
//!   off after `ModelConfig::max_drain_rounds` drain rounds (logged).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, debug_span, trace, warn};

use crate::config::ModelConfig;
use crate::equality::Equality;
use crate::error::ModelError;
use crate::event::{EventName, EventRegistry, Handler};
use crate::fill::{FillSpec, IdentityFn, Refill, RefillFn};
use crate::inflect::camelize;
use crate::scheduler::Scheduler;
use crate::transaction::Transaction;
use crate::value::{Record, RefKey, Value};
use crate::wait::WaitList;

/// Aggregate change event, fired once per transaction.
pub const CHANGE: &str = "change";
/// Lifecycle event fired by [`Model::destroy`].
pub const DESTROY: &str = "destroy";

/// Name of the per-field change event: `noms` → `noms_change`.
#[must_use]
pub fn change_event(field: &str) -> String {
    format!("{field}_change")
}

/// Handler type for model events.
pub type ModelHandler = Handler<Model>;

type InitFn = Rc<dyn Fn(&Model)>;

#[derive(Clone)]
struct ClassInner {
    name: String,
    fields: Vec<String>,
    events: Vec<String>,
    equality: Equality,
    field_equality: HashMap<String, Equality>,
    identity: Option<IdentityFn>,
    refill: Refill,
    cloneable: bool,
    init: Option<InitFn>,
    scheduler: Scheduler,
    config: ModelConfig,
}

/// A kind of model. Cheap to clone; clones describe the same kind.
#[derive(Clone)]
pub struct ModelClass {
    inner: Rc<ClassInner>,
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.inner.name)
            .field("fields", &self.inner.fields)
            .field("equality", &self.inner.equality)
            .field("cloneable", &self.inner.cloneable)
            .finish()
    }
}

impl ModelClass {
    pub fn builder(name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder::new(name)
    }

    /// A plain class with the given fields and default behavior.
    pub fn from_attributes<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::builder(name).fields(fields).build()
    }

    /// The same class with setters comparing through `equality`.
    #[must_use]
    pub fn using_equality(&self, equality: Equality) -> Self {
        let mut inner = (*self.inner).clone();
        inner.equality = equality;
        Self {
            inner: Rc::new(inner),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.inner.fields
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.inner.fields.iter().any(|f| f == name)
    }

    pub(crate) fn require_field(&self, name: &str) -> Result<(), ModelError> {
        if self.has_field(name) {
            Ok(())
        } else {
            Err(ModelError::UnknownField {
                class: self.inner.name.clone(),
                field: name.to_owned(),
            })
        }
    }

    /// Equality used by the setter of `field`.
    #[must_use]
    pub fn equality_for(&self, field: &str) -> Equality {
        self.inner
            .field_equality
            .get(field)
            .unwrap_or(&self.inner.equality)
            .clone()
    }

    #[must_use]
    pub fn is_cloneable(&self) -> bool {
        self.inner.cloneable
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    #[must_use]
    pub fn config(&self) -> ModelConfig {
        self.inner.config
    }

    pub(crate) fn refill_strategy(&self) -> &Refill {
        &self.inner.refill
    }

    pub(crate) fn identity_of(&self, model: &Model) -> Option<Value> {
        let identity = self.inner.identity.as_ref()?;
        identity(model).filter(Value::is_truthy)
    }

    fn is_field_change_event(&self, event: &str) -> bool {
        event
            .strip_suffix("_change")
            .is_some_and(|field| self.has_field(field))
    }

    /// Create a model of this kind and run the class init hook.
    #[must_use]
    pub fn instantiate(&self) -> Model {
        let model = Model {
            inner: Rc::new(ModelInner {
                class: self.clone(),
                attributes: RefCell::new(BTreeMap::new()),
                extras: RefCell::new(BTreeMap::new()),
                events: EventRegistry::new(),
                txn: RefCell::new(None),
                waiters: RefCell::new(HashMap::new()),
            }),
        };
        let events = &model.inner.events;
        events.declare(CHANGE);
        events.declare(DESTROY);
        for field in &self.inner.fields {
            events.declare(&change_event(field));
        }
        for event in &self.inner.events {
            events.declare(event);
        }
        if let Some(init) = &self.inner.init {
            init(&model);
        }
        model
    }

    /// Instantiate and bulk-assign `attributes`.
    pub fn build<K: AsRef<str>, V: Into<Value>>(
        &self,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Model {
        let model = self.instantiate();
        model.set_attributes(attributes);
        model
    }

    /// Instantiate and refill from `data`.
    ///
    /// # Errors
    ///
    /// Propagates refill errors (malformed data, constructor failures).
    pub fn build_from(&self, data: &Value) -> Result<Model, ModelError> {
        let model = self.instantiate();
        model.refill(data)?;
        Ok(model)
    }
}

/// Builder for [`ModelClass`].
pub struct ModelClassBuilder {
    inner: ClassInner,
}

impl ModelClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            inner: ClassInner {
                name: name.into(),
                fields: Vec::new(),
                events: Vec::new(),
                equality: Equality::strict(),
                field_equality: HashMap::new(),
                identity: None,
                refill: Refill::Attributes,
                cloneable: false,
                init: None,
                scheduler: Scheduler::new(),
                config: ModelConfig::from_env(),
            },
        }
    }

    /// Declare a field. Duplicates are ignored.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.inner.fields.contains(&name) {
            self.inner.fields.push(name);
        }
        self
    }

    #[must_use]
    pub fn fields<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        names.into_iter().fold(self, |b, name| b.field(name))
    }

    /// Declare an extra event name on every instance.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.inner.events.push(name.into());
        self
    }

    /// Compare through `equality` in every setter.
    #[must_use]
    pub fn using_equality(mut self, equality: Equality) -> Self {
        self.inner.equality = equality;
        self
    }

    /// Compare through `equality` in the setter of one field.
    #[must_use]
    pub fn field_equality(mut self, field: impl Into<String>, equality: Equality) -> Self {
        self.inner.field_equality.insert(field.into(), equality);
        self
    }

    /// Use the value of `field` as the reconciliation identity.
    #[must_use]
    pub fn identity_field(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.identity(move |model| model.get(&field))
    }

    /// Compute the reconciliation identity. Must not mutate the model.
    #[must_use]
    pub fn identity(mut self, f: impl Fn(&Model) -> Option<Value> + 'static) -> Self {
        self.inner.identity = Some(Rc::new(f));
        self
    }

    /// Allow [`Model::deep_clone`] on instances.
    #[must_use]
    pub fn cloneable(mut self) -> Self {
        self.inner.cloneable = true;
        self
    }

    /// Reconcile refills through `spec`; its field names become fields.
    #[must_use]
    pub fn fill(mut self, spec: FillSpec) -> Self {
        for name in spec.field_names() {
            self = self.field(name);
        }
        self.inner.refill = Refill::Spec(spec);
        self
    }

    /// Replace refill with a custom routine. It runs inside a transaction.
    #[must_use]
    pub fn refill_with(
        mut self,
        f: impl Fn(&Model, &Value) -> Result<(), ModelError> + 'static,
    ) -> Self {
        let f: RefillFn = Rc::new(f);
        self.inner.refill = Refill::Custom(f);
        self
    }

    /// Run `f` on every new instance (including deep-clone targets).
    #[must_use]
    pub fn on_init(mut self, f: impl Fn(&Model) + 'static) -> Self {
        self.inner.init = Some(Rc::new(f));
        self
    }

    /// Queue deferred setters on `scheduler` instead of a private one.
    #[must_use]
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.inner.scheduler = scheduler;
        self
    }

    /// Replace the configuration read from the environment at `builder()`.
    #[must_use]
    pub fn config(mut self, config: ModelConfig) -> Self {
        self.inner.config = config;
        self
    }

    #[must_use]
    pub fn build(self) -> ModelClass {
        ModelClass {
            inner: Rc::new(self.inner),
        }
    }
}

struct ModelInner {
    class: ModelClass,
    attributes: RefCell<BTreeMap<String, Value>>,
    extras: RefCell<BTreeMap<String, Value>>,
    events: EventRegistry<Model>,
    txn: RefCell<Option<Transaction>>,
    waiters: RefCell<HashMap<String, WaitList>>,
}

/// Shared handle to an attribute store.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

/// Non-owning handle, for relays that must not keep a model alive.
#[derive(Clone)]
pub struct WeakModel {
    inner: Weak<ModelInner>,
}

impl WeakModel {
    #[must_use]
    pub fn upgrade(&self) -> Option<Model> {
        self.inner.upgrade().map(|inner| Model { inner })
    }
}

impl fmt::Debug for WeakModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakModel")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// Field names only: values may refer back to this model.
impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("class", &self.inner.class.name())
            .field("set", &self.inner.attributes.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Closes the transaction even if the body unwinds.
struct TransactionScope<'a> {
    model: &'a Model,
}

impl TransactionScope<'_> {
    /// Close and report whether the aggregate change is pending.
    fn close(self) -> bool {
        self.model
            .inner
            .txn
            .borrow_mut()
            .take()
            .is_some_and(|txn| txn.change_pending())
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if let Ok(mut txn) = self.model.inner.txn.try_borrow_mut() {
            txn.take();
        }
    }
}

impl Model {
    #[must_use]
    pub fn class(&self) -> &ModelClass {
        &self.inner.class
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakModel {
        WeakModel {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ref_key(&self) -> RefKey {
        Rc::as_ptr(&self.inner).cast()
    }

    pub(crate) fn waiters(&self) -> &RefCell<HashMap<String, WaitList>> {
        &self.inner.waiters
    }

    // ---------------------------------------------------------------------
    // Fields
    // ---------------------------------------------------------------------

    /// Current value of a field, or `None` if it was never set.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    /// Set a declared field.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownField`] if the class does not declare `name`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        self.inner.class.require_field(name)?;
        self.store_field(name, value.into());
        Ok(())
    }

    /// Schedule `set(name, value)` on the class scheduler.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownField`] if the class does not declare `name`.
    pub fn set_later(&self, name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        self.inner.class.require_field(name)?;
        self.defer_store(name, value.into());
        Ok(())
    }

    fn defer_store(&self, name: &str, value: Value) {
        let model = self.downgrade();
        let name = name.to_owned();
        self.inner.class.scheduler().submit(move || {
            if let Some(model) = model.upgrade() {
                model.store_field(&name, value);
            }
        });
    }

    /// Scoped accessor for one declared field.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownField`] if the class does not declare `name`.
    pub fn field(&self, name: &str) -> Result<Field<'_>, ModelError> {
        self.inner.class.require_field(name)?;
        Ok(Field {
            model: self,
            name: name.to_owned(),
        })
    }

    /// Compare the current value of `name` with `other` using the field's equality.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownField`] if the class does not declare `name`.
    pub fn field_equals(&self, name: &str, other: &Value) -> Result<bool, ModelError> {
        self.inner.class.require_field(name)?;
        let current = self.get(name).unwrap_or_default();
        Ok(self.inner.class.equality_for(name).eq(&current, other))
    }

    /// Declared fields go through the setter; anything else becomes an extra.
    pub(crate) fn assign(&self, name: &str, value: Value) {
        if self.inner.class.has_field(name) {
            self.store_field(name, value);
        } else {
            let previous = self.inner.extras.borrow_mut().insert(name.to_owned(), value);
            drop(previous);
        }
    }

    fn store_field(&self, name: &str, value: Value) {
        let equality = self.inner.class.equality_for(name);
        self.transaction(|| {
            // Old values are dropped only after the borrow is released.
            let old = self.inner.attributes.borrow().get(name).cloned();
            let changed = old.is_none_or(|old| !equality.eq(&value, &old));
            if !changed {
                return;
            }
            let previous = self
                .inner
                .attributes
                .borrow_mut()
                .insert(name.to_owned(), value.clone());
            drop(previous);
            trace!(class = self.inner.class.name(), field = name, "field changed");
            self.transactional_trigger(&change_event(name), vec![value]);
        });
    }

    /// Passthrough value stored under an undeclared key.
    #[must_use]
    pub fn extra(&self, name: &str) -> Option<Value> {
        self.inner.extras.borrow().get(name).cloned()
    }

    /// Snapshot of all passthrough extras.
    #[must_use]
    pub fn extras(&self) -> BTreeMap<String, Value> {
        self.inner.extras.borrow().clone()
    }

    // ---------------------------------------------------------------------
    // Bulk access
    // ---------------------------------------------------------------------

    /// Snapshot copy of the field map. Mutating it does not touch the model.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.inner.attributes.borrow().clone()
    }

    /// Assign every pair in one transaction, leaving other fields untouched.
    /// Returns the snapshot after the transaction has settled.
    pub fn set_attributes<K: AsRef<str>, V: Into<Value>>(
        &self,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> BTreeMap<String, Value> {
        self.transaction(|| {
            for (name, value) in attributes {
                self.assign(name.as_ref(), value.into());
            }
        });
        self.attributes()
    }

    /// [`set_attributes`](Self::set_attributes) from a record's entries.
    pub fn set_attributes_from(&self, record: &Record) -> BTreeMap<String, Value> {
        self.set_attributes(record.entries())
    }

    /// JSON export of the fields; nested models export through their own
    /// `unbuild`.
    ///
    /// # Errors
    ///
    /// [`ModelError::Cycle`] if the graph refers back to a model or record
    /// that is still being exported.
    pub fn unbuild(&self) -> Result<serde_json::Value, ModelError> {
        self.unbuild_guarded(&mut Vec::new())
    }

    pub(crate) fn unbuild_guarded(
        &self,
        ancestors: &mut Vec<RefKey>,
    ) -> Result<serde_json::Value, ModelError> {
        let key = self.ref_key();
        if ancestors.contains(&key) {
            return Err(ModelError::Cycle);
        }
        ancestors.push(key);
        let mut out = serde_json::Map::new();
        for (name, value) in self.attributes() {
            out.insert(name, value.to_json_guarded(ancestors)?);
        }
        ancestors.pop();
        Ok(serde_json::Value::Object(out))
    }

    /// Relay every future `change` on this model to
    /// `parent.trigger("<attribute>_change", self)`, and fire it once now.
    pub fn bind_to(&self, parent: &Model, attribute: &str) -> &Self {
        let event = change_event(attribute);
        let relay_parent = parent.downgrade();
        let relay_event = event.clone();
        self.on(CHANGE, move |child, _| {
            if let Some(parent) = relay_parent.upgrade() {
                parent.trigger(&relay_event, &[Value::Model(child.clone())]);
            }
        });
        parent.trigger(&event, &[Value::Model(self.clone())]);
        self
    }

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.txn.borrow().is_some()
    }

    /// Run `f` with change notifications batched.
    ///
    /// Field events raised inside `f` are queued and dispatched after it
    /// returns; the queue is drained until empty, then `change` fires once if
    /// anything changed. Inside an open transaction `f` simply runs inline.
    pub fn transaction<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.in_transaction() {
            return f();
        }
        *self.inner.txn.borrow_mut() = Some(Transaction::new());
        let scope = TransactionScope { model: self };
        let ret = f();
        self.drain();
        let changed = scope.close();
        debug!(class = self.inner.class.name(), changed, "transaction closed");
        if changed {
            self.inner
                .events
                .trigger(self, CHANGE, &[Value::Model(self.clone())]);
        }
        ret
    }

    fn drain(&self) {
        let _span = debug_span!("txn_drain", class = self.inner.class.name()).entered();
        let limit = self.inner.class.config().max_drain_rounds;
        loop {
            let round = {
                let mut txn = self.inner.txn.borrow_mut();
                let Some(txn) = txn.as_mut() else {
                    return;
                };
                if txn.is_idle() {
                    return;
                }
                if txn.rounds() >= limit {
                    let dropped = txn.discard_queue();
                    warn!(
                        class = self.inner.class.name(),
                        limit, dropped, "transaction did not settle; dropping queued triggers"
                    );
                    return;
                }
                let round = txn.take_round();
                trace!(round = txn.rounds(), queued = round.len(), "drain round");
                round
            };
            for pending in round {
                self.trigger(&pending.event, &pending.args);
            }
        }
    }

    /// Trigger now, or queue until the open transaction drains. Inside a
    /// transaction, `change` only marks the aggregate event as pending.
    pub fn transactional_trigger(&self, name: &str, args: Vec<Value>) {
        {
            let mut txn = self.inner.txn.borrow_mut();
            if let Some(txn) = txn.as_mut() {
                if name == CHANGE {
                    txn.mark_changed();
                } else {
                    txn.enqueue(name, args);
                }
                return;
            }
        }
        self.trigger(name, &args);
    }

    pub(crate) fn mark_changed(&self) {
        self.transactional_trigger(CHANGE, Vec::new());
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Register `f` for `name`. The model is passed as the first argument.
    pub fn on(&self, name: &str, f: impl Fn(&Model, &[Value]) + 'static) -> &Self {
        self.on_handler(name, Handler::new(f))
    }

    /// Register a prepared handler, keeping a copy for later removal.
    pub fn on_handler(&self, name: &str, handler: ModelHandler) -> &Self {
        self.inner.events.on(name, handler);
        self
    }

    /// Register `f` for the next `name` only.
    pub fn once_on(&self, name: &str, f: impl Fn(&Model, &[Value]) + 'static) -> &Self {
        self.inner.events.once_on(name, Handler::new(f));
        self
    }

    /// Call `f` now with `args`, then register it for `name`.
    pub fn now_and_on(
        &self,
        name: &str,
        args: &[Value],
        f: impl Fn(&Model, &[Value]) + 'static,
    ) -> &Self {
        let handler = Handler::new(f);
        handler.call(self, args);
        self.on_handler(name, handler)
    }

    pub fn on_change(&self, f: impl Fn(&Model, &[Value]) + 'static) -> &Self {
        self.on(CHANGE, f)
    }

    /// Dispatch `name` to a snapshot of its handlers.
    ///
    /// Triggering a field's change event also marks the aggregate `change`,
    /// so the dispatch runs in a transaction.
    pub fn trigger(&self, name: &str, args: &[Value]) -> &Self {
        if self.inner.class.is_field_change_event(name) {
            self.transaction(|| {
                self.inner.events.trigger(self, name, args);
                self.mark_changed();
            });
        } else {
            self.inner.events.trigger(self, name, args);
        }
        self
    }

    pub fn remove_handler(&self, name: &str, handler: &ModelHandler) -> Option<ModelHandler> {
        self.inner.events.remove_handler(name, handler)
    }

    pub fn remove_handlers(&self, name: &str) {
        self.inner.events.remove_handlers(name);
    }

    #[must_use]
    pub fn has_handlers(&self, name: &str) -> bool {
        self.inner.events.has_handlers(name)
    }

    /// Declare an extra event name on this instance.
    pub fn has_event(&self, name: &str) -> &Self {
        self.inner.events.declare(name);
        self
    }

    /// Scoped `on`/`trigger` accessor for a declared event.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownEvent`] if `name` was never declared.
    pub fn event(&self, name: &str) -> Result<EventHandle<'_>, ModelError> {
        if !self.inner.events.is_declared(name) {
            return Err(ModelError::UnknownEvent {
                event: name.to_owned(),
            });
        }
        Ok(EventHandle {
            model: self,
            name: self.inner.events.declare(name),
        })
    }

    #[must_use]
    pub fn declared_events(&self) -> Vec<EventName> {
        self.inner.events.declared()
    }

    pub(crate) fn clear_handlers(&self) {
        self.inner.events.clear();
    }
}

/// Accessor bound to one declared field.
#[derive(Debug)]
pub struct Field<'a> {
    model: &'a Model,
    name: String,
}

impl Field<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.model.get(&self.name)
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.model.store_field(&self.name, value.into());
    }

    /// `noms` → `setNomsLater`.
    #[must_use]
    pub fn deferred_setter_name(&self) -> String {
        format!("set{}Later", camelize(&self.name, false))
    }

    pub fn set_later(&self, value: impl Into<Value>) {
        self.model.defer_store(&self.name, value.into());
    }

    pub fn on_change(&self, f: impl Fn(&Model, &[Value]) + 'static) -> &Self {
        self.model.on(&change_event(&self.name), f);
        self
    }

    pub fn trigger_change(&self, value: impl Into<Value>) {
        self.model
            .trigger(&change_event(&self.name), &[value.into()]);
    }

    /// Compare the current value with `other` using the field's equality.
    #[must_use]
    pub fn equals(&self, other: &Value) -> bool {
        let current = self.get().unwrap_or_default();
        self.model.class().equality_for(&self.name).eq(&current, other)
    }

    pub fn when_equal(&self, expected: impl Into<Value>, f: impl Fn(&Model) + 'static) {
        self.model.wait_for(&self.name, expected.into(), Rc::new(f));
    }

    pub fn whenever_equal(&self, expected: impl Into<Value>, f: impl Fn(&Model) + 'static) {
        self.model.watch_for(&self.name, expected.into(), Rc::new(f));
    }
}

/// Accessor bound to one declared event.
#[derive(Debug)]
pub struct EventHandle<'a> {
    model: &'a Model,
    name: EventName,
}

impl EventHandle<'_> {
    #[must_use]
    pub fn name(&self) -> &EventName {
        &self.name
    }

    pub fn on(&self, f: impl Fn(&Model, &[Value]) + 'static) -> &Self {
        self.model.on(self.name.as_str(), f);
        self
    }

    pub fn trigger(&self, args: &[Value]) -> &Self {
        self.model.trigger(self.name.as_str(), args);
        self
    }

    #[must_use]
    pub fn has_handlers(&self) -> bool {
        self.model.has_handlers(self.name.as_str())
    }
}
