#![forbid(unsafe_code)]

//! Transactional, observable attribute stores.
//!
//! A [`ModelClass`] declares fields and events; its instances ([`Model`])
//! hold field values, notify `<field>_change` handlers when a value really
//! changes, and coalesce everything that happens inside one mutating call
//! into a single aggregate `change`.
//!
//! On top of the store:
//!
//! - [`Model::deep_clone`] copies a model graph, cycles included.
//! - [`Model::refill`] reconciles a JSON-shaped document into a live graph,
//!   keeping nested models by identity.
//! - [`Model::when_equal`] / [`Model::whenever_equal`] wait for a field value.
//! - [`Model::set_later`] defers an assignment to a cooperative [`Scheduler`].
//!
//! Everything is single-threaded (`Rc`/`RefCell`); handlers may freely
//! re-enter the model they are attached to.

pub mod clone;
pub mod config;
pub mod equality;
pub mod error;
pub mod event;
pub mod fill;
pub mod inflect;
pub mod lifecycle;
pub mod model;
pub mod scheduler;
mod transaction;
pub mod value;
pub mod wait;

pub use clone::{CloneCache, clone_value};
pub use config::{MAX_DRAIN_ROUNDS_ENV, ModelConfig};
pub use equality::Equality;
pub use error::ModelError;
pub use event::{EventName, EventRegistry, Handler};
pub use fill::{Constructor, FieldKind, FillSpec, Refill};
pub use inflect::{camelize, underscore};
pub use model::{
    CHANGE, DESTROY, EventHandle, Field, Model, ModelClass, ModelClassBuilder, ModelHandler,
    WeakModel, change_event,
};
pub use scheduler::Scheduler;
pub use value::{Record, Value};
