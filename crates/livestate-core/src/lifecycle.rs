#![forbid(unsafe_code)]

//! Teardown: the `destroy` event and subscriptions tied to it.

use tracing::debug;

use crate::model::{DESTROY, Model, ModelHandler};
use crate::value::Value;

impl Model {
    /// Fire `destroy`, then drop every handler and pending waiter
    /// registered on this model.
    pub fn destroy(&self) {
        debug!(class = self.class().name(), "destroy");
        self.trigger(DESTROY, &[]);
        self.clear_handlers();
        self.waiters().borrow_mut().clear();
    }

    pub fn on_destroy(&self, f: impl Fn(&Model, &[Value]) + 'static) -> &Self {
        self.on(DESTROY, f)
    }

    /// Register `f` for `event` on `other` until this model is destroyed.
    pub fn listen_until_destroyed(
        &self,
        other: &Model,
        event: &str,
        f: impl Fn(&Model, &[Value]) + 'static,
    ) -> &Self {
        let handler = ModelHandler::new(f);
        other.on_handler(event, handler.clone());
        let other = other.downgrade();
        let event = event.to_owned();
        self.on_destroy(move |_, _| {
            if let Some(other) = other.upgrade() {
                other.remove_handler(&event, &handler);
            }
        })
    }

    /// Destroy `child` whenever this model is destroyed.
    pub fn chain_destroy(&self, child: &Model) -> &Self {
        let child = child.clone();
        self.on_destroy(move |_, _| child.destroy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelClass;
    use std::cell::Cell;
    use std::rc::Rc;

    fn widget() -> Model {
        ModelClass::from_attributes("widget", ["visible"]).instantiate()
    }

    #[test]
    fn listener_is_removed_on_destroy() {
        let sidebar = widget();
        let source = widget();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        sidebar.listen_until_destroyed(&source, "visible_change", move |_, _| c.set(c.get() + 1));
        source.set("visible", true).unwrap();
        assert_eq!(count.get(), 1);
        sidebar.destroy();
        source.set("visible", false).unwrap();
        assert_eq!(count.get(), 1);
        assert!(!source.has_handlers("visible_change"));
    }

    #[test]
    fn destroy_fires_once_then_clears_handlers() {
        let m = widget();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        m.on_destroy(move |_, _| c.set(c.get() + 1));
        m.destroy();
        m.destroy();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn chained_children_are_destroyed() {
        let parent = widget();
        let child = widget();
        let destroyed = Rc::new(Cell::new(false));
        let d = Rc::clone(&destroyed);
        child.on_destroy(move |_, _| d.set(true));
        parent.chain_destroy(&child);
        parent.destroy();
        assert!(destroyed.get());
    }

    #[test]
    fn source_dropped_before_destroy_is_fine() {
        let sidebar = widget();
        let source = widget();
        sidebar.listen_until_destroyed(&source, "visible_change", |_, _| {});
        drop(source);
        sidebar.destroy();
    }
}
