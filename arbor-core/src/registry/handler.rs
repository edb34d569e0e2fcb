//! Registry lookup for one widget.
//!
//! A widget resolves labels against its local registry (taken from the
//! `registry` property) first and the thread's global registry second.
//!
//! An unresolved label is waited on in both. The handler registers one
//! waiter per label, and the first registry to resolve the label withdraws
//! it from the others, so a later definition elsewhere does not invalidate
//! the widget a second time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::{global_registry, Waiter, WidgetRegistry};
use crate::widget::WidgetConstructor;

#[derive(Default)]
struct HandlerState {
    local: RefCell<Option<WidgetRegistry>>,
    /// Labels still unresolved, with the waiter registered for each.
    waiting: RefCell<HashMap<Rc<str>, Waiter>>,
}

impl HandlerState {
    fn registries(&self) -> impl Iterator<Item = WidgetRegistry> {
        let local = self.local.borrow().clone();
        local.into_iter().chain(std::iter::once(global_registry()))
    }

    /// Stop waiting on `label` everywhere.
    fn settle(&self, label: &str) {
        let waiter = self.waiting.borrow_mut().remove(label);
        if let Some(waiter) = waiter {
            for registry in self.registries() {
                registry.forget(label, &waiter);
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct RegistryHandler {
    state: Rc<HandlerState>,
}

impl RegistryHandler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn local(&self) -> Option<WidgetRegistry> {
        self.state.local.borrow().clone()
    }

    /// Swap the local registry. Waits registered with the old one are
    /// withdrawn.
    pub(crate) fn set_local(&self, registry: Option<WidgetRegistry>) {
        let old = self.state.local.replace(registry);
        if let Some(old) = old {
            for (label, waiter) in self.state.waiting.borrow().iter() {
                old.forget(label, waiter);
            }
        }
    }

    /// Resolve `label`, local registry first.
    ///
    /// When neither registry has it, `invalidate` runs once the first of
    /// them resolves it.
    pub(crate) fn get(&self, label: &str, invalidate: &Waiter) -> Option<WidgetConstructor> {
        let local = self.local();
        let global = global_registry();

        if let Some(local) = &local {
            if local.has(label) {
                return local.get(label, None);
            }
        }
        if global.has(label) {
            return global.get(label, None);
        }

        let waiter = self.waiter_for(label, invalidate);
        if let Some(local) = &local {
            local.get(label, Some(&waiter));
        }
        global.get(label, Some(&waiter))
    }

    /// Withdraw every outstanding wait.
    pub(crate) fn clear(&self) {
        let labels: Vec<Rc<str>> = self.state.waiting.borrow().keys().cloned().collect();
        for label in labels {
            self.state.settle(&label);
        }
    }

    fn waiter_for(&self, label: &str, invalidate: &Waiter) -> Waiter {
        if let Some(waiter) = self.state.waiting.borrow().get(label) {
            return Rc::clone(waiter);
        }
        let key: Rc<str> = label.into();
        let state: Weak<HandlerState> = Rc::downgrade(&self.state);
        let invalidate = Rc::clone(invalidate);
        let label = Rc::clone(&key);
        let waiter: Waiter = Rc::new(move || {
            if let Some(state) = state.upgrade() {
                state.settle(&label);
            }
            invalidate();
        });
        self.state.waiting.borrow_mut().insert(key, Rc::clone(&waiter));
        waiter
    }

    #[cfg(test)]
    fn waiting(&self) -> usize {
        self.state.waiting.borrow().len()
    }
}
