//! Label to widget-type resolution.
//!
//! # Entry states
//!
//! - `Waiting`: someone asked for the label before it was defined. Only the
//!   waiters are recorded.
//! - `Deferred`: defined with a factory that has not been called yet. The
//!   factory runs on the first `get` (or `when_defined`), at most once.
//! - `Resolving`: an asynchronous resolution is in flight on the local
//!   scheduler.
//! - `Resolved`: a concrete constructor. Waiters were fired once and
//!   dropped.
//!
//! No borrow of the registry is held while a waiter or factory runs, so
//! either may call back into the registry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures_channel::oneshot;
use futures_util::future::{self, FutureExt, LocalBoxFuture};
use tracing::{debug, trace};

use crate::error::{Result, WidgetError};
use crate::projector::scheduler;
use crate::widget::WidgetConstructor;

/// A waiter fired once when its label resolves.
pub type Waiter = Rc<dyn Fn()>;

pub type ConstructorFuture = LocalBoxFuture<'static, WidgetConstructor>;

/// What a label can be defined with.
pub enum RegistryItem {
    Constructor(WidgetConstructor),
    /// An in-flight resolution, started as soon as it is defined.
    Pending(ConstructorFuture),
    /// Produces the resolution when the label is first needed.
    Factory(Box<dyn FnOnce() -> ConstructorFuture>),
}

impl RegistryItem {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = WidgetConstructor> + 'static,
    {
        RegistryItem::Pending(future.boxed_local())
    }

    pub fn factory<F, Fut>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = WidgetConstructor> + 'static,
    {
        RegistryItem::Factory(Box::new(move || factory().boxed_local()))
    }
}

impl From<WidgetConstructor> for RegistryItem {
    fn from(value: WidgetConstructor) -> Self {
        RegistryItem::Constructor(value)
    }
}

impl fmt::Debug for RegistryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryItem::Constructor(ctor) => f.debug_tuple("Constructor").field(ctor).finish(),
            RegistryItem::Pending(_) => f.write_str("Pending(..)"),
            RegistryItem::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

enum EntryState {
    Waiting,
    Deferred(Box<dyn FnOnce() -> ConstructorFuture>),
    Resolving,
    Resolved(WidgetConstructor),
}

struct Entry {
    state: EntryState,
    waiters: Vec<Waiter>,
    listeners: Vec<oneshot::Sender<WidgetConstructor>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            state: EntryState::Waiting,
            waiters: Vec::new(),
            listeners: Vec::new(),
        }
    }

    fn add_waiter(&mut self, waiter: &Waiter) {
        let known = self
            .waiters
            .iter()
            .any(|existing| std::ptr::addr_eq(Rc::as_ptr(existing), Rc::as_ptr(waiter)));
        if !known {
            self.waiters.push(Rc::clone(waiter));
        }
    }

    fn remove_waiter(&mut self, waiter: &Waiter) {
        self.waiters
            .retain(|existing| !std::ptr::addr_eq(Rc::as_ptr(existing), Rc::as_ptr(waiter)));
    }

    /// Take the factory of a deferred entry, moving it to `Resolving`.
    fn start(&mut self) -> Option<Box<dyn FnOnce() -> ConstructorFuture>> {
        match std::mem::replace(&mut self.state, EntryState::Resolving) {
            EntryState::Deferred(factory) => Some(factory),
            other => {
                self.state = other;
                None
            }
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<Rc<str>, Entry>,
}

/// A label to widget-type registry.
///
/// Cloning shares the registry; equality is identity.
#[derive(Clone, Default)]
pub struct WidgetRegistry(Rc<RefCell<RegistryInner>>);

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `label`.
    ///
    /// Fails if the label already holds an item, resolved or not. Waiters
    /// registered before the definition fire once it resolves.
    pub fn define(&self, label: &str, item: impl Into<RegistryItem>) -> Result<()> {
        let item = item.into();
        let start = {
            let mut inner = self.0.borrow_mut();
            let entry = inner.entries.entry(label.into()).or_insert_with(Entry::new);
            if !matches!(entry.state, EntryState::Waiting) {
                return Err(WidgetError::AlreadyRegistered {
                    label: label.to_string(),
                });
            }
            debug!(label, ?item, "define");
            match item {
                RegistryItem::Constructor(constructor) => {
                    drop(inner);
                    self.resolve(label, constructor);
                    None
                }
                RegistryItem::Pending(future) => {
                    entry.state = EntryState::Resolving;
                    Some(future)
                }
                RegistryItem::Factory(factory) => {
                    if entry.waiters.is_empty() && entry.listeners.is_empty() {
                        entry.state = EntryState::Deferred(factory);
                        None
                    } else {
                        entry.state = EntryState::Resolving;
                        drop(inner);
                        Some(factory())
                    }
                }
            }
        };
        if let Some(future) = start {
            self.spawn_resolution(label, future);
        }
        Ok(())
    }

    /// The constructor for `label`, if resolved.
    ///
    /// Otherwise `waiter` is recorded (once per waiter) to fire when the
    /// label resolves, a deferred factory is started, and `None` is
    /// returned. Never blocks.
    pub fn get(&self, label: &str, waiter: Option<&Waiter>) -> Option<WidgetConstructor> {
        let factory = {
            let mut inner = self.0.borrow_mut();
            if let Some(Entry {
                state: EntryState::Resolved(constructor),
                ..
            }) = inner.entries.get(label)
            {
                return Some(constructor.clone());
            }
            match waiter {
                Some(waiter) => {
                    let entry = inner.entries.entry(label.into()).or_insert_with(Entry::new);
                    entry.add_waiter(waiter);
                    entry.start()
                }
                // Without a waiter a deferred factory still starts.
                None => inner.entries.get_mut(label).and_then(Entry::start),
            }
        };
        if let Some(factory) = factory {
            self.spawn_resolution(label, factory());
        }
        None
    }

    /// Whether `label` is resolved to a constructor.
    pub fn has(&self, label: &str) -> bool {
        matches!(
            self.0.borrow().entries.get(label),
            Some(Entry {
                state: EntryState::Resolved(_),
                ..
            })
        )
    }

    /// Resolve to the constructor for `label` once it is available.
    ///
    /// Starts a deferred factory. The future yields `None` if the registry
    /// is dropped before the label resolves.
    pub fn when_defined(&self, label: &str) -> LocalBoxFuture<'static, Option<WidgetConstructor>> {
        let (factory, receiver) = {
            let mut inner = self.0.borrow_mut();
            let entry = inner.entries.entry(label.into()).or_insert_with(Entry::new);
            if let EntryState::Resolved(constructor) = &entry.state {
                return future::ready(Some(constructor.clone())).boxed_local();
            }
            let (sender, receiver) = oneshot::channel();
            entry.listeners.push(sender);
            (entry.start(), receiver)
        };
        if let Some(factory) = factory {
            self.spawn_resolution(label, factory());
        }
        async move { receiver.await.ok() }.boxed_local()
    }

    /// Withdraw `waiter` from `label`.
    ///
    /// A label nobody defined and nobody waits on any more is dropped.
    pub fn forget(&self, label: &str, waiter: &Waiter) {
        let mut inner = self.0.borrow_mut();
        let Some(entry) = inner.entries.get_mut(label) else {
            return;
        };
        entry.remove_waiter(waiter);
        if matches!(entry.state, EntryState::Waiting) && entry.waiters.is_empty() && entry.listeners.is_empty() {
            inner.entries.remove(label);
            trace!(label, "waiting entry dropped");
        }
    }

    /// Labels with an entry, resolved or not.
    pub fn labels(&self) -> Vec<String> {
        self.0.borrow().entries.keys().map(|label| label.to_string()).collect()
    }

    pub fn ptr_eq(&self, other: &WidgetRegistry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn spawn_resolution(&self, label: &str, future: ConstructorFuture) {
        let registry: Weak<RefCell<RegistryInner>> = Rc::downgrade(&self.0);
        let label: Rc<str> = label.into();
        trace!(label = &*label, "resolution started");
        scheduler::spawn_local(async move {
            let constructor = future.await;
            match registry.upgrade() {
                Some(inner) => WidgetRegistry(inner).resolve(&label, constructor),
                None => trace!(label = &*label, "registry dropped before resolution"),
            }
        });
    }

    fn resolve(&self, label: &str, constructor: WidgetConstructor) {
        let (waiters, listeners) = {
            let mut inner = self.0.borrow_mut();
            let entry = inner.entries.entry(label.into()).or_insert_with(Entry::new);
            entry.state = EntryState::Resolved(constructor.clone());
            (
                std::mem::take(&mut entry.waiters),
                std::mem::take(&mut entry.listeners),
            )
        };
        debug!(label, ty = constructor.name(), waiters = waiters.len(), "resolved");
        for waiter in waiters {
            waiter();
        }
        for listener in listeners {
            let _ = listener.send(constructor.clone());
        }
    }
}

impl PartialEq for WidgetRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        let mut map = f.debug_map();
        for (label, entry) in &inner.entries {
            let state = match entry.state {
                EntryState::Waiting => "waiting",
                EntryState::Deferred(_) => "deferred",
                EntryState::Resolving => "resolving",
                EntryState::Resolved(_) => "resolved",
            };
            map.entry(label, &state);
        }
        map.finish()
    }
}

thread_local! {
    static GLOBAL: WidgetRegistry = WidgetRegistry::new();
}

/// The registry every widget falls back to.
pub fn global_registry() -> WidgetRegistry {
    GLOBAL.with(WidgetRegistry::clone)
}
