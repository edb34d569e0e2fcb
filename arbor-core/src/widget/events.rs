//! Widget events and owned resources.
//!
//! Every widget is an event source. Listeners are registered per
//! [`EventKind`] and invoked in registration order. Emitting takes a
//! snapshot of the matching listeners first, so a listener may subscribe or
//! unsubscribe others while an event is being delivered.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::WidgetError;
use crate::properties::Properties;

/// Unique identifier for an event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload of a `PropertiesChanged` event.
#[derive(Debug, Clone)]
pub struct PropertiesChangeEvent {
    /// Names of the properties that changed, well-known fields included.
    pub changed_keys: Vec<String>,
    /// The properties after the update.
    pub properties: Rc<Properties>,
}

impl PropertiesChangeEvent {
    pub fn changed(&self, name: &str) -> bool {
        self.changed_keys.iter().any(|key| key == name)
    }
}

#[derive(Debug, Clone)]
pub enum WidgetEvent {
    /// The widget needs to render again.
    Invalidated,
    PropertiesChanged(PropertiesChangeEvent),
    ChildrenChanged,
    /// A non-fatal problem, rendering carried on.
    Error(WidgetError),
    Destroyed,
    /// A projector queued a frame for this widget.
    RenderScheduled,
    ProjectorAttached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Invalidated,
    PropertiesChanged,
    ChildrenChanged,
    Error,
    Destroyed,
    RenderScheduled,
    ProjectorAttached,
}

impl WidgetEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WidgetEvent::Invalidated => EventKind::Invalidated,
            WidgetEvent::PropertiesChanged(_) => EventKind::PropertiesChanged,
            WidgetEvent::ChildrenChanged => EventKind::ChildrenChanged,
            WidgetEvent::Error(_) => EventKind::Error,
            WidgetEvent::Destroyed => EventKind::Destroyed,
            WidgetEvent::RenderScheduled => EventKind::RenderScheduled,
            WidgetEvent::ProjectorAttached => EventKind::ProjectorAttached,
        }
    }
}

pub(crate) type Listener = Rc<dyn Fn(&WidgetEvent)>;

#[derive(Default)]
pub(crate) struct Evented {
    listeners: RefCell<Vec<(ListenerId, EventKind, Listener)>>,
}

impl Evented {
    pub(crate) fn on(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    pub(crate) fn off(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(listener_id, _, _)| *listener_id != id);
    }

    pub(crate) fn emit(&self, event: &WidgetEvent) {
        let kind = event.kind();
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        for listener in matching {
            listener(event);
        }
    }

    pub(crate) fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// A releasable resource.
///
/// Dropping a handle does not release it; call [`Handle::destroy`] or hand
/// it to a widget with `own` so it is released when the widget is.
pub struct Handle {
    release: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Handle {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            release: RefCell::new(Some(Box::new(release))),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self {
            release: RefCell::new(None),
        }
    }

    /// Release the resource. Idempotent.
    pub fn destroy(&self) {
        let release = self.release.borrow_mut().take();
        if let Some(release) = release {
            release();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.release.borrow().is_none()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
