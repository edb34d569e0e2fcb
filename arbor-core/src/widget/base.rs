//! Widget Node
//!
//! A [`WidgetHandle`] is a shared reference to one live widget instance. It
//! owns the instance's properties, children, cached render output and the
//! cache of child instances created while lowering its render tree.
//!
//! # Property update
//!
//! `set_properties` binds function values to the `bind` scope, diffs every
//! property name seen before or now, keeps only the names present in the new
//! set, and, when something changed, emits `PropertiesChanged`, runs the
//! `OnPropertiesChanged` aspects and marks the widget dirty. The result
//! becomes the new baseline for the next update.
//!
//! # Render
//!
//! `render` returns the cached output unless the widget is dirty. Otherwise
//! it folds the `BeforeRender` aspects over the widget's own render, folds
//! the `AfterRender` aspects over the produced tree, lowers the tree (child
//! widgets are reused from the child cache or created) and destroys every
//! child the pass did not use.
//!
//! # Ownership
//!
//! Parents hold their children strongly through the child cache. Children
//! only ever point back weakly: the invalidation listener, the default
//! `bind` scope and registry waiters all go through weak references, so a
//! late callback into a dropped or destroyed widget does nothing.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::aspects::{Aspect, AspectKind, DecoratorCache, RenderFn};
use crate::diff::{self, PropertyChangeRecord};
use crate::error::WidgetError;
use crate::node::{DNode, VElement, VNode, WNode, WidgetRef};
use crate::properties::{self, BoundFunctionCache, PropValue, Properties, Scope};
use crate::registry::{RegistryHandler, WidgetRegistry};

use super::child_cache::{ChildCache, SlotKey};
use super::context::{RenderContext, RenderGuard, RenderState};
use super::events::{EventKind, Evented, Handle, PropertiesChangeEvent, WidgetEvent};
use super::{Widget, WidgetConstructor};

/// Unique identifier for a widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State shared by every handle to one widget instance.
struct WidgetCore {
    id: WidgetId,
    /// The type this instance was created from.
    constructor: WidgetConstructor,
    /// User behaviour: render and teardown.
    implementation: Rc<dyn Widget>,
    events: Evented,
    render_state: Cell<RenderState>,
    /// Set by invalidation and by property or child changes, cleared when a
    /// render starts.
    dirty: Cell<bool>,
    destroyed: Cell<bool>,
    /// The properties as applied by the last update.
    properties: RefCell<Rc<Properties>>,
    /// Baseline for the next update. Equal to `properties` between updates.
    previous_properties: RefCell<Rc<Properties>>,
    /// Children passed down by the parent, empty entries removed.
    children: RefCell<Rc<[DNode]>>,
    /// `Some(output)` once rendered; the output itself may be empty.
    last_render: RefCell<Option<Option<VNode>>>,
    /// Child instances keyed by explicit key or by type.
    child_cache: RefCell<ChildCache>,
    /// Function properties bound to their `bind` scope, reused across updates.
    bound_functions: RefCell<BoundFunctionCache>,
    /// Type aspects plus those added to this instance.
    decorators: DecoratorCache,
    registries: RegistryHandler,
    /// Released on destroy.
    owned: RefCell<Vec<Handle>>,
    /// Per-type helper state, see [`WidgetHandle::meta`].
    meta: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
    /// Handed to registries as the waiter for unresolved labels.
    invalidator: Rc<dyn Fn()>,
}

/// A shared handle to a live widget instance.
///
/// Cloning shares the instance; equality is identity.
#[derive(Clone)]
pub struct WidgetHandle(Rc<WidgetCore>);

/// A non-owning [`WidgetHandle`]. Used wherever a widget is referred to from
/// below, so that children and callbacks never keep a parent alive.
#[derive(Clone)]
pub struct WeakWidget(Weak<WidgetCore>);

impl WeakWidget {
    pub fn upgrade(&self) -> Option<WidgetHandle> {
        self.0.upgrade().map(WidgetHandle)
    }

    pub fn ptr_eq(&self, other: &WeakWidget) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for WeakWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(widget) => write!(f, "WeakWidget({})", widget.id()),
            None => f.write_str("WeakWidget(<dropped>)"),
        }
    }
}

impl WidgetHandle {
    /// Create an instance of `constructor`. New widgets start dirty.
    pub fn new(constructor: &WidgetConstructor) -> Self {
        let core = Rc::new_cyclic(|weak: &Weak<WidgetCore>| {
            let weak = weak.clone();
            let invalidator: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(core) = weak.upgrade() {
                    WidgetHandle(core).invalidate();
                }
            });
            WidgetCore {
                id: WidgetId::new(),
                constructor: constructor.clone(),
                implementation: constructor.create(),
                events: Evented::default(),
                render_state: Cell::new(RenderState::Idle),
                dirty: Cell::new(true),
                destroyed: Cell::new(false),
                properties: RefCell::new(Rc::new(Properties::new())),
                previous_properties: RefCell::new(Rc::new(Properties::new())),
                children: RefCell::new(Rc::from(Vec::new())),
                last_render: RefCell::new(None),
                child_cache: RefCell::new(ChildCache::default()),
                bound_functions: RefCell::new(BoundFunctionCache::default()),
                decorators: DecoratorCache::new(Rc::clone(constructor.aspects())),
                registries: RegistryHandler::new(),
                owned: RefCell::new(Vec::new()),
                meta: RefCell::new(HashMap::new()),
                invalidator,
            }
        });
        trace!(widget = %core.id, ty = constructor.name(), "widget created");
        WidgetHandle(core)
    }

    pub fn id(&self) -> WidgetId {
        self.0.id
    }

    pub fn constructor(&self) -> &WidgetConstructor {
        &self.0.constructor
    }

    pub fn downgrade(&self) -> WeakWidget {
        WeakWidget(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &WidgetHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn properties(&self) -> Rc<Properties> {
        self.0.properties.borrow().clone()
    }

    /// The baseline the next property update is diffed against.
    pub fn previous_properties(&self) -> Rc<Properties> {
        self.0.previous_properties.borrow().clone()
    }

    pub fn children(&self) -> Rc<[DNode]> {
        self.0.children.borrow().clone()
    }

    /// Live child instances created by the last render passes.
    pub fn child_widgets(&self) -> Vec<WidgetHandle> {
        self.0.child_cache.borrow().widgets()
    }

    pub fn render_state(&self) -> RenderState {
        self.0.render_state.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    /// Local registry consulted before the global one.
    pub fn registry(&self) -> Option<WidgetRegistry> {
        self.0.registries.local()
    }

    /// Helper state of type `T` attached to this widget.
    ///
    /// Created with `T::default()` on first access and shared by later calls
    /// until the widget is destroyed. A destroyed widget hands out a fresh,
    /// unattached value.
    pub fn meta<T: Any + Default>(&self) -> Rc<T> {
        if self.is_destroyed() {
            return Rc::new(T::default());
        }
        let mut meta = self.0.meta.borrow_mut();
        let entry = meta
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Rc::new(T::default()) as Rc<dyn Any>);
        match Rc::clone(entry).downcast::<T>() {
            Ok(value) => value,
            Err(_) => {
                // Keys are the value's own TypeId.
                let value = Rc::new(T::default());
                *entry = Rc::clone(&value) as Rc<dyn Any>;
                value
            }
        }
    }

    /// Mark the widget dirty.
    ///
    /// While idle this emits `Invalidated` so that an owner can schedule a
    /// render. While applying properties or rendering the signal is
    /// suppressed. Destroyed widgets ignore invalidation.
    pub fn invalidate(&self) {
        if self.is_destroyed() {
            return;
        }
        self.0.dirty.set(true);
        match self.render_state() {
            RenderState::Idle => {
                trace!(widget = %self.id(), "invalidated");
                self.emit(WidgetEvent::Invalidated);
            }
            state => trace!(widget = %self.id(), ?state, "invalidation suppressed"),
        }
    }

    /// Apply a new property set.
    pub fn set_properties(&self, properties: Properties) {
        if self.is_destroyed() {
            return;
        }
        self.0.render_state.set(RenderState::ProcessingProperties);

        let mut properties = properties;
        self.0.bound_functions.borrow_mut().bind_all(&mut properties);

        let previous = self.previous_properties();
        let mut changed_keys = Vec::new();

        if previous.key() != properties.key() {
            changed_keys.push(properties::KEY.to_string());
        }
        let same_bind = match (previous.bind(), properties.bind()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        };
        if !same_bind {
            changed_keys.push(properties::BIND.to_string());
        }
        let same_registry = match (previous.registry(), properties.registry()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        };
        if !same_registry {
            changed_keys.push(properties::REGISTRY.to_string());
            self.0.registries.set_local(properties.registry().cloned());
        }

        let diff_aspects = self.0.decorators.get(AspectKind::DiffProperty);
        let added: Vec<&str> = properties
            .names()
            .filter(|name| !previous.contains(name))
            .collect();
        let mut records = IndexMap::with_capacity(previous.len() + added.len());

        for name in previous.names().chain(added) {
            let record = self.diff_property(&diff_aspects, name, previous.get(name), properties.get(name));
            if record.changed {
                changed_keys.push(name.to_string());
            }
            records.insert(name, record);
        }

        let mut values = IndexMap::with_capacity(properties.len());
        for (name, new) in properties.iter() {
            let value = records
                .swap_remove(name)
                .and_then(|record| record.value)
                .unwrap_or_else(|| new.clone());
            values.insert(name.to_string(), value);
        }

        let properties = Rc::new(Properties::with_values(
            properties.key().cloned(),
            properties.bind().cloned(),
            properties.registry().cloned(),
            values,
        ));
        *self.0.properties.borrow_mut() = Rc::clone(&properties);

        if !changed_keys.is_empty() {
            debug!(widget = %self.id(), changed = ?changed_keys, "properties changed");
            let event = PropertiesChangeEvent {
                changed_keys,
                properties: Rc::clone(&properties),
            };
            self.emit(WidgetEvent::PropertiesChanged(event.clone()));
            for aspect in self.0.decorators.get(AspectKind::OnPropertiesChanged).iter() {
                if let Aspect::OnPropertiesChanged(listener) = aspect {
                    listener(self, &event);
                }
            }
            self.0.dirty.set(true);
        }

        *self.0.previous_properties.borrow_mut() = properties;
    }

    /// Run the configured comparisons for `name`, stopping at the first that
    /// reports a change. Unconfigured names use the auto strategy.
    fn diff_property(
        &self,
        aspects: &[Aspect],
        name: &str,
        old: Option<&PropValue>,
        new: Option<&PropValue>,
    ) -> PropertyChangeRecord {
        let mut result = None;
        let configs = aspects.iter().filter_map(|aspect| match aspect {
            Aspect::DiffProperty(config) if &*config.property_name == name => Some(config),
            _ => None,
        });
        for config in configs {
            let custom = config.diff_function.as_ref().map(|function| (function, self));
            let record = diff::diff(config.diff_type, old, new, custom);
            let changed = record.changed;
            result = Some(record);
            if changed {
                break;
            }
        }
        result.unwrap_or_else(|| diff::auto(old, new))
    }

    /// Replace the children passed down by the parent.
    ///
    /// Empty entries are dropped. Going from no children to no children
    /// leaves the widget clean.
    pub fn set_children(&self, children: Vec<DNode>) {
        if self.is_destroyed() {
            return;
        }
        let children: Vec<DNode> = children.into_iter().filter(|child| !child.is_empty()).collect();
        if children.is_empty() && self.0.children.borrow().is_empty() {
            return;
        }
        *self.0.children.borrow_mut() = Rc::from(children);
        self.0.dirty.set(true);
        self.emit(WidgetEvent::ChildrenChanged);
    }

    /// Render the widget, reusing the cached output when clean.
    pub fn render(&self) -> Option<VNode> {
        if self.is_destroyed() {
            return None;
        }
        if self.render_state() == RenderState::Rendering {
            warn!(widget = %self.id(), "render re-entered, returning the previous output");
            return self.0.last_render.borrow().clone().flatten();
        }
        if !self.is_dirty() {
            if let Some(cached) = self.0.last_render.borrow().clone() {
                self.0.render_state.set(RenderState::Idle);
                return cached;
            }
        }

        let _guard = RenderGuard::enter(&self.0.render_state);
        self.0.dirty.set(false);
        trace!(widget = %self.id(), ty = self.0.constructor.name(), "render");

        let ctx = RenderContext::new(self.clone(), self.properties(), self.children());
        let implementation = Rc::clone(&self.0.implementation);
        let own_ctx = ctx.clone();
        let mut render: RenderFn = Rc::new(move || implementation.render(&own_ctx));
        for aspect in self.0.decorators.get(AspectKind::BeforeRender).iter() {
            if let Aspect::BeforeRender(reducer) = aspect {
                render = reducer(&ctx, render);
            }
        }

        let mut dnode = render();
        for aspect in self.0.decorators.get(AspectKind::AfterRender).iter() {
            if let Aspect::AfterRender(transform) = aspect {
                dnode = transform(&ctx, dnode);
            }
        }
        drop(ctx);

        let vnode = self.lower(dnode);
        self.manage_detached_children();
        *self.0.last_render.borrow_mut() = Some(vnode.clone());
        vnode
    }

    fn lower(&self, node: DNode) -> Option<VNode> {
        match node {
            DNode::Empty => None,
            DNode::Text(text) => Some(VNode::Text(text)),
            DNode::Element(mut element) => {
                let children = std::mem::take(&mut element.children)
                    .into_iter()
                    .filter_map(|child| self.lower(child))
                    .collect();
                let element = VElement::realize(element, children, Some(Scope::widget(self)));
                Some(VNode::Element(Rc::new(element)))
            }
            DNode::Widget(description) => self.lower_widget(description),
        }
    }

    fn lower_widget(&self, description: WNode) -> Option<VNode> {
        let WNode {
            widget,
            mut properties,
            children,
        } = description;

        let constructor = match widget {
            WidgetRef::Constructor(constructor) => constructor,
            WidgetRef::Label(label) => match self.0.registries.get(&label, &self.0.invalidator) {
                Some(constructor) => constructor,
                None => {
                    trace!(widget = %self.id(), %label, "widget not yet resolved");
                    return None;
                }
            },
        };

        if properties.bind().is_none() {
            properties.set_bind(Scope::widget(self));
        }

        let explicit_key = properties.key().cloned();
        let slot = match &explicit_key {
            Some(key) => SlotKey::Key(key.clone()),
            None => SlotKey::Constructor(constructor.clone()),
        };

        let claimed = self.0.child_cache.borrow_mut().claim(&slot, &constructor);
        let child = match claimed {
            Some(child) => child,
            None => {
                let child = WidgetHandle::new(&constructor);
                let parent = self.downgrade();
                child.on(EventKind::Invalidated, move |_| {
                    if let Some(parent) = parent.upgrade() {
                        parent.invalidate();
                    }
                });
                debug!(parent = %self.id(), child = %child.id(), ty = constructor.name(), key = ?explicit_key, "child created");
                self.0
                    .child_cache
                    .borrow_mut()
                    .insert(slot.clone(), child.clone(), constructor.clone());
                child
            }
        };

        if explicit_key.is_none() && self.0.child_cache.borrow().slot_len(&slot) > 1 {
            let error = WidgetError::AmbiguousChild {
                widget: constructor.name().to_string(),
            };
            warn!(widget = %self.id(), child = constructor.name(), "{error}");
            self.emit(WidgetEvent::Error(error));
        }

        child.set_properties(properties);
        child.set_children(children);
        child.render()
    }

    fn manage_detached_children(&self) {
        let stale = self.0.child_cache.borrow_mut().sweep();
        for child in stale {
            debug!(parent = %self.id(), child = %child.id(), "child detached");
            child.destroy();
        }
    }

    /// Listen for events of `kind`. The listener stays registered until the
    /// returned handle is destroyed or the widget is.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Handle
    where
        F: Fn(&WidgetEvent) + 'static,
    {
        if self.is_destroyed() {
            return Handle::noop();
        }
        let id = self.0.events.on(kind, Rc::new(listener));
        let widget = self.downgrade();
        Handle::new(move || {
            if let Some(widget) = widget.upgrade() {
                widget.0.events.off(id);
            }
        })
    }

    pub fn emit(&self, event: WidgetEvent) {
        self.0.events.emit(&event);
    }

    /// Tie `handle` to this widget's lifetime. A destroyed widget releases
    /// it immediately.
    pub fn own(&self, handle: Handle) {
        if self.is_destroyed() {
            handle.destroy();
        } else {
            self.0.owned.borrow_mut().push(handle);
        }
    }

    /// Add an aspect to this instance only.
    pub fn add_decorator(&self, aspect: Aspect) {
        self.0.decorators.add(aspect);
    }

    /// The aspects of `kind` in effect for this instance, base type first.
    pub fn get_decorator(&self, kind: AspectKind) -> Rc<[Aspect]> {
        self.0.decorators.get(kind)
    }

    /// Destroy the widget, its owned handles and every child instance.
    ///
    /// Idempotent: `Destroyed` is emitted once.
    pub fn destroy(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }
        debug!(widget = %self.id(), ty = self.0.constructor.name(), "destroy");

        self.0.implementation.on_destroy();

        let owned = std::mem::take(&mut *self.0.owned.borrow_mut());
        for handle in owned {
            handle.destroy();
        }
        let children = self.0.child_cache.borrow_mut().drain();
        for child in children {
            child.destroy();
        }

        self.0.registries.clear();
        self.0.meta.borrow_mut().clear();

        self.emit(WidgetEvent::Destroyed);
        self.0.events.clear();
        self.0.last_render.borrow_mut().take();
    }
}

impl fmt::Debug for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHandle")
            .field("id", &self.0.id)
            .field("type", &self.0.constructor.name())
            .field("dirty", &self.0.dirty.get())
            .field("destroyed", &self.0.destroyed.get())
            .finish()
    }
}

impl PartialEq for WidgetHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for WidgetHandle {}
