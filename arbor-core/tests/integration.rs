//! Integration Tests for the Widget Core
//!
//! These tests drive widgets, registries and the projector together through
//! the public API only.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures_channel::oneshot;

use arbor_core::prelude::*;
use arbor_core::projector::{scheduler, AttachType, ProjectorState};

struct Item;

impl Widget for Item {
    fn render(&self, ctx: &RenderContext) -> DNode {
        let value = ctx.property("value").and_then(|p| p.as_i64()).unwrap_or_default();
        v("li").child(value.to_string()).into()
    }
}

fn item() -> WidgetConstructor {
    WidgetConstructor::new("Item", || Item)
}

struct List {
    item: WidgetConstructor,
    rows: Rc<RefCell<Vec<(&'static str, i64)>>>,
}

impl Widget for List {
    fn render(&self, _ctx: &RenderContext) -> DNode {
        let rows = self.rows.borrow();
        v("ul")
            .children(
                rows.iter()
                    .map(|(key, value)| w(&self.item, Properties::new().with_key(*key).with("value", *value))),
            )
            .into()
    }
}

fn counter(widget: &WidgetHandle, kind: EventKind) -> Rc<Cell<usize>> {
    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    let _ = widget.on(kind, move |_| h.set(h.get() + 1));
    hits
}

fn keyed(widget: &WidgetHandle, key: &str) -> Option<WidgetHandle> {
    let key = Key::from(key);
    widget
        .child_widgets()
        .into_iter()
        .find(|child| child.properties().key() == Some(&key))
}

/// Test that the previous-properties baseline is exactly the latest update.
#[test]
fn previous_properties_track_latest_update() {
    common::init_tracing();
    let widget = WidgetHandle::new(&item());

    let changes = Rc::new(RefCell::new(Vec::new()));
    let c = changes.clone();
    let _ = widget.on(EventKind::PropertiesChanged, move |event| {
        if let WidgetEvent::PropertiesChanged(change) = event {
            c.borrow_mut().push(change.changed_keys.clone());
        }
    });

    widget.set_properties(Properties::new().with("value", 1).with("label", "one"));
    widget.set_properties(Properties::new().with("value", 1));

    let previous = widget.previous_properties();
    assert_eq!(previous.len(), 1);
    assert!(!previous.contains("label"));
    assert_eq!(
        *changes.borrow(),
        vec![vec!["value".to_string(), "label".to_string()], vec!["label".to_string()]]
    );
}

/// Test that base after-render hooks feed the derived type's hooks.
#[test]
fn after_render_hooks_run_base_first() {
    common::init_tracing();
    fn tag(label: &'static str) -> impl Fn(&RenderContext, DNode) -> DNode {
        move |_, node| match node {
            DNode::Element(element) => element.child(label).into(),
            other => other,
        }
    }

    let base = WidgetConstructor::builder("Base")
        .factory(|| Item)
        .after_render(tag("-base"))
        .build();
    let derived = WidgetConstructor::builder("Derived")
        .extends(&base)
        .after_render(tag("-derived"))
        .build();

    let widget = WidgetHandle::new(&derived);
    widget.set_properties(Properties::new().with("value", 7));
    let output = widget.render().unwrap();
    assert_eq!(output.as_element().unwrap().text(), "7-base-derived");
}

/// Test registry definition, lookup and waiter notification.
#[test]
fn registry_notifies_waiters_once() {
    common::init_tracing();
    let registry = WidgetRegistry::new();
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    let waiter: arbor_core::registry::Waiter = Rc::new(move || f.set(f.get() + 1));

    assert!(registry.get("list-item", Some(&waiter)).is_none());
    assert!(registry.get("list-item", Some(&waiter)).is_none());
    registry.define("list-item", item()).unwrap();

    assert_eq!(fired.get(), 1);
    assert!(registry.has("list-item"));
    assert_eq!(registry.get("list-item", None).unwrap().name(), "Item");
    assert_eq!(
        registry.define("list-item", item()),
        Err(WidgetError::AlreadyRegistered {
            label: "list-item".into()
        })
    );
}

/// Test that a factory resolves through the local scheduler.
#[test]
fn factory_resolves_for_when_defined() {
    common::init_tracing();
    let registry = WidgetRegistry::new();
    registry
        .define("lazy-item", RegistryItem::factory(|| async { item() }))
        .unwrap();
    assert!(!registry.has("lazy-item"));

    let seen = Rc::new(RefCell::new(None));
    let s = seen.clone();
    let resolving = registry.when_defined("lazy-item");
    scheduler::spawn_local(async move {
        *s.borrow_mut() = resolving.await.map(|ctor| ctor.name().to_string());
    });
    scheduler::run_until_stalled();

    assert_eq!(seen.borrow().as_deref(), Some("Item"));
    assert!(registry.has("lazy-item"));
}

/// Test that rendering twice without changes returns the cached output.
#[test]
fn render_is_idempotent() {
    common::init_tracing();
    let widget = WidgetHandle::new(&item());
    widget.set_properties(Properties::new().with("value", 1));

    let first = widget.render().unwrap();
    let second = widget.render().unwrap();
    assert!(first.ptr_eq(&second));

    widget.set_properties(Properties::new().with("value", 1));
    assert!(widget.render().unwrap().ptr_eq(&first));
}

/// Test keyed child identity across renders and destruction of stale keys.
#[test]
fn keyed_children_survive_and_stale_ones_are_destroyed_once() {
    common::init_tracing();
    let rows = Rc::new(RefCell::new(vec![("a", 1), ("b", 2)]));
    let list = {
        let rows = rows.clone();
        let item = item();
        WidgetConstructor::new("List", move || List {
            item: item.clone(),
            rows: rows.clone(),
        })
    };
    let parent = WidgetHandle::new(&list);

    let output = parent.render().unwrap();
    assert_eq!(output.as_element().unwrap().children.len(), 2);
    let a = keyed(&parent, "a").unwrap();
    let b = keyed(&parent, "b").unwrap();
    let b_destroyed = counter(&b, EventKind::Destroyed);

    *rows.borrow_mut() = vec![("a", 3)];
    parent.invalidate();
    let output = parent.render().unwrap();

    let kept = keyed(&parent, "a").unwrap();
    assert!(kept.ptr_eq(&a));
    assert_eq!(kept.properties().get("value").and_then(|p| p.as_i64()), Some(3));
    assert_eq!(output.as_element().unwrap().children[0].as_element().unwrap().text(), "3");
    assert!(b.is_destroyed());
    assert_eq!(b_destroyed.get(), 1);
    assert!(keyed(&parent, "b").is_none());

    parent.destroy();
    assert!(a.is_destroyed());
    assert_eq!(b_destroyed.get(), 1);

    *rows.borrow_mut() = vec![("b", 4)];
    let fresh = WidgetHandle::new(&list);
    let _ = fresh.render();
    assert!(!keyed(&fresh, "b").unwrap().ptr_eq(&b));
}

/// Test that a label resolved later invalidates the widget that asked for it.
#[test]
fn pending_label_renders_after_resolution() {
    common::init_tracing();
    let registry = WidgetRegistry::new();
    let (sender, receiver) = oneshot::channel::<WidgetConstructor>();
    registry
        .define("widget-x", RegistryItem::pending(async move { receiver.await.unwrap() }))
        .unwrap();

    let host = WidgetConstructor::builder("Host")
        .factory(|| Host)
        .build();
    let widget = WidgetHandle::new(&host);
    widget.set_properties(Properties::new().with_registry(registry.clone()));
    let invalidated = counter(&widget, EventKind::Invalidated);

    let output = widget.render().unwrap();
    assert!(output.as_element().unwrap().children.is_empty());
    assert_eq!(invalidated.get(), 0);

    sender.send(item()).unwrap();
    scheduler::run_until_stalled();
    assert_eq!(invalidated.get(), 1);
    assert!(widget.is_dirty());

    let output = widget.render().unwrap();
    let children = &output.as_element().unwrap().children;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].as_element().unwrap().tag, "li");
}

struct Host;

impl Widget for Host {
    fn render(&self, _ctx: &RenderContext) -> DNode {
        v("div").child(w("widget-x", Properties::new().with("value", 5))).into()
    }
}

/// Renders whatever `label` resolves to.
struct Slot(&'static str);

impl Widget for Slot {
    fn render(&self, _ctx: &RenderContext) -> DNode {
        v("div").child(w(self.0, Properties::new().with("value", 1))).into()
    }
}

fn slot(label: &'static str) -> WidgetConstructor {
    WidgetConstructor::new("Slot", move || Slot(label))
}

/// Test that a label resolved locally is no longer waited on globally.
#[test]
fn label_resolved_locally_ignores_later_global_definition() {
    common::init_tracing();
    let local = WidgetRegistry::new();
    let widget = WidgetHandle::new(&slot("slot-local-first"));
    widget.set_properties(Properties::new().with_registry(local.clone()));
    let invalidated = counter(&widget, EventKind::Invalidated);

    let _ = widget.render();
    local.define("slot-local-first", item()).unwrap();
    assert_eq!(invalidated.get(), 1);

    let output = widget.render().unwrap();
    assert_eq!(output.as_element().unwrap().children.len(), 1);

    global_registry()
        .define("slot-local-first", WidgetConstructor::new("Other", || Item))
        .unwrap();
    assert_eq!(invalidated.get(), 1);
    assert!(!widget.is_dirty());
}

/// Test that a pending label resolving after its widget is gone is harmless.
#[test]
fn resolution_after_destroy_is_ignored() {
    common::init_tracing();
    let registry = WidgetRegistry::new();
    let (sender, receiver) = oneshot::channel::<WidgetConstructor>();
    registry
        .define("slot-late", RegistryItem::pending(async move { receiver.await.unwrap() }))
        .unwrap();

    let widget = WidgetHandle::new(&slot("slot-late"));
    widget.set_properties(Properties::new().with_registry(registry.clone()));
    let invalidated = counter(&widget, EventKind::Invalidated);
    let _ = widget.render();
    widget.destroy();

    sender.send(item()).unwrap();
    scheduler::run_until_stalled();

    assert!(registry.has("slot-late"));
    assert!(!widget.is_dirty());
    assert_eq!(invalidated.get(), 0);
    assert!(widget.render().is_none());
}

#[derive(Default)]
struct Log(Rc<RefCell<Vec<String>>>);

struct LogProjection(Rc<RefCell<Vec<String>>>);

impl Backend for Log {
    fn attach(&self, attach_type: AttachType, root: &str, vnode: &VNode, _transitions: bool) -> Box<dyn Projection> {
        let tag = vnode.as_element().map(|el| el.tag.clone()).unwrap_or_default();
        self.0.borrow_mut().push(format!("{attach_type:?} {root} {tag}"));
        Box::new(LogProjection(self.0.clone()))
    }
}

impl Projection for LogProjection {
    fn update(&mut self, vnode: &VNode) {
        let text = vnode
            .as_element()
            .and_then(|el| el.children.first())
            .and_then(VNode::as_element)
            .map(|el| el.text())
            .unwrap_or_default();
        self.0.borrow_mut().push(format!("update {text}"));
    }

    fn detach(&mut self) {
        self.0.borrow_mut().push("detach".into());
    }
}

/// Test the projector end to end: attach, child invalidation, frame, detach.
#[test]
fn projector_renders_child_updates_on_tick() {
    common::init_tracing();
    let log = Rc::new(RefCell::new(Vec::new()));
    let rows = Rc::new(RefCell::new(vec![("a", 1)]));
    let list = {
        let rows = rows.clone();
        let item = item();
        WidgetConstructor::new("List", move || List {
            item: item.clone(),
            rows: rows.clone(),
        })
    };
    let options = ProjectorOptions {
        root: "#app".into(),
        ..Default::default()
    };
    let projector = Projector::new(&list, Log(log.clone()), options).unwrap();

    let handle = projector.append().unwrap();
    assert_eq!(projector.state(), ProjectorState::Attached);

    keyed(projector.widget(), "a").unwrap().invalidate();
    assert_eq!(scheduler::pending_frames(), 1);
    *rows.borrow_mut() = vec![("a", 2)];
    assert_eq!(scheduler::tick(), 1);

    drop(handle);
    assert_eq!(projector.state(), ProjectorState::Detached);
    assert_eq!(*log.borrow(), vec!["Append #app ul", "update 2", "detach"]);
}
