//! Projector
//!
//! The projector owns a root widget and keeps a live tree in sync with it.
//! Patching the live tree is the backend's job: a [`Backend`] turns the
//! first render into a [`Projection`], and every later render is handed to
//! that projection as an update.
//!
//! # Scheduling
//!
//! Root invalidation, property and children updates queue a render on the
//! local scheduler. At most one frame is outstanding at a time, so any
//! number of invalidations between two ticks cost one render. A paused
//! projector queues nothing until resumed.

pub mod scheduler;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::error::{Result, WidgetError};
use crate::node::{DNode, VNode};
use crate::properties::Properties;
use crate::widget::{EventKind, Handle, WidgetConstructor, WidgetEvent, WidgetHandle};

use self::scheduler::FrameId;

/// Projector configuration, loadable from any serde format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectorOptions {
    /// Selector of the element the projection attaches to.
    pub root: String,
    pub css_transitions: bool,
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        Self {
            root: "body".to_string(),
            css_transitions: false,
        }
    }
}

/// How the first render is attached to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachType {
    /// Append the rendered tree as a new child of the root.
    Append,
    /// Adopt the root's existing markup as the rendered tree.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectorState {
    Attached,
    Detached,
}

/// The patch engine.
pub trait Backend {
    fn attach(&self, attach_type: AttachType, root: &str, vnode: &VNode, transitions: bool) -> Box<dyn Projection>;

    fn supports_transitions(&self) -> bool {
        false
    }
}

/// A live tree created by a [`Backend`].
pub trait Projection {
    fn update(&mut self, vnode: &VNode);

    fn detach(&mut self) {}
}

struct ProjectorInner {
    /// The root widget.
    widget: WidgetHandle,

    backend: Box<dyn Backend>,
    options: RefCell<ProjectorOptions>,

    /// Tracked apart from `projection`, which is taken out while the
    /// backend runs and may call back into the projector.
    state: Cell<ProjectorState>,

    /// The live tree, present while attached.
    projection: RefCell<Option<Box<dyn Projection>>>,

    /// The handle returned by the last attach, if anyone still holds it.
    attach_handle: RefCell<Weak<AttachInner>>,

    /// The outstanding frame. At most one is queued at a time.
    frame: Cell<Option<FrameId>>,

    paused: Cell<bool>,

    /// Subscription to the root widget's `Invalidated` event.
    listener: Handle,
}

/// Binds a root widget to a live tree through a [`Backend`].
pub struct Projector(Rc<ProjectorInner>);

impl Projector {
    /// Create a projector around a new instance of `constructor`.
    pub fn new<B>(constructor: &WidgetConstructor, backend: B, options: ProjectorOptions) -> Result<Self>
    where
        B: Backend + 'static,
    {
        if options.css_transitions && !backend.supports_transitions() {
            return Err(WidgetError::TransitionsUnavailable);
        }

        let widget = WidgetHandle::new(constructor);
        let inner = Rc::new_cyclic(|weak: &Weak<ProjectorInner>| {
            let weak = weak.clone();
            let listener = widget.on(EventKind::Invalidated, move |_| {
                if let Some(inner) = weak.upgrade() {
                    Projector(inner).schedule_render();
                }
            });
            ProjectorInner {
                widget: widget.clone(),
                backend: Box::new(backend),
                options: RefCell::new(options),
                state: Cell::new(ProjectorState::Detached),
                projection: RefCell::new(None),
                attach_handle: RefCell::new(Weak::new()),
                frame: Cell::new(None),
                paused: Cell::new(false),
                listener,
            }
        });
        Ok(Projector(inner))
    }

    pub fn widget(&self) -> &WidgetHandle {
        &self.0.widget
    }

    pub fn state(&self) -> ProjectorState {
        self.0.state.get()
    }

    pub fn options(&self) -> ProjectorOptions {
        self.0.options.borrow().clone()
    }

    pub fn root(&self) -> String {
        self.0.options.borrow().root.clone()
    }

    /// Change the root selector. Only allowed while detached.
    pub fn set_root(&self, root: &str) -> Result<()> {
        if self.state() == ProjectorState::Attached {
            return Err(WidgetError::AlreadyAttached);
        }
        self.0.options.borrow_mut().root = root.to_string();
        Ok(())
    }

    pub fn set_properties(&self, properties: Properties) {
        self.0.widget.set_properties(properties);
        self.schedule_render();
    }

    pub fn set_children(&self, children: Vec<DNode>) {
        self.0.widget.set_children(children);
        self.schedule_render();
    }

    pub fn append(&self) -> Result<AttachHandle> {
        self.attach(AttachType::Append)
    }

    pub fn merge(&self) -> Result<AttachHandle> {
        self.attach(AttachType::Merge)
    }

    /// Render the root widget and attach it.
    ///
    /// Attaching an attached projector returns the existing handle.
    pub fn attach(&self, attach_type: AttachType) -> Result<AttachHandle> {
        if let Some(handle) = self.0.attach_handle.borrow().upgrade() {
            if !handle.detached.get() {
                return Ok(AttachHandle(handle));
            }
        }

        let vnode = self.render()?;
        let options = self.options();
        self.0.state.set(ProjectorState::Attached);
        let projection = self
            .0
            .backend
            .attach(attach_type, &options.root, &vnode, options.css_transitions);
        *self.0.projection.borrow_mut() = Some(projection);

        let handle = Rc::new(AttachInner {
            projector: Rc::downgrade(&self.0),
            detached: Cell::new(false),
        });
        *self.0.attach_handle.borrow_mut() = Rc::downgrade(&handle);
        debug!(root = %options.root, ?attach_type, "projector attached");
        self.0.widget.emit(WidgetEvent::ProjectorAttached);
        Ok(AttachHandle(handle))
    }

    /// Render the root widget, which must produce an element.
    pub fn render(&self) -> Result<VNode> {
        match self.0.widget.render() {
            Some(vnode @ VNode::Element(_)) => Ok(vnode),
            _ => Err(WidgetError::RootNotElement),
        }
    }

    pub fn pause(&self) {
        self.0.paused.set(true);
        if let Some(id) = self.0.frame.take() {
            scheduler::cancel_frame(id);
        }
    }

    pub fn resume(&self) {
        self.0.paused.set(false);
        self.schedule_render();
    }

    pub fn is_paused(&self) -> bool {
        self.0.paused.get()
    }

    /// Detach and destroy the root widget.
    pub fn destroy(&self) {
        self.detach();
        self.0.listener.destroy();
        self.0.widget.destroy();
    }

    fn schedule_render(&self) {
        if self.0.paused.get() || self.0.frame.get().is_some() || self.state() == ProjectorState::Detached {
            return;
        }
        let weak = Rc::downgrade(&self.0);
        let id = scheduler::request_frame(move || {
            if let Some(inner) = weak.upgrade() {
                Projector(inner).run_frame();
            }
        });
        self.0.frame.set(Some(id));
        trace!(?id, "render scheduled");
        self.0.widget.emit(WidgetEvent::RenderScheduled);
    }

    fn run_frame(&self) {
        self.0.frame.set(None);
        if self.state() == ProjectorState::Detached {
            return;
        }
        let vnode = match self.render() {
            Ok(vnode) => vnode,
            Err(err) => {
                warn!(%err, "projector render failed");
                return;
            }
        };

        // Lifecycle hooks fired by the update may invalidate or detach.
        let projection = self.0.projection.borrow_mut().take();
        let Some(mut projection) = projection else {
            return;
        };
        projection.update(&vnode);
        if self.state() == ProjectorState::Attached {
            *self.0.projection.borrow_mut() = Some(projection);
        } else {
            projection.detach();
            debug!("projector detached during update");
        }
    }

    fn detach(&self) {
        if let Some(handle) = self.0.attach_handle.borrow().upgrade() {
            handle.detached.set(true);
        }
        if let Some(id) = self.0.frame.take() {
            scheduler::cancel_frame(id);
        }
        self.0.state.set(ProjectorState::Detached);
        let projection = self.0.projection.borrow_mut().take();
        if let Some(mut projection) = projection {
            projection.detach();
            debug!("projector detached");
        }
    }
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector")
            .field("widget", &self.0.widget)
            .field("state", &self.state())
            .field("options", &*self.0.options.borrow())
            .field("paused", &self.0.paused.get())
            .finish()
    }
}

struct AttachInner {
    projector: Weak<ProjectorInner>,
    detached: Cell<bool>,
}

impl AttachInner {
    fn detach(&self) {
        if self.detached.replace(true) {
            return;
        }
        if let Some(inner) = self.projector.upgrade() {
            Projector(inner).detach();
        }
    }
}

impl Drop for AttachInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Keeps a projection attached. Dropping the last clone detaches it.
#[derive(Clone)]
#[must_use = "dropping the handle detaches the projection"]
pub struct AttachHandle(Rc<AttachInner>);

impl AttachHandle {
    pub fn destroy(&self) {
        self.0.detach();
    }

    pub fn is_attached(&self) -> bool {
        !self.0.detached.get()
    }

    pub fn ptr_eq(&self, other: &AttachHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AttachHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::v;
    use crate::widget::{RenderContext, Widget};

    #[derive(Clone, Default)]
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        transitions: bool,
    }

    struct RecordedProjection {
        log: Rc<RefCell<Vec<String>>>,
    }

    fn text(vnode: &VNode) -> String {
        vnode.as_element().map(|el| el.text()).unwrap_or_default()
    }

    impl Backend for Recorder {
        fn attach(&self, attach_type: AttachType, root: &str, vnode: &VNode, _transitions: bool) -> Box<dyn Projection> {
            self.log
                .borrow_mut()
                .push(format!("{attach_type:?} {root} {}", text(vnode)));
            Box::new(RecordedProjection {
                log: self.log.clone(),
            })
        }

        fn supports_transitions(&self) -> bool {
            self.transitions
        }
    }

    impl Projection for RecordedProjection {
        fn update(&mut self, vnode: &VNode) {
            self.log.borrow_mut().push(format!("update {}", text(vnode)));
        }

        fn detach(&mut self) {
            self.log.borrow_mut().push("detach".to_string());
        }
    }

    struct Greeting;

    impl Widget for Greeting {
        fn render(&self, ctx: &RenderContext) -> DNode {
            let name = ctx.property("name").and_then(|p| p.as_str()).unwrap_or("world");
            v("main").child(format!("hello {name}")).into()
        }
    }

    struct Bare;

    impl Widget for Bare {
        fn render(&self, _ctx: &RenderContext) -> DNode {
            "just text".into()
        }
    }

    fn greeting() -> WidgetConstructor {
        WidgetConstructor::new("Greeting", || Greeting)
    }

    /// Invalidates the rendered widget from inside every update, the way an
    /// element-created hook does.
    struct Reentrant {
        updates: Rc<Cell<usize>>,
        release: Rc<RefCell<Option<AttachHandle>>>,
    }

    impl Projection for Reentrant {
        fn update(&mut self, vnode: &VNode) {
            self.updates.set(self.updates.get() + 1);
            let widget = vnode
                .as_element()
                .and_then(|el| el.bind.as_ref())
                .and_then(|scope| scope.as_widget());
            if let Some(widget) = widget {
                widget.invalidate();
            }
            if self.updates.get() == 2 {
                self.release.borrow_mut().take();
            }
        }
    }

    struct ReentrantBackend {
        updates: Rc<Cell<usize>>,
        release: Rc<RefCell<Option<AttachHandle>>>,
    }

    impl Backend for ReentrantBackend {
        fn attach(&self, _: AttachType, _: &str, _: &VNode, _: bool) -> Box<dyn Projection> {
            Box::new(Reentrant {
                updates: self.updates.clone(),
                release: self.release.clone(),
            })
        }
    }

    #[test]
    fn updates_may_invalidate_and_detach_the_projector() {
        let updates = Rc::new(Cell::new(0));
        let release = Rc::new(RefCell::new(None));
        let backend = ReentrantBackend {
            updates: updates.clone(),
            release: release.clone(),
        };
        let projector = Projector::new(&greeting(), backend, ProjectorOptions::default()).unwrap();
        *release.borrow_mut() = Some(projector.append().unwrap());

        projector.widget().invalidate();
        scheduler::tick();
        assert_eq!(updates.get(), 1);
        assert_eq!(projector.state(), ProjectorState::Attached);
        assert_eq!(scheduler::pending_frames(), 1);

        // The second update drops the last attach handle.
        scheduler::tick();
        assert_eq!(updates.get(), 2);
        assert_eq!(projector.state(), ProjectorState::Detached);
        assert_eq!(scheduler::pending_frames(), 0);

        scheduler::tick();
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn options_load_from_json_with_defaults() {
        let options: ProjectorOptions = serde_json::from_value(serde_json::json!({ "root": "#app" })).unwrap();
        assert_eq!(options.root, "#app");
        assert!(!options.css_transitions);
        assert_eq!(ProjectorOptions::default().root, "body");

        let attach: AttachType = serde_json::from_value(serde_json::json!("merge")).unwrap();
        assert_eq!(attach, AttachType::Merge);
    }

    #[test]
    fn transitions_need_backend_support() {
        let options = ProjectorOptions {
            css_transitions: true,
            ..Default::default()
        };
        let err = Projector::new(&greeting(), Recorder::default(), options.clone()).unwrap_err();
        assert_eq!(err, WidgetError::TransitionsUnavailable);

        let backend = Recorder {
            transitions: true,
            ..Default::default()
        };
        assert!(Projector::new(&greeting(), backend, options).is_ok());
    }

    #[test]
    fn root_must_render_an_element() {
        let bare = WidgetConstructor::new("Bare", || Bare);
        let projector = Projector::new(&bare, Recorder::default(), ProjectorOptions::default()).unwrap();
        assert_eq!(projector.append().unwrap_err(), WidgetError::RootNotElement);
        assert_eq!(projector.state(), ProjectorState::Detached);
    }

    #[test]
    fn attach_once_and_detach_on_drop() {
        let backend = Recorder::default();
        let log = backend.log.clone();
        let projector = Projector::new(&greeting(), backend, ProjectorOptions::default()).unwrap();

        let handle = projector.append().unwrap();
        let again = projector.merge().unwrap();
        assert!(handle.ptr_eq(&again));
        assert_eq!(projector.state(), ProjectorState::Attached);
        assert_eq!(projector.set_root("#other"), Err(WidgetError::AlreadyAttached));

        drop((handle, again));
        assert_eq!(projector.state(), ProjectorState::Detached);
        projector.set_root("#other").unwrap();

        let handle = projector.merge().unwrap();
        handle.destroy();
        assert!(!handle.is_attached());
        assert_eq!(
            *log.borrow(),
            vec!["Append body hello world", "detach", "Merge #other hello world", "detach"]
        );
    }

    #[test]
    fn invalidations_coalesce_into_one_frame() {
        let backend = Recorder::default();
        let log = backend.log.clone();
        let projector = Projector::new(&greeting(), backend, ProjectorOptions::default()).unwrap();
        let _handle = projector.append().unwrap();

        let scheduled = Rc::new(Cell::new(0));
        let s = scheduled.clone();
        projector
            .widget()
            .on(EventKind::RenderScheduled, move |_| s.set(s.get() + 1));

        projector.widget().invalidate();
        projector.widget().invalidate();
        assert_eq!(scheduled.get(), 1);
        assert_eq!(scheduler::pending_frames(), 1);

        scheduler::tick();
        assert_eq!(log.borrow().last().map(String::as_str), Some("update hello world"));
        assert_eq!(scheduler::pending_frames(), 0);
    }

    #[test]
    fn property_updates_render_on_the_next_tick() {
        let backend = Recorder::default();
        let log = backend.log.clone();
        let projector = Projector::new(&greeting(), backend, ProjectorOptions::default()).unwrap();
        let _handle = projector.append().unwrap();

        projector.set_properties(Properties::new().with("name", "arbor"));
        scheduler::tick();
        assert_eq!(log.borrow().last().map(String::as_str), Some("update hello arbor"));
    }

    #[test]
    fn paused_projector_queues_nothing() {
        let projector = Projector::new(&greeting(), Recorder::default(), ProjectorOptions::default()).unwrap();
        let _handle = projector.append().unwrap();

        projector.widget().invalidate();
        projector.pause();
        assert_eq!(scheduler::pending_frames(), 0);
        projector.widget().invalidate();
        assert_eq!(scheduler::pending_frames(), 0);

        projector.resume();
        assert!(!projector.is_paused());
        assert_eq!(scheduler::pending_frames(), 1);
    }

    #[test]
    fn destroy_detaches_and_tears_down_the_widget() {
        let backend = Recorder::default();
        let log = backend.log.clone();
        let projector = Projector::new(&greeting(), backend, ProjectorOptions::default()).unwrap();
        let handle = projector.append().unwrap();

        projector.destroy();
        assert!(!handle.is_attached());
        assert!(projector.widget().is_destroyed());
        assert_eq!(log.borrow().last().map(String::as_str), Some("detach"));
    }
}
