//! Widget types.
//!
//! A [`WidgetConstructor`] is the identity of a widget type: its name, the
//! aspect table composed when the type was defined, and a factory for the
//! [`Widget`] implementation behind each instance. Constructors compare and
//! hash by identity, which is what child slots and registries key on.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::aspects::{Aspect, AspectTable, RenderFn};
use crate::diff::{DiffType, PropertyChangeRecord};
use crate::node::{v, DNode};
use crate::properties::PropValue;

use super::{PropertiesChangeEvent, RenderContext, WidgetHandle};

/// The behaviour of a widget type.
///
/// Implementations hold their own state behind interior mutability; the
/// framework only ever hands out shared references.
pub trait Widget: 'static {
    /// Produce the declarative tree for the current properties and children.
    ///
    /// The default wraps the children in a `div`.
    fn render(&self, ctx: &RenderContext) -> DNode {
        v("div").children(ctx.children().iter().cloned()).into()
    }

    /// Called once when the instance is destroyed.
    fn on_destroy(&self) {}
}

struct DefaultWidget;

impl Widget for DefaultWidget {}

type Factory = Rc<dyn Fn() -> Rc<dyn Widget>>;

struct WidgetType {
    name: Rc<str>,
    aspects: Rc<AspectTable>,
    factory: Factory,
}

#[derive(Clone)]
pub struct WidgetConstructor(Rc<WidgetType>);

impl WidgetConstructor {
    /// Define a widget type with no aspects.
    pub fn new<W, F>(name: &str, factory: F) -> Self
    where
        W: Widget,
        F: Fn() -> W + 'static,
    {
        Self::builder(name).factory(factory).build()
    }

    pub fn builder(name: &str) -> WidgetConstructorBuilder {
        WidgetConstructorBuilder {
            name: name.into(),
            base: None,
            factory: None,
            aspects: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn aspects(&self) -> &Rc<AspectTable> {
        &self.0.aspects
    }

    pub(crate) fn create(&self) -> Rc<dyn Widget> {
        (self.0.factory)()
    }

    pub fn ptr_eq(&self, other: &WidgetConstructor) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for WidgetConstructor {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for WidgetConstructor {}

impl Hash for WidgetConstructor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for WidgetConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetConstructor")
            .field("name", &self.0.name)
            .field("aspects", &self.0.aspects)
            .finish()
    }
}

/// Composes a widget type at definition time.
///
/// `extends` inherits the base type's aspects (which run first) and, unless
/// a new factory is given, its implementation.
pub struct WidgetConstructorBuilder {
    name: Rc<str>,
    base: Option<WidgetConstructor>,
    factory: Option<Factory>,
    aspects: Vec<Aspect>,
}

impl WidgetConstructorBuilder {
    pub fn extends(mut self, base: &WidgetConstructor) -> Self {
        self.base = Some(base.clone());
        self
    }

    pub fn factory<W, F>(mut self, factory: F) -> Self
    where
        W: Widget,
        F: Fn() -> W + 'static,
    {
        let factory: Factory = Rc::new(move || Rc::new(factory()) as Rc<dyn Widget>);
        self.factory = Some(factory);
        self
    }

    pub fn aspect(mut self, aspect: Aspect) -> Self {
        self.aspects.push(aspect);
        self
    }

    pub fn before_render<F>(self, f: F) -> Self
    where
        F: Fn(&RenderContext, RenderFn) -> RenderFn + 'static,
    {
        self.aspect(Aspect::before_render(f))
    }

    pub fn after_render<F>(self, f: F) -> Self
    where
        F: Fn(&RenderContext, DNode) -> DNode + 'static,
    {
        self.aspect(Aspect::after_render(f))
    }

    pub fn diff_property(self, name: &str, diff_type: DiffType) -> Self {
        self.aspect(Aspect::diff_property(name, diff_type))
    }

    pub fn diff_property_with<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&WidgetHandle, Option<&PropValue>, Option<&PropValue>) -> PropertyChangeRecord + 'static,
    {
        self.aspect(Aspect::diff_property_with(name, f))
    }

    pub fn on_properties_changed<F>(self, f: F) -> Self
    where
        F: Fn(&WidgetHandle, &PropertiesChangeEvent) + 'static,
    {
        self.aspect(Aspect::on_properties_changed(f))
    }

    pub fn build(self) -> WidgetConstructor {
        let mut table = AspectTable::builder();
        if let Some(base) = &self.base {
            table = table.extends(Rc::clone(base.aspects()));
        }
        for aspect in self.aspects {
            table = table.add(aspect);
        }

        let factory = self
            .factory
            .or_else(|| self.base.as_ref().map(|base| Rc::clone(&base.0.factory)))
            .unwrap_or_else(|| -> Factory { Rc::new(|| Rc::new(DefaultWidget) as Rc<dyn Widget>) });

        WidgetConstructor(Rc::new(WidgetType {
            name: self.name,
            aspects: Rc::new(table.build()),
            factory,
        }))
    }
}
