//! Declarative nodes, the output of a widget's `render`.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::VElement;
use crate::properties::{Callback, Key, PropValue, Properties, Scope};
use crate::widget::WidgetConstructor;

/// Hook fired by the patch engine after an element is created or updated.
///
/// Receives the backend's element handle and the description it realized.
pub type LifecycleHook = Rc<dyn Fn(&dyn Any, &VElement)>;

/// A class map, either literal or computed when the element is realized.
#[derive(Clone)]
pub enum Classes {
    Static(IndexMap<String, bool>),
    Lazy(Rc<dyn Fn() -> IndexMap<String, bool>>),
}

impl Classes {
    pub(crate) fn evaluate(self) -> IndexMap<String, bool> {
        match self {
            Classes::Static(map) => map,
            Classes::Lazy(f) => f(),
        }
    }
}

impl fmt::Debug for Classes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classes::Static(map) => f.debug_tuple("Static").field(map).finish(),
            Classes::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Attributes, handlers and hooks of an element description.
#[derive(Clone, Default)]
pub struct HProperties {
    pub key: Option<Key>,
    pub bind: Option<Scope>,
    pub classes: Option<Classes>,
    pub styles: IndexMap<String, String>,
    pub attributes: IndexMap<String, PropValue>,
    pub handlers: IndexMap<String, Callback>,
    pub after_create: Option<LifecycleHook>,
    pub after_update: Option<LifecycleHook>,
    /// An existing backend node the patch engine should adopt instead of
    /// creating one.
    pub dom_node: Option<Rc<dyn Any>>,
}

impl fmt::Debug for HProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HProperties")
            .field("key", &self.key)
            .field("classes", &self.classes)
            .field("styles", &self.styles)
            .field("attributes", &self.attributes)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("dom_node", &self.dom_node.is_some())
            .finish_non_exhaustive()
    }
}

/// Description of a concrete element.
#[derive(Debug, Clone)]
pub struct HNode {
    pub tag: String,
    pub properties: HProperties,
    pub children: Vec<DNode>,
}

/// Start an element description.
pub fn v(tag: impl Into<String>) -> HNode {
    HNode {
        tag: tag.into(),
        properties: HProperties::default(),
        children: Vec::new(),
    }
}

impl HNode {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.properties.key = Some(key.into());
        self
    }

    pub fn bind(mut self, scope: Scope) -> Self {
        self.properties.bind = Some(scope);
        self
    }

    /// Toggle a single class. Replaces a lazy class map.
    pub fn class(mut self, name: impl Into<String>, enabled: bool) -> Self {
        let mut map = match self.properties.classes.take() {
            Some(Classes::Static(map)) => map,
            _ => IndexMap::new(),
        };
        map.insert(name.into(), enabled);
        self.properties.classes = Some(Classes::Static(map));
        self
    }

    /// Compute the class map when the element is realized.
    pub fn classes_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> IndexMap<String, bool> + 'static,
    {
        self.properties.classes = Some(Classes::Lazy(Rc::new(f)));
        self
    }

    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.styles.insert(name.into(), value.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.properties.attributes.insert(name.into(), value.into());
        self
    }

    /// Register an event handler, e.g. `on("click", cb)`.
    pub fn on(mut self, event: impl Into<String>, handler: Callback) -> Self {
        self.properties.handlers.insert(event.into(), handler);
        self
    }

    /// Adopt an existing backend node for this element.
    pub fn dom_node(mut self, node: Rc<dyn Any>) -> Self {
        self.properties.dom_node = Some(node);
        self
    }

    pub fn after_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Any, &VElement) + 'static,
    {
        self.properties.after_create = Some(Rc::new(hook));
        self
    }

    pub fn after_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Any, &VElement) + 'static,
    {
        self.properties.after_update = Some(Rc::new(hook));
        self
    }

    pub fn child(mut self, child: impl Into<DNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<DNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Text content, the concatenation of direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                DNode::Text(t) => Some(&**t),
                _ => None,
            })
            .collect()
    }
}

/// How a widget description names its implementation.
#[derive(Debug, Clone)]
pub enum WidgetRef {
    Constructor(WidgetConstructor),
    Label(Rc<str>),
}

impl From<WidgetConstructor> for WidgetRef {
    fn from(value: WidgetConstructor) -> Self {
        WidgetRef::Constructor(value)
    }
}

impl From<&WidgetConstructor> for WidgetRef {
    fn from(value: &WidgetConstructor) -> Self {
        WidgetRef::Constructor(value.clone())
    }
}

impl From<&str> for WidgetRef {
    fn from(value: &str) -> Self {
        WidgetRef::Label(value.into())
    }
}

impl From<String> for WidgetRef {
    fn from(value: String) -> Self {
        WidgetRef::Label(value.into())
    }
}

/// Description of a child widget.
#[derive(Debug, Clone)]
pub struct WNode {
    pub widget: WidgetRef,
    pub properties: Properties,
    pub children: Vec<DNode>,
}

/// Start a widget description.
pub fn w(widget: impl Into<WidgetRef>, properties: Properties) -> WNode {
    WNode {
        widget: widget.into(),
        properties,
        children: Vec::new(),
    }
}

impl WNode {
    pub fn child(mut self, child: impl Into<DNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<DNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

/// A declarative node.
#[derive(Debug, Clone, Default)]
pub enum DNode {
    /// Render nothing.
    #[default]
    Empty,
    Text(Rc<str>),
    Element(HNode),
    Widget(WNode),
}

impl DNode {
    pub fn is_empty(&self) -> bool {
        matches!(self, DNode::Empty)
    }

    pub fn as_element(&self) -> Option<&HNode> {
        match self {
            DNode::Element(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut HNode> {
        match self {
            DNode::Element(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_widget(&self) -> Option<&WNode> {
        match self {
            DNode::Widget(wn) => Some(wn),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DNode::Text(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<DNode>> {
        match self {
            DNode::Element(h) => Some(&mut h.children),
            DNode::Widget(wn) => Some(&mut wn.children),
            _ => None,
        }
    }
}

impl From<&str> for DNode {
    fn from(value: &str) -> Self {
        DNode::Text(value.into())
    }
}

impl From<String> for DNode {
    fn from(value: String) -> Self {
        DNode::Text(value.into())
    }
}

impl From<HNode> for DNode {
    fn from(value: HNode) -> Self {
        DNode::Element(value)
    }
}

impl From<WNode> for DNode {
    fn from(value: WNode) -> Self {
        DNode::Widget(value)
    }
}

impl<T: Into<DNode>> From<Option<T>> for DNode {
    fn from(value: Option<T>) -> Self {
        value.map_or(DNode::Empty, Into::into)
    }
}
