//! Lowered DOM descriptions handed to the patch engine.
//!
//! A `VNode` is what a widget's render pipeline returns once every widget
//! description in its tree has been replaced by that child's own output.
//! Elements sit behind an `Rc` so a cached render can be returned as-is and
//! compared by identity.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::{HNode, LifecycleHook};
use crate::properties::{Callback, Key, PropValue, Scope};

#[derive(Clone)]
pub enum VNode {
    Text(Rc<str>),
    Element(Rc<VElement>),
}

impl VNode {
    pub fn as_element(&self) -> Option<&VElement> {
        match self {
            VNode::Element(el) => Some(el),
            VNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Text(t) => Some(t),
            VNode::Element(_) => None,
        }
    }

    /// Identity comparison; text nodes compare by content.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b),
            (VNode::Text(a), VNode::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Text(t) => write!(f, "{t:?}"),
            VNode::Element(el) => fmt::Debug::fmt(&**el, f),
        }
    }
}

/// A realized element.
#[derive(Clone)]
pub struct VElement {
    pub tag: String,
    pub key: Option<Key>,
    /// Scope event handlers run in.
    pub bind: Option<Scope>,
    pub classes: IndexMap<String, bool>,
    pub styles: IndexMap<String, String>,
    pub attributes: IndexMap<String, PropValue>,
    pub handlers: IndexMap<String, Callback>,
    pub after_create: Option<LifecycleHook>,
    pub after_update: Option<LifecycleHook>,
    /// Backend node to adopt, see [`HNode::dom_node`].
    pub dom_node: Option<Rc<dyn Any>>,
    pub children: Vec<VNode>,
}

impl VElement {
    /// Realize an element description whose children are already lowered.
    ///
    /// `scope` becomes the handler scope unless the description set its own,
    /// and a lazy class map is evaluated here.
    pub fn realize(node: HNode, children: Vec<VNode>, scope: Option<Scope>) -> Self {
        let properties = node.properties;
        Self {
            tag: node.tag,
            key: properties.key,
            bind: properties.bind.or(scope),
            classes: properties.classes.map(|c| c.evaluate()).unwrap_or_default(),
            styles: properties.styles,
            attributes: properties.attributes,
            handlers: properties.handlers,
            after_create: properties.after_create,
            after_update: properties.after_update,
            dom_node: properties.dom_node,
            children,
        }
    }

    /// Names of the classes switched on.
    pub fn active_classes(&self) -> impl Iterator<Item = &str> {
        self.classes
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    /// Concatenated text of direct text children.
    pub fn text(&self) -> String {
        self.children.iter().filter_map(VNode::as_text).collect()
    }
}

impl fmt::Debug for VElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VElement")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("classes", &self.classes)
            .field("attributes", &self.attributes)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

impl Serialize for VNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VNode::Text(t) => serializer.serialize_str(t),
            VNode::Element(el) => VElement::serialize(el, serializer),
        }
    }
}

impl Serialize for VElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("tag", &self.tag)?;
        if let Some(key) = &self.key {
            map.serialize_entry("key", key)?;
        }
        let classes: Vec<&str> = self.active_classes().collect();
        if !classes.is_empty() {
            map.serialize_entry("classes", &classes)?;
        }
        if !self.styles.is_empty() {
            let styles: BTreeMap<&str, &str> = self
                .styles
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            map.serialize_entry("styles", &styles)?;
        }
        if !self.attributes.is_empty() {
            map.serialize_entry("attributes", &PropValue::map(self.attributes.clone()))?;
        }
        if !self.handlers.is_empty() {
            let names: Vec<&String> = self.handlers.keys().collect();
            map.serialize_entry("on", &names)?;
        }
        if !self.children.is_empty() {
            map.serialize_entry("children", &self.children)?;
        }
        map.end()
    }
}
