//! Widget Properties
//!
//! A property bag is a tagged structure: a handful of well-known fields the
//! core interprets itself, plus an ordered extension map of [`PropValue`]s
//! that the diff pipeline walks generically.
//!
//! # Well-known fields
//!
//! - `key`: explicit identity of a child within its parent's render.
//! - `bind`: the call scope function-valued properties are bound to. Always
//!   diffed by reference.
//! - `registry`: a local widget registry consulted before the global one.

mod bind;
mod value;

pub(crate) use bind::BoundFunctionCache;
pub use value::{Callback, Key, PropValue, Scope};

use std::fmt;

use indexmap::IndexMap;

use crate::registry::WidgetRegistry;

/// Name under which a key change is reported.
pub const KEY: &str = "key";
/// Name under which a bind scope change is reported.
pub const BIND: &str = "bind";
/// Name under which a local registry change is reported.
pub const REGISTRY: &str = "registry";

/// The properties handed to a widget.
#[derive(Clone, Default)]
pub struct Properties {
    key: Option<Key>,
    bind: Option<Scope>,
    registry: Option<WidgetRegistry>,
    values: IndexMap<String, PropValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_bind(mut self, scope: Scope) -> Self {
        self.bind = Some(scope);
        self
    }

    pub fn with_registry(mut self, registry: WidgetRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set an extension property.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Build a property bag from a JSON object.
    ///
    /// A string or integer `"key"` entry becomes the well-known key; every
    /// other entry lands in the extension map. Non-object values yield an
    /// empty bag.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut properties = Self::new();
        let serde_json::Value::Object(entries) = value else {
            return properties;
        };
        for (name, value) in entries {
            if name == KEY {
                match &value {
                    serde_json::Value::String(s) => {
                        properties.key = Some(Key::from(s.as_str()));
                        continue;
                    }
                    serde_json::Value::Number(n) if n.is_i64() => {
                        properties.key = n.as_i64().map(Key::Int);
                        continue;
                    }
                    _ => {}
                }
            }
            properties.values.insert(name, value.into());
        }
        properties
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn bind(&self) -> Option<&Scope> {
        self.bind.as_ref()
    }

    pub fn registry(&self) -> Option<&WidgetRegistry> {
        self.registry.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Extension property names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of extension properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.key.is_none() && self.bind.is_none() && self.registry.is_none()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.values.shift_remove(name)
    }

    pub(crate) fn set_bind(&mut self, scope: Scope) {
        self.bind = Some(scope);
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut PropValue)> {
        self.values.iter_mut()
    }

    pub(crate) fn with_values(
        key: Option<Key>,
        bind: Option<Scope>,
        registry: Option<WidgetRegistry>,
        values: IndexMap<String, PropValue>,
    ) -> Self {
        Self {
            key,
            bind,
            registry,
            values,
        }
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Properties")
            .field("key", &self.key)
            .field("bind", &self.bind)
            .field("registry", &self.registry.is_some())
            .field("values", &self.values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_insertion_order() {
        let props = Properties::new()
            .with_key("a")
            .with("b", 2)
            .with("a", 1)
            .with("c", "three");

        assert_eq!(props.key(), Some(&Key::from("a")));
        assert_eq!(props.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(props.get("a"), Some(&PropValue::Int(1)));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn from_json_lifts_the_key() {
        let props = Properties::from_json(serde_json::json!({
            "key": "row-1",
            "value": 3,
            "tags": ["x"]
        }));

        assert_eq!(props.key(), Some(&Key::from("row-1")));
        assert!(!props.contains("key"));
        assert_eq!(props.get("value"), Some(&PropValue::Int(3)));
        assert!(props.get("tags").unwrap().is_container());
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut props = Properties::new().with("a", 1).with("b", 2).with("c", 3);
        props.remove("a");
        assert_eq!(props.names().collect::<Vec<_>>(), vec!["b", "c"]);
    }
}
