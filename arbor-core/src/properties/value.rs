//! Property values.
//!
//! Every value that flows through a widget's property bag is a [`PropValue`].
//! Scalars and strings compare by value, everything that lives behind an `Rc`
//! (lists, maps, callbacks, widget constructors, opaque values) compares by
//! identity. That split is what the reference and shallow diff strategies
//! are built on.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::widget::{WeakWidget, WidgetConstructor, WidgetHandle};

/// Explicit identity key for a child widget or element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Str(s) => serializer.serialize_str(s),
            Key::Int(i) => serializer.serialize_i64(*i),
        }
    }
}

/// The call scope a callback is bound to.
///
/// Widgets are held weakly so that a child's properties never keep its
/// parent alive.
#[derive(Clone)]
pub enum Scope {
    Widget(WeakWidget),
    Value(Rc<dyn Any>),
}

impl Scope {
    /// Scope pointing at a widget instance.
    pub fn widget(widget: &WidgetHandle) -> Self {
        Scope::Widget(widget.downgrade())
    }

    /// Scope wrapping an arbitrary value.
    pub fn value<T: Any>(value: T) -> Self {
        Scope::Value(Rc::new(value))
    }

    /// Identity comparison.
    pub fn same(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::Widget(a), Scope::Widget(b)) => a.ptr_eq(b),
            (Scope::Value(a), Scope::Value(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    /// The widget this scope points at, if it is a widget and still alive.
    pub fn as_widget(&self) -> Option<WidgetHandle> {
        match self {
            Scope::Widget(weak) => weak.upgrade(),
            Scope::Value(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Scope::Value(value) => value.downcast_ref(),
            Scope::Widget(_) => None,
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Widget(weak) => match weak.upgrade() {
                Some(widget) => write!(f, "Scope::Widget({})", widget.id()),
                None => f.write_str("Scope::Widget(<dropped>)"),
            },
            Scope::Value(_) => f.write_str("Scope::Value(..)"),
        }
    }
}

type CallbackFn = dyn Fn(Option<&Scope>, &[PropValue]) -> PropValue;

struct CallbackInner {
    func: Rc<CallbackFn>,
    scope: Option<Scope>,
}

/// A callable property value, typically an event handler.
///
/// Cloning a callback keeps its identity; [`Callback::bind`] creates a new
/// wrapper sharing the same function.
#[derive(Clone)]
pub struct Callback(Rc<CallbackInner>);

impl Callback {
    /// Create an unbound callback.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Option<&Scope>, &[PropValue]) -> PropValue + 'static,
    {
        Self(Rc::new(CallbackInner {
            func: Rc::new(func),
            scope: None,
        }))
    }

    /// Bind this callback to `scope`.
    ///
    /// Binding an already-bound callback returns it unchanged, so handlers
    /// passed down through several widgets keep the scope of whoever bound
    /// them first.
    pub fn bind(&self, scope: Scope) -> Self {
        if self.is_bound() {
            return self.clone();
        }
        Self(Rc::new(CallbackInner {
            func: Rc::clone(&self.0.func),
            scope: Some(scope),
        }))
    }

    pub fn is_bound(&self) -> bool {
        self.0.scope.is_some()
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.0.scope.as_ref()
    }

    /// Invoke the callback with its bound scope.
    pub fn call(&self, args: &[PropValue]) -> PropValue {
        (self.0.func)(self.0.scope.as_ref(), args)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether `self` is a (possibly bound) wrapper around the same function.
    pub fn shares_function(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0.func, &other.0.func)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn is_shared(&self) -> bool {
        Rc::strong_count(&self.0) > 1
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// A dynamically typed property value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<PropValue>>),
    Map(Rc<IndexMap<String, PropValue>>),
    Function(Callback),
    Widget(WidgetConstructor),
    Opaque(Rc<dyn Any>),
}

impl PropValue {
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropValue>,
    {
        PropValue::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropValue>,
    {
        PropValue::Map(Rc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn opaque<T: Any>(value: T) -> Self {
        PropValue::Opaque(Rc::new(value))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, PropValue::Function(_))
    }

    /// Lists and maps are the container shapes the shallow diff looks inside.
    pub fn is_container(&self) -> bool {
        matches!(self, PropValue::List(_) | PropValue::Map(_))
    }

    /// Identity comparison, the `===` of the property system.
    pub fn same(&self, other: &PropValue) -> bool {
        use PropValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Str(a), Str(b)) => a == b,
            (List(a), List(b)) => Rc::ptr_eq(a, b),
            (Map(a), Map(b)) => Rc::ptr_eq(a, b),
            (Function(a), Function(b)) => a.ptr_eq(b),
            (Widget(a), Widget(b)) => a == b,
            (Opaque(a), Opaque(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Float(f) => Some(*f),
            PropValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, PropValue>> {
        match self {
            PropValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            PropValue::Function(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn as_widget(&self) -> Option<&WidgetConstructor> {
        match self {
            PropValue::Widget(ctor) => Some(ctor),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            PropValue::Opaque(value) => value.downcast_ref(),
            _ => None,
        }
    }
}

/// Equality is identity: two structurally equal lists built separately are
/// not equal.
impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("Null"),
            PropValue::Bool(b) => write!(f, "Bool({b})"),
            PropValue::Int(i) => write!(f, "Int({i})"),
            PropValue::Float(x) => write!(f, "Float({x})"),
            PropValue::Str(s) => write!(f, "Str({s:?})"),
            PropValue::List(items) => f.debug_list().entries(items.iter()).finish(),
            PropValue::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            PropValue::Function(cb) => fmt::Debug::fmt(cb, f),
            PropValue::Widget(ctor) => write!(f, "Widget({})", ctor.name()),
            PropValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropValue::Null | PropValue::Opaque(_) => serializer.serialize_unit(),
            PropValue::Bool(b) => serializer.serialize_bool(*b),
            PropValue::Int(i) => serializer.serialize_i64(*i),
            PropValue::Float(x) => serializer.serialize_f64(*x),
            PropValue::Str(s) => serializer.serialize_str(s),
            PropValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PropValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            PropValue::Function(_) => serializer.serialize_str("[function]"),
            PropValue::Widget(ctor) => serializer.serialize_str(ctor.name()),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<Callback> for PropValue {
    fn from(value: Callback) -> Self {
        PropValue::Function(value)
    }
}

impl From<WidgetConstructor> for PropValue {
    fn from(value: WidgetConstructor) -> Self {
        PropValue::Widget(value)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(value: Vec<PropValue>) -> Self {
        PropValue::List(Rc::new(value))
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PropValue::Null,
            Value::Bool(b) => PropValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropValue::Int(i),
                None => PropValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PropValue::Str(s.into()),
            Value::Array(items) => PropValue::list(items),
            Value::Object(entries) => PropValue::map(entries),
        }
    }
}
