//! Property Differ
//!
//! Pure functions deciding whether a property value changed between two
//! property updates.
//!
//! # Strategies
//!
//! - `Ignore`: never changed.
//! - `Reference`: changed iff the values are not the same by identity.
//! - `Shallow`: two containers of the same shape are unchanged when they have
//!   the same member count and every member is the same by identity.
//!   Anything else is changed.
//! - `Custom`: a user function decides. Without a function, acts as `Ignore`.
//! - `Auto`: functions are ignored, containers are compared shallowly,
//!   everything else by reference.

use std::rc::Rc;

use crate::properties::PropValue;
use crate::widget::WidgetHandle;

/// Comparison strategy for a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiffType {
    #[default]
    Auto,
    Ignore,
    Reference,
    Shallow,
    Custom,
}

/// The outcome of diffing one property.
///
/// `value` is the value to keep for the property; strategies pass the new
/// value through, custom functions may substitute their own.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChangeRecord {
    pub changed: bool,
    pub value: Option<PropValue>,
}

impl PropertyChangeRecord {
    pub fn changed(value: Option<PropValue>) -> Self {
        Self { changed: true, value }
    }

    pub fn unchanged(value: Option<PropValue>) -> Self {
        Self {
            changed: false,
            value,
        }
    }
}

/// User-supplied comparison, invoked with the widget being updated.
pub type DiffFn =
    Rc<dyn Fn(&WidgetHandle, Option<&PropValue>, Option<&PropValue>) -> PropertyChangeRecord>;

/// Diff `previous` against `value` with the given strategy.
///
/// `custom` carries the function and call context for [`DiffType::Custom`];
/// it is ignored by every other strategy.
pub fn diff(
    diff_type: DiffType,
    previous: Option<&PropValue>,
    value: Option<&PropValue>,
    custom: Option<(&DiffFn, &WidgetHandle)>,
) -> PropertyChangeRecord {
    match diff_type {
        DiffType::Ignore => ignore(value),
        DiffType::Reference => reference(previous, value),
        DiffType::Shallow => shallow(previous, value),
        DiffType::Auto => auto(previous, value),
        DiffType::Custom => match custom {
            Some((function, widget)) => function(widget, previous, value),
            None => ignore(value),
        },
    }
}

pub fn ignore(value: Option<&PropValue>) -> PropertyChangeRecord {
    PropertyChangeRecord::unchanged(value.cloned())
}

pub fn reference(previous: Option<&PropValue>, value: Option<&PropValue>) -> PropertyChangeRecord {
    let same = match (previous, value) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same(b),
        _ => false,
    };
    PropertyChangeRecord {
        changed: !same,
        value: value.cloned(),
    }
}

pub fn shallow(previous: Option<&PropValue>, value: Option<&PropValue>) -> PropertyChangeRecord {
    let changed = match (previous, value) {
        (Some(PropValue::List(a)), Some(PropValue::List(b))) => {
            a.len() != b.len() || a.iter().zip(b.iter()).any(|(x, y)| !x.same(y))
        }
        (Some(PropValue::Map(a)), Some(PropValue::Map(b))) => {
            a.len() != b.len()
                || b.iter()
                    .any(|(name, y)| a.get(name).map_or(true, |x| !x.same(y)))
        }
        _ => true,
    };
    PropertyChangeRecord {
        changed,
        value: value.cloned(),
    }
}

pub fn auto(previous: Option<&PropValue>, value: Option<&PropValue>) -> PropertyChangeRecord {
    match value {
        Some(v) if v.is_callable() => ignore(value),
        Some(v) if v.is_container() => shallow(previous, value),
        _ => reference(previous, value),
    }
}
