//! Arbor Core
//!
//! This crate provides the widget reconciliation core for the Arbor
//! virtual-DOM UI framework. It implements:
//!
//! - Property diffing with per-property strategies
//! - Aspect tables for composing widget types
//! - A label registry with asynchronous resolution
//! - The widget render pipeline and its keyed child cache
//! - A projector binding a root widget to a live tree
//!
//! Everything is single-threaded. Widgets, registries and projectors are
//! reference counted handles that stay on the thread that created them.
//!
//! # Architecture
//!
//! - `properties`: property bags and the values they carry
//! - `diff`: the comparison strategies
//! - `aspects`: render and diff hooks attached to widget types
//! - `node`: declarative (`DNode`) and lowered (`VNode`) trees
//! - `registry`: label to widget type resolution
//! - `widget`: widget types, instances and their events
//! - `projector`: root attachment and the local scheduler
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::prelude::*;
//!
//! let counter = WidgetConstructor::builder("Counter")
//!     .after_render(|ctx, node| {
//!         let count = ctx.property("count").and_then(|p| p.as_i64()).unwrap_or(0);
//!         v("span").child(format!("{count}")).child(node).into()
//!     })
//!     .build();
//!
//! let widget = WidgetHandle::new(&counter);
//! widget.set_properties(Properties::new().with("count", 3));
//! let output = widget.render();
//! ```

pub mod aspects;
pub mod diff;
pub mod error;
pub mod node;
pub mod projector;
pub mod properties;
pub mod registry;
pub mod widget;

pub use error::{Result, WidgetError};

/// The types most applications touch.
pub mod prelude {
    pub use crate::aspects::{Aspect, AspectKind};
    pub use crate::diff::DiffType;
    pub use crate::error::{Result, WidgetError};
    pub use crate::node::{v, w, DNode, VNode};
    pub use crate::projector::{AttachHandle, Backend, Projection, Projector, ProjectorOptions};
    pub use crate::properties::{Callback, Key, PropValue, Properties, Scope};
    pub use crate::registry::{global_registry, RegistryItem, WidgetRegistry};
    pub use crate::widget::{EventKind, RenderContext, Widget, WidgetConstructor, WidgetEvent, WidgetHandle};
}
