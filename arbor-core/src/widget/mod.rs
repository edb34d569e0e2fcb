//! Widgets
//!
//! This module contains the widget instance and everything it is made of:
//!
//! - `WidgetConstructor`: a widget type, composed once at definition time
//! - `WidgetHandle`: a live instance with its render pipeline
//! - `RenderContext`: what a render function sees
//! - `WidgetEvent`/`Handle`: the event and ownership surface
//! - `dom_wrapper`: a widget type adopting an existing backend node
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::node::{v, w};
//! use arbor_core::properties::Properties;
//! use arbor_core::widget::{RenderContext, Widget, WidgetConstructor, WidgetHandle};
//!
//! struct Item;
//!
//! impl Widget for Item {
//!     fn render(&self, ctx: &RenderContext) -> DNode {
//!         v("li").child(ctx.property("label").and_then(|p| p.as_str()).unwrap_or("")).into()
//!     }
//! }
//!
//! let item = WidgetConstructor::new("Item", || Item);
//! let list = WidgetHandle::new(&WidgetConstructor::builder("List").build());
//! list.set_children(vec![w(&item, Properties::new().with_key(1).with("label", "one")).into()]);
//! let output = list.render();
//! ```

mod base;
mod child_cache;
mod constructor;
mod context;
mod dom_wrapper;
mod events;

pub use base::{WeakWidget, WidgetHandle, WidgetId};
pub use constructor::{Widget, WidgetConstructor, WidgetConstructorBuilder};
pub use context::{RenderContext, RenderState};
pub use dom_wrapper::{dom_wrapper, DomWrapperOptions, HostNode};
pub use events::{EventKind, Handle, ListenerId, PropertiesChangeEvent, WidgetEvent};
