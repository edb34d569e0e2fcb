//! Declarative and lowered nodes.
//!
//! A widget's `render` produces a [`DNode`] tree. The render pipeline lowers
//! that tree into [`VNode`]s: element descriptions are realized, widget
//! descriptions are replaced by the output of the child widget they resolve
//! to, and empty positions are dropped.

mod decorate;
mod dnode;
mod vnode;

pub use decorate::{decorate, decorate_all};
pub use dnode::{v, w, Classes, DNode, HNode, HProperties, LifecycleHook, WNode, WidgetRef};
pub use vnode::{VElement, VNode};
