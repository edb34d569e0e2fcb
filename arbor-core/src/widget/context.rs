//! Render Context
//!
//! What a render function sees: the widget being rendered, its properties
//! and its children. Contexts are cheap to clone, so `BeforeRender` hooks
//! can capture one in the render function they return.
//!
//! # Render state
//!
//! Each widget tracks whether it is idle, applying properties or rendering.
//! Invalidation outside `Idle` only marks the widget dirty; the signal that
//! would schedule another render is suppressed because one is already on
//! its way. Rendering enters through [`RenderGuard`], which puts the widget
//! back to `Idle` when dropped, even if a render hook panics.

use std::cell::Cell;
use std::rc::Rc;

use crate::node::DNode;
use crate::properties::{PropValue, Properties};

use super::WidgetHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    ProcessingProperties,
    Rendering,
}

#[derive(Clone)]
pub struct RenderContext {
    widget: WidgetHandle,
    properties: Rc<Properties>,
    children: Rc<[DNode]>,
}

impl RenderContext {
    pub(crate) fn new(widget: WidgetHandle, properties: Rc<Properties>, children: Rc<[DNode]>) -> Self {
        Self {
            widget,
            properties,
            children,
        }
    }

    pub fn widget(&self) -> &WidgetHandle {
        &self.widget
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Shorthand for `properties().get(name)`.
    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.properties.get(name)
    }

    pub fn children(&self) -> &[DNode] {
        &self.children
    }
}

/// Marks a widget as rendering until dropped.
pub(crate) struct RenderGuard<'a> {
    state: &'a Cell<RenderState>,
}

impl<'a> RenderGuard<'a> {
    pub(crate) fn enter(state: &'a Cell<RenderState>) -> Self {
        debug_assert_ne!(
            state.get(),
            RenderState::Rendering,
            "widget render re-entered itself"
        );
        state.set(RenderState::Rendering);
        Self { state }
    }
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.state.set(RenderState::Idle);
    }
}
