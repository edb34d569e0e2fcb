//! Widgets that adopt an existing backend node.
//!
//! [`dom_wrapper`] builds a widget type that renders a single element
//! pointing at a node the application already owns. The patch engine adopts
//! that node instead of creating one. Until the element has been created the
//! wrapper only forwards function properties, so the adopted node is not
//! restyled before it is in place; the `after_create` hook then invalidates
//! the widget and the next render carries every property.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::node::{v, DNode, HNode};
use crate::properties::{PropValue, Scope};

use super::{RenderContext, Widget, WidgetConstructor};

/// A node owned outside the widget tree.
#[derive(Clone)]
pub struct HostNode {
    /// Tag of the element description the wrapper renders.
    pub tag: String,
    /// Backend handle, passed through untouched.
    pub handle: Rc<dyn Any>,
}

impl HostNode {
    pub fn new(tag: impl Into<String>, handle: Rc<dyn Any>) -> Self {
        Self {
            tag: tag.into(),
            handle,
        }
    }
}

#[derive(Clone, Default)]
pub struct DomWrapperOptions {
    /// Called once the host node has been adopted.
    pub on_attached: Option<Rc<dyn Fn()>>,
}

struct DomWrapper {
    node: HostNode,
    options: DomWrapperOptions,
    first_render: Rc<Cell<bool>>,
}

impl DomWrapper {
    fn apply(element: HNode, name: &str, value: &PropValue, first_render: bool) -> HNode {
        match value {
            PropValue::Function(handler) => element.on(name, handler.clone()),
            _ if first_render => element,
            PropValue::Map(classes) if name == "classes" => classes
                .iter()
                .fold(element, |el, (class, on)| el.class(class, on.as_bool().unwrap_or(false))),
            PropValue::Map(styles) if name == "styles" => {
                styles.iter().fold(element, |el, (style, value)| match value.as_str() {
                    Some(value) => el.style(style, value),
                    None => el,
                })
            }
            value => element.attr(name, value.clone()),
        }
    }
}

impl Widget for DomWrapper {
    fn render(&self, ctx: &RenderContext) -> DNode {
        let first_render = self.first_render.get();
        let element = ctx.properties().iter().fold(
            v(self.node.tag.as_str())
                .key("root")
                .dom_node(Rc::clone(&self.node.handle)),
            |element, (name, value)| Self::apply(element, name, value, first_render),
        );

        let pending = Rc::clone(&self.first_render);
        let on_attached = self.options.on_attached.clone();
        element
            .after_create(move |_, created| {
                if !pending.replace(false) {
                    return;
                }
                trace!(tag = %created.tag, "host node adopted");
                if let Some(on_attached) = &on_attached {
                    on_attached();
                }
                if let Some(widget) = created.bind.as_ref().and_then(Scope::as_widget) {
                    widget.invalidate();
                }
            })
            .into()
    }
}

/// A widget type rendering `node` in place.
pub fn dom_wrapper(node: HostNode, options: DomWrapperOptions) -> WidgetConstructor {
    WidgetConstructor::new("DomWrapper", move || DomWrapper {
        node: node.clone(),
        options: options.clone(),
        first_render: Rc::new(Cell::new(true)),
    })
}
