//! Widget Registry
//!
//! Resolves string labels to widget types. A label may be defined with a
//! constructor, a pending asynchronous resolution, or a factory producing
//! one on first use. Lookups never block: an unresolved label yields `None`
//! and the caller's waiter fires once the label resolves.

mod handler;
mod widget_registry;

pub(crate) use handler::RegistryHandler;
pub use widget_registry::{global_registry, ConstructorFuture, RegistryItem, Waiter, WidgetRegistry};
