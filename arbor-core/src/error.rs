//! Error types shared across the widget core.
//!
//! Configuration errors are returned to the caller of the operation that
//! triggered them. The ambiguity warning is never returned; it travels as
//! the payload of a [`WidgetEvent::Error`](crate::widget::WidgetEvent) while
//! rendering carries on.

use thiserror::Error;

/// Errors produced by the widget core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    /// A registry label was defined a second time.
    #[error("widget has already been registered for '{label}'")]
    AlreadyRegistered {
        /// The label that was already taken.
        label: String,
    },

    /// The projector root was changed while attached to the live tree.
    #[error("projector already attached, cannot change root element")]
    AlreadyAttached,

    /// The projector root widget rendered text or nothing.
    #[error("must provide a VNode at the root of a projector")]
    RootNotElement,

    /// CSS transitions were requested but the backend cannot provide them.
    #[error("unable to create projector with css transitions enabled: the backend has no transitions loaded")]
    TransitionsUnavailable,

    /// The same widget type was rendered more than once in a slot without a key.
    #[error("it is recommended to provide a unique `key` property when using the same widget ({widget}) multiple times")]
    AmbiguousChild {
        /// Name of the widget type that was rendered without a key.
        widget: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WidgetError>;
