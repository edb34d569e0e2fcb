//! Bound-function memoization.
//!
//! Function-valued properties are bound to the `bind` scope before diffing.
//! Binding creates a new wrapper, so without memoization an unchanged
//! handler would look like a new value on every render. The cache is owned
//! by one widget and dies with it.

use std::collections::HashMap;

use super::{Callback, Properties, PropValue, Scope};

struct BoundEntry {
    /// Keeps the original alive so its address cannot be reused while cached.
    original: Callback,
    scope: Scope,
    bound: Callback,
}

#[derive(Default)]
pub(crate) struct BoundFunctionCache {
    entries: HashMap<usize, BoundEntry>,
}

impl BoundFunctionCache {
    /// Bind `callback` to `scope`, returning the same wrapper for the same
    /// (callback, scope) pair.
    pub(crate) fn bind(&mut self, callback: &Callback, scope: &Scope) -> Callback {
        if callback.is_bound() {
            return callback.clone();
        }

        let addr = callback.addr();
        if let Some(entry) = self.entries.get(&addr) {
            if entry.scope.same(scope) {
                return entry.bound.clone();
            }
        }

        let bound = callback.bind(scope.clone());
        self.entries.insert(
            addr,
            BoundEntry {
                original: callback.clone(),
                scope: scope.clone(),
                bound: bound.clone(),
            },
        );
        bound
    }

    /// Bind every function-valued extension property of `properties` to its
    /// `bind` scope. Without a scope nothing is bound.
    pub(crate) fn bind_all(&mut self, properties: &mut Properties) {
        let Some(scope) = properties.bind().cloned() else {
            return;
        };

        for (_, value) in properties.values_mut() {
            if let PropValue::Function(callback) = value {
                *callback = self.bind(callback, &scope);
            }
        }

        // Originals nobody else holds can never be passed in again.
        self.entries.retain(|_, entry| entry.original.is_shared());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
