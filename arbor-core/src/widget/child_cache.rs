//! Child-instance cache.
//!
//! Maps a slot key (explicit `key`, else the resolved constructor) to the
//! child widgets created for it. Each render pass claims entries as it
//! meets widget descriptions; whatever is left unclaimed at the end of the
//! pass is swept and destroyed by the owner. The cache never destroys
//! anything itself, so no borrow is held while a child tears down.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::properties::Key;

use super::{WidgetConstructor, WidgetHandle};

/// Where a child instance is filed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SlotKey {
    /// The description's explicit `key`.
    Key(Key),
    /// Unkeyed children share one slot per type.
    Constructor(WidgetConstructor),
}

/// One child instance and its bookkeeping.
struct CachedChild {
    widget: WidgetHandle,
    /// Type the child was created from. A keyed slot reused by a different
    /// type gets a new instance.
    constructor: WidgetConstructor,
    /// Claimed in the current pass. Cleared by `sweep`.
    used: bool,
}

#[derive(Default)]
pub(crate) struct ChildCache {
    /// Slots in first-seen order, usually holding a single child.
    slots: IndexMap<SlotKey, SmallVec<[CachedChild; 1]>>,
}

impl ChildCache {
    /// Claim an entry of `slot` created from `constructor` that has not been
    /// used in this pass.
    pub(crate) fn claim(&mut self, slot: &SlotKey, constructor: &WidgetConstructor) -> Option<WidgetHandle> {
        let entry = self
            .slots
            .get_mut(slot)?
            .iter_mut()
            .find(|entry| !entry.used && entry.constructor == *constructor)?;
        entry.used = true;
        Some(entry.widget.clone())
    }

    /// Record a new child, already marked used.
    pub(crate) fn insert(&mut self, slot: SlotKey, widget: WidgetHandle, constructor: WidgetConstructor) {
        self.slots.entry(slot).or_default().push(CachedChild {
            widget,
            constructor,
            used: true,
        });
    }

    pub(crate) fn slot_len(&self, slot: &SlotKey) -> usize {
        self.slots.get(slot).map_or(0, SmallVec::len)
    }

    /// Evict every entry not used since the last sweep and reset the rest.
    pub(crate) fn sweep(&mut self) -> Vec<WidgetHandle> {
        let mut stale = Vec::new();
        self.slots.retain(|_, entries| {
            entries.retain(|entry| {
                if entry.used {
                    entry.used = false;
                    true
                } else {
                    stale.push(entry.widget.clone());
                    false
                }
            });
            !entries.is_empty()
        });
        stale
    }

    /// Evict everything.
    pub(crate) fn drain(&mut self) -> Vec<WidgetHandle> {
        self.slots
            .drain(..)
            .flat_map(|(_, entries)| entries.into_iter().map(|entry| entry.widget))
            .collect()
    }

    pub(crate) fn widgets(&self) -> Vec<WidgetHandle> {
        self.slots
            .values()
            .flat_map(|entries| entries.iter().map(|entry| entry.widget.clone()))
            .collect()
    }
}
