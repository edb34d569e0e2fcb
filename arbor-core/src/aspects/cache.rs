//! Per-instance aspect cache.
//!
//! A widget reads its aspect lists from the type's table the first time each
//! kind is requested and keeps the result. Aspects added to one instance are
//! appended to that instance's lists only.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{Aspect, AspectKind, AspectTable};

pub(crate) struct DecoratorCache {
    table: Rc<AspectTable>,
    lists: RefCell<HashMap<AspectKind, Rc<[Aspect]>>>,
}

impl DecoratorCache {
    pub(crate) fn new(table: Rc<AspectTable>) -> Self {
        Self {
            table,
            lists: RefCell::new(HashMap::new()),
        }
    }

    /// The aspects of `kind`, base type first, instance additions last.
    ///
    /// The returned list is a snapshot; callers may run hooks that add
    /// aspects without holding a borrow.
    pub(crate) fn get(&self, kind: AspectKind) -> Rc<[Aspect]> {
        if let Some(list) = self.lists.borrow().get(&kind) {
            return Rc::clone(list);
        }
        let list: Rc<[Aspect]> = self.table.get(kind).into();
        self.lists.borrow_mut().insert(kind, Rc::clone(&list));
        list
    }

    /// Add an aspect to this instance only.
    pub(crate) fn add(&self, aspect: Aspect) {
        let kind = aspect.kind();
        let current = self.get(kind);
        let mut list = current.to_vec();
        list.push(aspect);
        self.lists.borrow_mut().insert(kind, list.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffType;

    #[test]
    fn instance_additions_do_not_touch_the_table() {
        let table = Rc::new(
            AspectTable::builder()
                .add(Aspect::diff_property("a", DiffType::Ignore))
                .build(),
        );
        let first = DecoratorCache::new(table.clone());
        let second = DecoratorCache::new(table.clone());

        first.add(Aspect::diff_property("b", DiffType::Shallow));

        assert_eq!(first.get(AspectKind::DiffProperty).len(), 2);
        assert_eq!(second.get(AspectKind::DiffProperty).len(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lists_are_cached_after_first_read() {
        let cache = DecoratorCache::new(Rc::new(AspectTable::default()));
        let a = cache.get(AspectKind::AfterRender);
        let b = cache.get(AspectKind::AfterRender);
        assert!(Rc::ptr_eq(&a, &b));
    }
}
