//! Aspects
//!
//! Aspects are the hooks a widget type attaches to the render and diff
//! pipeline without touching the base widget:
//!
//! - `BeforeRender`: reducers over the render function itself. Each one
//!   receives the current render function and returns its replacement.
//! - `AfterRender`: transforms over the produced declarative tree.
//! - `DiffProperty`: per-property comparison strategies.
//! - `OnPropertiesChanged`: listeners run after a property update changed
//!   something.
//!
//! # Ordering
//!
//! Aspect tables are built once, when a widget type is defined. A derived
//! type's table starts with every aspect of its base table and appends its
//! own, so base behaviour always runs before the override.
//!
//! Each widget instance additionally keeps a lazily filled cache per aspect
//! kind, which is also where aspects added to a single instance live.

mod cache;

pub(crate) use cache::DecoratorCache;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::diff::{DiffFn, DiffType, PropertyChangeRecord};
use crate::node::DNode;
use crate::properties::PropValue;
use crate::widget::{PropertiesChangeEvent, RenderContext, WidgetHandle};

/// A render function as seen by `BeforeRender` reducers.
pub type RenderFn = Rc<dyn Fn() -> DNode>;

pub type BeforeRenderFn = Rc<dyn Fn(&RenderContext, RenderFn) -> RenderFn>;
pub type AfterRenderFn = Rc<dyn Fn(&RenderContext, DNode) -> DNode>;
pub type PropertiesChangedFn = Rc<dyn Fn(&WidgetHandle, &PropertiesChangeEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectKind {
    BeforeRender,
    AfterRender,
    DiffProperty,
    OnPropertiesChanged,
}

impl AspectKind {
    pub const ALL: [AspectKind; 4] = [
        AspectKind::BeforeRender,
        AspectKind::AfterRender,
        AspectKind::DiffProperty,
        AspectKind::OnPropertiesChanged,
    ];
}

/// How one named property is compared.
#[derive(Clone)]
pub struct DiffPropertyConfig {
    pub property_name: Rc<str>,
    pub diff_type: DiffType,
    pub diff_function: Option<DiffFn>,
}

impl fmt::Debug for DiffPropertyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffPropertyConfig")
            .field("property_name", &self.property_name)
            .field("diff_type", &self.diff_type)
            .field("custom", &self.diff_function.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub enum Aspect {
    BeforeRender(BeforeRenderFn),
    AfterRender(AfterRenderFn),
    DiffProperty(DiffPropertyConfig),
    OnPropertiesChanged(PropertiesChangedFn),
}

impl Aspect {
    pub fn before_render<F>(f: F) -> Self
    where
        F: Fn(&RenderContext, RenderFn) -> RenderFn + 'static,
    {
        Aspect::BeforeRender(Rc::new(f))
    }

    pub fn after_render<F>(f: F) -> Self
    where
        F: Fn(&RenderContext, DNode) -> DNode + 'static,
    {
        Aspect::AfterRender(Rc::new(f))
    }

    /// Compare `property_name` with a built-in strategy.
    pub fn diff_property(property_name: &str, diff_type: DiffType) -> Self {
        Aspect::DiffProperty(DiffPropertyConfig {
            property_name: property_name.into(),
            diff_type,
            diff_function: None,
        })
    }

    /// Compare `property_name` with a custom function.
    pub fn diff_property_with<F>(property_name: &str, f: F) -> Self
    where
        F: Fn(&WidgetHandle, Option<&PropValue>, Option<&PropValue>) -> PropertyChangeRecord + 'static,
    {
        Aspect::DiffProperty(DiffPropertyConfig {
            property_name: property_name.into(),
            diff_type: DiffType::Custom,
            diff_function: Some(Rc::new(f)),
        })
    }

    pub fn on_properties_changed<F>(f: F) -> Self
    where
        F: Fn(&WidgetHandle, &PropertiesChangeEvent) + 'static,
    {
        Aspect::OnPropertiesChanged(Rc::new(f))
    }

    pub fn kind(&self) -> AspectKind {
        match self {
            Aspect::BeforeRender(_) => AspectKind::BeforeRender,
            Aspect::AfterRender(_) => AspectKind::AfterRender,
            Aspect::DiffProperty(_) => AspectKind::DiffProperty,
            Aspect::OnPropertiesChanged(_) => AspectKind::OnPropertiesChanged,
        }
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aspect::DiffProperty(config) => fmt::Debug::fmt(config, f),
            other => write!(f, "{:?}(..)", other.kind()),
        }
    }
}

/// The composed aspects of one widget type.
#[derive(Clone, Default)]
pub struct AspectTable {
    lists: HashMap<AspectKind, SmallVec<[Aspect; 2]>>,
}

impl AspectTable {
    pub fn builder() -> AspectTableBuilder {
        AspectTableBuilder::default()
    }

    /// Aspects of `kind`, base type first.
    pub fn get(&self, kind: AspectKind) -> &[Aspect] {
        self.lists.get(&kind).map(|list| list.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.lists.values().map(SmallVec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AspectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in AspectKind::ALL {
            let list = self.get(kind);
            if !list.is_empty() {
                map.entry(&kind, &list.len());
            }
        }
        map.finish()
    }
}

/// Composes a base table with a type's own aspects.
#[derive(Default)]
pub struct AspectTableBuilder {
    base: Option<Rc<AspectTable>>,
    own: Vec<Aspect>,
}

impl AspectTableBuilder {
    pub fn extends(mut self, base: Rc<AspectTable>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn add(mut self, aspect: Aspect) -> Self {
        self.own.push(aspect);
        self
    }

    pub fn build(self) -> AspectTable {
        let mut lists: HashMap<AspectKind, SmallVec<[Aspect; 2]>> = HashMap::new();
        if let Some(base) = &self.base {
            for kind in AspectKind::ALL {
                let inherited = base.get(kind);
                if !inherited.is_empty() {
                    lists.entry(kind).or_default().extend(inherited.iter().cloned());
                }
            }
        }
        for aspect in self.own {
            lists.entry(aspect.kind()).or_default().push(aspect);
        }
        AspectTable { lists }
    }
}
