//! # Opaque element handles and the surface that owns them.
//!
//! The core stores [`ElementId`]s in its bookkeeping and hands them back to
//! the [`Surface`] (or an [`EffectFactory`](crate::EffectFactory)); it never
//! looks inside them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Failure;

/// Stable handle to a visual element owned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// A set of visual property changes applied to one element.
///
/// Every field is optional; empty patches are valid and do nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementPatch {
    /// Inline style properties to set (`name`, `value`).
    pub styles: Vec<(String, String)>,
    /// Attributes to set (`Some`) or remove (`None`).
    pub attributes: Vec<(String, Option<String>)>,
    /// Classes to add.
    pub add_classes: Vec<String>,
    /// Classes to remove.
    pub remove_classes: Vec<String>,
}

impl ElementPatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a style property.
    pub fn style(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.push((name.into(), value.into()));
        self
    }

    /// Sets an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Some(value.into())));
        self
    }

    /// Removes an attribute.
    pub fn remove_attr(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), None));
        self
    }

    /// Adds a class.
    pub fn add_class(mut self, class: impl Into<String>) -> Self {
        self.add_classes.push(class.into());
        self
    }

    /// Removes a class.
    pub fn remove_class(mut self, class: impl Into<String>) -> Self {
        self.remove_classes.push(class.into());
        self
    }

    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
            && self.attributes.is_empty()
            && self.add_classes.is_empty()
            && self.remove_classes.is_empty()
    }
}

/// DOM-like surface the scheduler's batch operations and the orchestrator's
/// bypass path write to.
pub trait Surface: Send + Sync + 'static {
    /// Inserts `child` as the last child of `parent`.
    fn append(&self, parent: ElementId, child: ElementId) -> Result<(), Failure>;

    /// Detaches `element`.
    fn remove(&self, element: ElementId) -> Result<(), Failure>;

    /// Applies `patch` to `element`.
    fn patch(&self, element: ElementId, patch: &ElementPatch) -> Result<(), Failure>;

    /// Resolves a selector to elements.
    fn query(&self, selector: &str) -> Result<Vec<ElementId>, Failure>;

    /// Snaps `element` to its final visual state without animating.
    fn reveal(&self, element: ElementId) -> Result<(), Failure>;
}
