//! Capability contracts consumed from platform backends.
//!
//! The runtime never walks an accessibility tree itself. Backends, locators and
//! native elements are supplied by platform crates and reached only through the
//! narrow traits below.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared handle to a native element returned by a backend lookup.
pub type ElementHandle = Arc<dyn Element>;

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Criteria key used by [`Backend::find_element_by_object_name`].
pub const OBJECT_NAME: &str = "object_name";
/// Criteria key used by [`Backend::find_element_by_widget_type`].
pub const WIDGET_TYPE: &str = "widget_type";
/// Criteria key used by [`Backend::find_element_by_text`].
pub const TEXT: &str = "text";

/// Flat search criteria passed to backend lookups.
///
/// Keys are backend-defined property names; an empty set matches anything the
/// backend considers a root candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(BTreeMap<String, String>);

impl Criteria {
    /// Creates empty criteria.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) one `key = value` constraint.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the constraint for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over constraints in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// Control-pattern support (invoke, toggle, value, ...) of a native element.
///
/// Not every backend exposes patterns; elements that do return `Some` from
/// [`Element::patterns`].
pub trait PatternSource: Send + Sync {
    /// Whether the element currently supports the named pattern.
    fn has_pattern(&self, pattern_name: &str) -> bool;
}

/// A native UI element as seen through a backend.
pub trait Element: Send + Sync {
    /// Reads a backend property (`name`, `enabled`, `bounds`, ...).
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Performs the backend's default click action.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects or fails the interaction.
    fn click(&self) -> anyhow::Result<()>;

    /// Pattern capability, if this element exposes one.
    fn patterns(&self) -> Option<&dyn PatternSource> {
        None
    }
}

impl fmt::Debug for dyn Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.get_property("name"))
            .field("has_patterns", &self.patterns().is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Platform-specific element lookup.
///
/// Only `find_element` and `find_elements` are required. The named lookups
/// used by [`ElementWaits`](crate::ElementWaits) default to single-key
/// [`Criteria`] queries and may be overridden with native fast paths.
pub trait Backend: Send + Sync {
    /// Short type label used in session introspection (e.g. `"uia"`, `"atspi"`).
    fn backend_type(&self) -> &str;

    /// Returns the first element matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying accessibility query fails.
    fn find_element(&self, criteria: &Criteria) -> anyhow::Result<Option<ElementHandle>>;

    /// Returns every element matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying accessibility query fails.
    fn find_elements(&self, criteria: &Criteria) -> anyhow::Result<Vec<ElementHandle>>;

    /// # Errors
    ///
    /// Propagates lookup failures from [`Backend::find_element`].
    fn find_element_by_object_name(
        &self,
        object_name: &str,
    ) -> anyhow::Result<Option<ElementHandle>> {
        self.find_element(&Criteria::new().with(OBJECT_NAME, object_name))
    }

    /// # Errors
    ///
    /// Propagates lookup failures from [`Backend::find_element`].
    fn find_element_by_widget_type(
        &self,
        widget_type: &str,
    ) -> anyhow::Result<Option<ElementHandle>> {
        self.find_element(&Criteria::new().with(WIDGET_TYPE, widget_type))
    }

    /// # Errors
    ///
    /// Propagates lookup failures from [`Backend::find_element`].
    fn find_element_by_text(&self, text: &str) -> anyhow::Result<Option<ElementHandle>> {
        self.find_element(&Criteria::new().with(TEXT, text))
    }

    /// # Errors
    ///
    /// Propagates lookup failures from [`Backend::find_element`].
    fn find_element_by_property(
        &self,
        property_name: &str,
        value: &str,
    ) -> anyhow::Result<Option<ElementHandle>> {
        self.find_element(&Criteria::new().with(property_name, value))
    }

    /// Releases native resources when the owning session closes.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing fails; callers log and continue.
    fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Resolves criteria against a backend, possibly with caching or retries.
pub trait Locator: Send + Sync {
    /// Short type label used in session introspection.
    fn locator_type(&self) -> &str;

    /// # Errors
    ///
    /// Returns an error if the underlying backend lookup fails.
    fn locate(&self, criteria: &Criteria) -> anyhow::Result<Option<ElementHandle>>;

    /// # Errors
    ///
    /// Returns an error if the underlying backend lookup fails.
    fn locate_all(&self, criteria: &Criteria) -> anyhow::Result<Vec<ElementHandle>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
