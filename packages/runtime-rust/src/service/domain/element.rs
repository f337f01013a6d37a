use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uiharness_core::ElementHandle;

use crate::service::catalog::element_builder_name;
use crate::service::contracts::{ElementFactory, ElementKind, TypedElement};
use crate::service::{ManagedService, ServiceRegistry};
use crate::session::Session;

/// Properties consulted, in order, to infer an element's kind.
const CONTROL_TYPE_PROPERTIES: [&str; 2] = ["ControlType", "control_type"];

/// Builds wrappers of one fixed kind. Registered transient, one per kind.
#[derive(Debug, Clone, Copy)]
pub struct ElementBuilder {
    kind: ElementKind,
}

impl ElementBuilder {
    #[must_use]
    pub fn new(kind: ElementKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[must_use]
    pub fn build(&self, native: ElementHandle, session: &Session) -> TypedElement {
        TypedElement::new(self.kind, native, session.id())
    }
}

impl ManagedService for ElementBuilder {}

/// Default [`ElementFactory`]: explicit kind names, or `"auto"` inference
/// from the native control type.
///
/// Each kind is built by the builder registered under its
/// [`element_builder_name`]; kinds without a registered builder get a plain
/// [`ElementBuilder`].
#[derive(Debug, Default)]
pub struct DefaultElementFactory {
    builders: HashMap<ElementKind, Arc<ElementBuilder>>,
}

impl DefaultElementFactory {
    /// Resolves the per-kind builders from `registry`.
    #[must_use]
    pub fn from_registry(registry: &ServiceRegistry) -> Self {
        let builders = ElementKind::ALL
            .into_iter()
            .filter_map(|kind| {
                match registry.get_as::<Arc<ElementBuilder>>(element_builder_name(kind)) {
                    Ok(builder) => Some((kind, builder)),
                    Err(e) => {
                        debug!(%kind, error = %e, "no element builder registered");
                        None
                    }
                }
            })
            .collect();
        Self { builders }
    }

    /// Kind inferred from the element's control type property; `Text` when
    /// the backend reports none.
    #[must_use]
    pub fn infer_kind(native: &ElementHandle) -> ElementKind {
        CONTROL_TYPE_PROPERTIES
            .iter()
            .find_map(|prop| match native.get_property(prop) {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                _ => None,
            })
            .map_or(ElementKind::Text, |s| ElementKind::from_control_type(&s))
    }

    fn builder(&self, kind: ElementKind) -> ElementBuilder {
        self.builders
            .get(&kind)
            .map_or_else(|| ElementBuilder::new(kind), |builder| **builder)
    }
}

impl ElementFactory for DefaultElementFactory {
    fn create_element(
        &self,
        element_type: &str,
        native: ElementHandle,
        session: &Session,
    ) -> anyhow::Result<TypedElement> {
        let kind = if element_type.eq_ignore_ascii_case("auto") {
            Self::infer_kind(&native)
        } else {
            element_type.parse()?
        };
        let element = self.builder(kind).build(native, session);
        debug!(session_id = session.id(), kind = %element.kind(), "created element");
        Ok(element)
    }
}
