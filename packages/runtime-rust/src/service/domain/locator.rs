use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uiharness_core::{Backend, Criteria, ElementHandle, Locator};

use crate::service::contracts::LocatorFactory;

/// Locator that forwards criteria straight to its backend.
pub struct BackendLocator {
    backend: Arc<dyn Backend>,
}

impl BackendLocator {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

impl Locator for BackendLocator {
    fn locator_type(&self) -> &str {
        "backend"
    }

    fn locate(&self, criteria: &Criteria) -> anyhow::Result<Option<ElementHandle>> {
        self.backend.find_element(criteria)
    }

    fn locate_all(&self, criteria: &Criteria) -> anyhow::Result<Vec<ElementHandle>> {
        self.backend.find_elements(criteria)
    }
}

type LocatorConstructor =
    Arc<dyn Fn(Arc<dyn Backend>) -> anyhow::Result<Arc<dyn Locator>> + Send + Sync>;

/// Picks a locator by backend type, falling back to [`BackendLocator`].
#[derive(Default)]
pub struct BackendLocatorFactory {
    custom: DashMap<String, LocatorConstructor>,
}

impl BackendLocatorFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom locator for backends reporting `backend_type`.
    pub fn register_locator<F>(&self, backend_type: impl Into<String>, constructor: F)
    where
        F: Fn(Arc<dyn Backend>) -> anyhow::Result<Arc<dyn Locator>> + Send + Sync + 'static,
    {
        self.custom.insert(backend_type.into(), Arc::new(constructor));
    }

    pub fn unregister_locator(&self, backend_type: &str) -> bool {
        self.custom.remove(backend_type).is_some()
    }
}

impl LocatorFactory for BackendLocatorFactory {
    fn create_locator(&self, backend: Arc<dyn Backend>) -> anyhow::Result<Arc<dyn Locator>> {
        let custom = self
            .custom
            .get(backend.backend_type())
            .map(|c| c.value().clone());
        let locator = match custom {
            Some(constructor) => constructor(backend)?,
            None => Arc::new(BackendLocator::new(backend)),
        };
        debug!(locator_type = locator.locator_type(), "created locator");
        Ok(locator)
    }
}
