use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use uiharness_core::config::host_backend_type;
use uiharness_core::Backend;

use crate::service::contracts::BackendFactory;

type BackendConstructor = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Backend>> + Send + Sync>;

/// Platform name → backend constructor table.
///
/// Native backends live in platform crates and register themselves here; the
/// table starts empty. `None` and `"auto"` resolve to the host platform.
pub struct PlatformBackendFactory {
    constructors: DashMap<String, BackendConstructor>,
    default_platform: String,
}

impl Default for PlatformBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBackendFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_platform(host_backend_type())
    }

    #[must_use]
    pub fn with_default_platform(platform: impl Into<String>) -> Self {
        Self {
            constructors: DashMap::new(),
            default_platform: platform.into(),
        }
    }

    #[must_use]
    pub fn default_platform(&self) -> &str {
        &self.default_platform
    }

    /// Registers (or replaces) the constructor for `platform`.
    pub fn register_backend<F>(&self, platform: impl Into<String>, constructor: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn Backend>> + Send + Sync + 'static,
    {
        let platform = platform.into();
        info!(%platform, "registered backend constructor");
        self.constructors.insert(platform, Arc::new(constructor));
    }

    pub fn unregister_backend(&self, platform: &str) -> bool {
        self.constructors.remove(platform).is_some()
    }

    fn resolve_platform<'a>(&'a self, platform: Option<&'a str>) -> &'a str {
        match platform {
            None | Some("auto") => &self.default_platform,
            Some("darwin") => "macos",
            Some(p) => p,
        }
    }
}

impl BackendFactory for PlatformBackendFactory {
    fn create_backend(&self, platform: Option<&str>) -> anyhow::Result<Arc<dyn Backend>> {
        let platform = self.resolve_platform(platform);
        // Clone out so the constructor runs without holding the shard lock.
        let constructor = self
            .constructors
            .get(platform)
            .map(|c| c.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Unsupported platform: {platform}"))?;
        let backend = constructor()?;
        debug!(platform, backend_type = backend.backend_type(), "created backend");
        Ok(backend)
    }

    fn supported_platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> =
            self.constructors.iter().map(|e| e.key().clone()).collect();
        platforms.sort();
        platforms
    }

    fn is_platform_supported(&self, platform: &str) -> bool {
        self.constructors.contains_key(self.resolve_platform(Some(platform)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::NullBackend;

    fn null_backend() -> anyhow::Result<Arc<dyn Backend>> {
        Ok(Arc::new(NullBackend::default()))
    }

    #[test]
    fn auto_and_none_use_default_platform() {
        let factory = PlatformBackendFactory::with_default_platform("linux");
        factory.register_backend("linux", null_backend);

        assert_eq!(factory.create_backend(None).unwrap().backend_type(), "null");
        assert_eq!(factory.create_backend(Some("auto")).unwrap().backend_type(), "null");
    }

    #[test]
    fn unsupported_platform_is_an_error() {
        let factory = PlatformBackendFactory::with_default_platform("linux");
        let err = factory.create_backend(Some("amiga")).err().unwrap();
        assert_eq!(err.to_string(), "Unsupported platform: amiga");
    }

    #[test]
    fn darwin_aliases_macos() {
        let factory = PlatformBackendFactory::new();
        factory.register_backend("macos", null_backend);

        assert!(factory.is_platform_supported("darwin"));
        assert!(factory.create_backend(Some("darwin")).is_ok());
        assert_eq!(factory.supported_platforms(), vec!["macos"]);
        assert!(factory.unregister_backend("macos"));
        assert!(!factory.is_platform_supported("macos"));
    }

    #[test]
    fn constructor_failure_propagates() {
        let factory = PlatformBackendFactory::with_default_platform("web");
        factory.register_backend("web", || anyhow::bail!("no browser running"));
        assert!(factory.create_backend(None).is_err());
    }
}
