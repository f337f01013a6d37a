//! The fixed catalogue of services every facade starts with.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::info;

use super::contracts::{
    BackendFactory, ElementDiscoveryService, ElementFactory, ElementKind, InputService,
    LocatorFactory, MemoryLeakDetector, PerformanceAnalyzer, PerformanceMonitor,
    PerformanceTester, ScreenshotService, VisualTestingService,
};
use super::domain::{
    BackendLocatorFactory, ConfigurationManager, DefaultElementDiscovery, DefaultElementFactory,
    ElementBuilder, PlatformBackendFactory, UnconfiguredInputService,
    UnconfiguredMemoryLeakDetector, UnconfiguredPerformanceAnalyzer,
    UnconfiguredPerformanceMonitor, UnconfiguredPerformanceTester, UnconfiguredScreenshotService,
    UnconfiguredVisualTesting,
};
use super::registry::{Lifecycle, ServiceInstance, ServiceRegistry};
use crate::session::SessionStore;

/// Well-known service names.
pub mod service_names {
    pub const BACKEND_FACTORY: &str = "backend_factory";
    pub const LOCATOR_FACTORY: &str = "locator_factory";
    pub const SESSION_MANAGER: &str = "session_manager";
    pub const CONFIGURATION_MANAGER: &str = "configuration_manager";
    pub const ELEMENT_DISCOVERY_SERVICE: &str = "element_discovery_service";
    pub const SCREENSHOT_SERVICE: &str = "screenshot_service";
    pub const PERFORMANCE_MONITOR: &str = "performance_monitor";
    pub const VISUAL_TESTING_SERVICE: &str = "visual_testing_service";
    pub const INPUT_SERVICE: &str = "input_service";
    pub const ELEMENT_FACTORY: &str = "element_factory";
    pub const PERFORMANCE_ANALYZER: &str = "performance_analyzer";
    pub const PERFORMANCE_TESTER: &str = "performance_tester";
    pub const MEMORY_LEAK_DETECTOR: &str = "memory_leak_detector";

    pub const BUTTON_ELEMENT: &str = "button_element";
    pub const TEXT_ELEMENT: &str = "text_element";
    pub const CHECKBOX_ELEMENT: &str = "checkbox_element";
    pub const DROPDOWN_ELEMENT: &str = "dropdown_element";
    pub const INPUT_ELEMENT: &str = "input_element";
    pub const WINDOW_ELEMENT: &str = "window_element";
}

/// Service name of the transient builder for `kind`.
#[must_use]
pub fn element_builder_name(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Button => service_names::BUTTON_ELEMENT,
        ElementKind::Text => service_names::TEXT_ELEMENT,
        ElementKind::Checkbox => service_names::CHECKBOX_ELEMENT,
        ElementKind::Dropdown => service_names::DROPDOWN_ELEMENT,
        ElementKind::Input => service_names::INPUT_ELEMENT,
        ElementKind::Window => service_names::WINDOW_ELEMENT,
    }
}

/// Configuration keys every facade starts with.
#[must_use]
pub fn default_config() -> Map<String, Value> {
    [
        ("timeout", json!(30.0)),
        ("retry_attempts", json!(3)),
        ("retry_delay", json!(1.0)),
        ("screenshot_format", json!("png")),
        ("log_level", json!("INFO")),
        ("performance_monitoring", json!(true)),
        ("visual_testing", json!(true)),
        ("ocr_enabled", json!(true)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

/// Registers the default provider for every catalogue name and seeds the
/// default configuration. Existing registrations under these names are
/// replaced.
pub fn register_defaults(registry: &ServiceRegistry) {
    registry.register_factory(service_names::BACKEND_FACTORY, |_| {
        let factory: Arc<dyn BackendFactory> = Arc::new(PlatformBackendFactory::new());
        Ok(ServiceInstance::new(factory))
    });
    registry.register_factory(service_names::LOCATOR_FACTORY, |_| {
        let factory: Arc<dyn LocatorFactory> = Arc::new(BackendLocatorFactory::new());
        Ok(ServiceInstance::new(factory))
    });
    registry.register_type::<SessionStore>(service_names::SESSION_MANAGER, Lifecycle::Singleton);
    registry.register_type::<ConfigurationManager>(
        service_names::CONFIGURATION_MANAGER,
        Lifecycle::Singleton,
    );
    registry.register_factory(service_names::ELEMENT_DISCOVERY_SERVICE, |_| {
        let service: Arc<dyn ElementDiscoveryService> = Arc::new(DefaultElementDiscovery);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::SCREENSHOT_SERVICE, |_| {
        let service: Arc<dyn ScreenshotService> = Arc::new(UnconfiguredScreenshotService);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::PERFORMANCE_MONITOR, |_| {
        let service: Arc<dyn PerformanceMonitor> = Arc::new(UnconfiguredPerformanceMonitor);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::VISUAL_TESTING_SERVICE, |_| {
        let service: Arc<dyn VisualTestingService> = Arc::new(UnconfiguredVisualTesting);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::INPUT_SERVICE, |_| {
        let service: Arc<dyn InputService> = Arc::new(UnconfiguredInputService);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::PERFORMANCE_ANALYZER, |_| {
        let service: Arc<dyn PerformanceAnalyzer> = Arc::new(UnconfiguredPerformanceAnalyzer);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::PERFORMANCE_TESTER, |_| {
        let service: Arc<dyn PerformanceTester> = Arc::new(UnconfiguredPerformanceTester);
        Ok(ServiceInstance::new(service))
    });
    registry.register_factory(service_names::MEMORY_LEAK_DETECTOR, |_| {
        let service: Arc<dyn MemoryLeakDetector> = Arc::new(UnconfiguredMemoryLeakDetector);
        Ok(ServiceInstance::new(service))
    });

    registry.register_factory(service_names::ELEMENT_FACTORY, |reg| {
        let factory: Arc<dyn ElementFactory> = Arc::new(DefaultElementFactory::from_registry(reg));
        Ok(ServiceInstance::new(factory))
    });
    for kind in ElementKind::ALL {
        registry.register_factory_with(
            element_builder_name(kind),
            move |_| Ok(ServiceInstance::managed(Arc::new(ElementBuilder::new(kind)))),
            Lifecycle::Transient,
        );
    }

    registry.update_config(default_config());
    info!(services = registry.len(), "registered default services");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
