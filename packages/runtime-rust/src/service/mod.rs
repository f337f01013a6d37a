//! Service registry, service contracts and the default catalogue.
//!
//! 1. **Registry** (`registry`): named providers, lifecycles, ordered cleanup
//! 2. **Contracts** (`contracts`): traits the facade resolves services as
//! 3. **Domain** (`domain`): default implementations of those traits
//! 4. **Catalogue** (`catalog`): names and default registrations

pub mod catalog;
pub mod contracts;
pub mod domain;
pub mod registry;

pub use catalog::{default_config, element_builder_name, register_defaults, service_names};
pub use contracts::{
    Action, BackendFactory, ElementDiscoveryService, ElementFactory, ElementKind, InputService,
    LocatorFactory, MemoryLeakDetector, PerformanceAnalyzer, PerformanceMonitor,
    PerformanceTester, Region, Screenshot, ScreenshotService, TypedElement, VisualTestingService,
};
pub use registry::{
    Lifecycle, ManagedService, Provider, ServiceError, ServiceInstance, ServiceRegistry,
};
