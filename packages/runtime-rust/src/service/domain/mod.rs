//! Default service implementations registered by the catalogue.

pub mod backend;
pub mod configuration;
pub mod discovery;
pub mod element;
pub mod locator;
pub mod unavailable;

pub use backend::PlatformBackendFactory;
pub use configuration::{ConfigSummary, ConfigurationManager, ValidationReport};
pub use discovery::DefaultElementDiscovery;
pub use element::{DefaultElementFactory, ElementBuilder};
pub use locator::{BackendLocator, BackendLocatorFactory};
pub use unavailable::{
    UnconfiguredInputService, UnconfiguredMemoryLeakDetector, UnconfiguredPerformanceAnalyzer,
    UnconfiguredPerformanceMonitor, UnconfiguredPerformanceTester, UnconfiguredScreenshotService,
    UnconfiguredVisualTesting,
};
