//! Placeholders for services whose real implementation lives in an optional
//! platform or imaging crate.
//!
//! Every operation fails with [`ServiceError::Unavailable`] until a provider
//! is registered under the same service name.

use std::path::Path;

use serde_json::{Map, Value};

use crate::service::contracts::{
    Action, InputService, MemoryLeakDetector, PerformanceAnalyzer, PerformanceMonitor,
    PerformanceTester, Region, Screenshot, ScreenshotService, VisualTestingService,
};
use crate::service::registry::{ManagedService, ServiceError};
use crate::service::service_names;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Macro for repetitive placeholder declarations
// ---------------------------------------------------------------------------

/// Declare a placeholder service bound to a service name.
macro_rules! unavailable_service {
    (
        $(#[$meta:meta])*
        $name:ident, $svc_name:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name;

        impl $name {
            fn unavailable(operation: &'static str) -> anyhow::Error {
                ServiceError::Unavailable {
                    name: $svc_name,
                    operation,
                }
                .into()
            }
        }

        impl ManagedService for $name {}
    };
}

unavailable_service!(
    /// Screen capture placeholder.
    UnconfiguredScreenshotService, service_names::SCREENSHOT_SERVICE
);

unavailable_service!(
    /// Performance sampling placeholder.
    UnconfiguredPerformanceMonitor, service_names::PERFORMANCE_MONITOR
);

unavailable_service!(
    /// Baseline comparison placeholder.
    UnconfiguredVisualTesting, service_names::VISUAL_TESTING_SERVICE
);

unavailable_service!(
    /// Input injection placeholder.
    UnconfiguredInputService, service_names::INPUT_SERVICE
);

unavailable_service!(
    UnconfiguredPerformanceAnalyzer, service_names::PERFORMANCE_ANALYZER
);

unavailable_service!(
    UnconfiguredPerformanceTester, service_names::PERFORMANCE_TESTER
);

unavailable_service!(
    /// Memory growth sampling placeholder.
    UnconfiguredMemoryLeakDetector, service_names::MEMORY_LEAK_DETECTOR
);

impl ScreenshotService for UnconfiguredScreenshotService {
    fn capture_screenshot(
        &self,
        _session: &Session,
        _region: Option<Region>,
    ) -> anyhow::Result<Option<Screenshot>> {
        Err(Self::unavailable("capture screenshots"))
    }
}

impl PerformanceMonitor for UnconfiguredPerformanceMonitor {
    fn get_metrics(&self, _session: &Session) -> anyhow::Result<Map<String, Value>> {
        Err(Self::unavailable("sample performance metrics"))
    }
}

impl VisualTestingService for UnconfiguredVisualTesting {
    fn compare_with_baseline(
        &self,
        _session: &Session,
        _baseline: &Path,
        _current: &Screenshot,
    ) -> anyhow::Result<Map<String, Value>> {
        Err(Self::unavailable("compare against baselines"))
    }
}

impl InputService for UnconfiguredInputService {
    fn send_input(
        &self,
        _session: &Session,
        _input_type: &str,
        _params: &Map<String, Value>,
    ) -> anyhow::Result<bool> {
        Err(Self::unavailable("send input"))
    }
}

impl PerformanceAnalyzer for UnconfiguredPerformanceAnalyzer {
    fn analyze_metrics(
        &self,
        _samples: &[Map<String, Value>],
    ) -> anyhow::Result<Map<String, Value>> {
        Err(Self::unavailable("analyze metrics"))
    }
}

impl PerformanceTester for UnconfiguredPerformanceTester {
    fn measure_action(
        &self,
        _action: &mut Action<'_>,
        _warmup_runs: u32,
        _test_runs: u32,
    ) -> anyhow::Result<Map<String, Value>> {
        Err(Self::unavailable("measure actions"))
    }
}

impl MemoryLeakDetector for UnconfiguredMemoryLeakDetector {
    fn check_memory_leaks(
        &self,
        _action: &mut Action<'_>,
        _iterations: u32,
        _threshold_mb: f64,
    ) -> anyhow::Result<(bool, f64)> {
        Err(Self::unavailable("sample memory growth"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
