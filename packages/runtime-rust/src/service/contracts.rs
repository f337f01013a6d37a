//! Interfaces of the services resolved through the registry.
//!
//! The facade stores each service as an `Arc<dyn Trait>` handle so a test or
//! a platform crate can swap any of them with `register_instance`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uiharness_core::{Backend, Criteria, ElementHandle, Locator};

use crate::session::Session;

/// Creates platform backends.
pub trait BackendFactory: Send + Sync {
    /// Creates a backend for `platform`, or for the host platform when `None`
    /// or `"auto"`.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported platforms or failed backend startup.
    fn create_backend(&self, platform: Option<&str>) -> anyhow::Result<Arc<dyn Backend>>;

    fn supported_platforms(&self) -> Vec<String>;

    fn is_platform_supported(&self, platform: &str) -> bool {
        self.supported_platforms().iter().any(|p| p == platform)
    }
}

/// Creates the locator used by a session on top of its backend.
pub trait LocatorFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no locator can be built for the backend.
    fn create_locator(&self, backend: Arc<dyn Backend>) -> anyhow::Result<Arc<dyn Locator>>;
}

/// Session-scoped element lookup.
pub trait ElementDiscoveryService: Send + Sync {
    /// # Errors
    ///
    /// Propagates lookup failures from the session's locator or backend.
    fn find_element(
        &self,
        session: &Session,
        criteria: &Criteria,
    ) -> anyhow::Result<Option<ElementHandle>>;

    /// # Errors
    ///
    /// Propagates lookup failures from the session's locator or backend.
    fn find_elements(
        &self,
        session: &Session,
        criteria: &Criteria,
    ) -> anyhow::Result<Vec<ElementHandle>>;
}

/// Screen rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Captured image data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screenshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub trait ScreenshotService: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if capture fails or no capture provider is configured.
    fn capture_screenshot(
        &self,
        session: &Session,
        region: Option<Region>,
    ) -> anyhow::Result<Option<Screenshot>>;
}

pub trait PerformanceMonitor: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if sampling fails or no monitor is configured.
    fn get_metrics(&self, session: &Session) -> anyhow::Result<Map<String, Value>>;
}

pub trait VisualTestingService: Send + Sync {
    /// Compares `current` against the baseline image stored at `baseline`.
    ///
    /// # Errors
    ///
    /// Returns an error if the comparison cannot run.
    fn compare_with_baseline(
        &self,
        session: &Session,
        baseline: &Path,
        current: &Screenshot,
    ) -> anyhow::Result<Map<String, Value>>;
}

pub trait InputService: Send + Sync {
    /// Sends one input event (`"keyboard"`, `"mouse"`, ...) described by
    /// `params`. Returns whether the platform accepted it.
    ///
    /// # Errors
    ///
    /// Returns an error if input injection is unavailable.
    fn send_input(
        &self,
        session: &Session,
        input_type: &str,
        params: &Map<String, Value>,
    ) -> anyhow::Result<bool>;
}

/// An action timed or repeated by the performance services.
pub type Action<'a> = dyn FnMut() -> anyhow::Result<()> + 'a;

pub trait PerformanceAnalyzer: Send + Sync {
    /// Reduces recorded metric samples to per-metric statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the samples cannot be analysed.
    fn analyze_metrics(
        &self,
        samples: &[Map<String, Value>],
    ) -> anyhow::Result<Map<String, Value>>;
}

pub trait PerformanceTester: Send + Sync {
    /// Runs `action` `warmup_runs` times untimed, then `test_runs` times
    /// timed, and reports the timings.
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails or no tester is configured.
    fn measure_action(
        &self,
        action: &mut Action<'_>,
        warmup_runs: u32,
        test_runs: u32,
    ) -> anyhow::Result<Map<String, Value>>;
}

pub trait MemoryLeakDetector: Send + Sync {
    /// Runs `action` `iterations` times and returns whether memory grew by
    /// more than `threshold_mb`, along with the growth in megabytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails or memory cannot be sampled.
    fn check_memory_leaks(
        &self,
        action: &mut Action<'_>,
        iterations: u32,
        threshold_mb: f64,
    ) -> anyhow::Result<(bool, f64)>;
}

// ---------------------------------------------------------------------------
// Specialized elements
// ---------------------------------------------------------------------------

/// Specialized wrapper categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Text,
    Checkbox,
    Dropdown,
    Input,
    Window,
}

impl ElementKind {
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Button,
        ElementKind::Text,
        ElementKind::Checkbox,
        ElementKind::Dropdown,
        ElementKind::Input,
        ElementKind::Window,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Button => "button",
            ElementKind::Text => "text",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Dropdown => "dropdown",
            ElementKind::Input => "input",
            ElementKind::Window => "window",
        }
    }

    /// Maps a native control type name (`Button`, `ComboBox`, `Edit`, ...).
    /// Unknown control types map to `Text`.
    #[must_use]
    pub fn from_control_type(control_type: &str) -> Self {
        match control_type {
            "Button" => ElementKind::Button,
            "CheckBox" => ElementKind::Checkbox,
            "ComboBox" => ElementKind::Dropdown,
            "Edit" => ElementKind::Input,
            "Window" | "Pane" | "Dialog" => ElementKind::Window,
            _ => ElementKind::Text,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown element type: {s}"))
    }
}

/// A native element wrapped with its specialized kind and owning session.
#[derive(Clone)]
pub struct TypedElement {
    kind: ElementKind,
    native: ElementHandle,
    session_id: String,
}

impl fmt::Debug for TypedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedElement")
            .field("kind", &self.kind)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl TypedElement {
    #[must_use]
    pub fn new(kind: ElementKind, native: ElementHandle, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            native,
            session_id: session_id.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    #[must_use]
    pub fn native(&self) -> &ElementHandle {
        &self.native
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.native.get_property(name)
    }

    /// # Errors
    ///
    /// Propagates the backend's click failure.
    pub fn click(&self) -> anyhow::Result<()> {
        self.native.click()
    }
}

/// Wraps native elements into specialized ones.
pub trait ElementFactory: Send + Sync {
    /// `element_type` names an [`ElementKind`]; `"auto"` infers it from the
    /// native element's control type.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown element types.
    fn create_element(
        &self,
        element_type: &str,
        native: ElementHandle,
        session: &Session,
    ) -> anyhow::Result<TypedElement>;
}
