//! Flat key/value configuration and the typed automation settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors raised while validating or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported config file format: {path}")]
    UnsupportedFormat { path: PathBuf },
    #[error("config file {path} must contain a JSON object")]
    NotAnObject { path: PathBuf },
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Flat, schema-less configuration map shared between services.
///
/// Unknown keys are accepted and passed through; individual services decide
/// what they validate. Reads return clones so no lock is held by callers.
#[derive(Debug, Default)]
pub struct ConfigStore {
    entries: RwLock<Map<String, Value>>,
}

impl ConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: Map<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Sets a single value, replacing any previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        debug!(%key, %value, "set config");
        self.entries.write().insert(key, value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the value for `key`, or `default` when absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Deserializes the value for `key`. Missing keys and type mismatches
    /// both yield `None`.
    #[must_use]
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key, error = %e, "config value has unexpected type");
                None
            }
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().remove(key)
    }

    /// Copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.read().clone()
    }

    /// Merges `entries` into the store. Returns how many values were written.
    pub fn update<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut map = self.entries.write();
        let mut written = 0;
        for (key, value) in entries {
            map.insert(key, value);
            written += 1;
        }
        info!(count = written, "updated config");
        written
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

// ---------------------------------------------------------------------------
// AutomationConfig
// ---------------------------------------------------------------------------

const SCREENSHOT_FORMATS: &[&str] = &["png", "jpg", "bmp"];
const VISUAL_ALGORITHMS: &[&str] = &["ssim", "mse", "hash"];
const PERFORMANCE_METRICS: &[&str] = &["cpu", "memory", "io", "gpu", "network", "response_time"];
const OCR_LANGUAGES: &[&str] = &["eng", "fra", "deu", "spa", "ita"];
const ACCESSIBILITY_STANDARDS: &[&str] =
    &["wcag2.1", "wcag2.2", "section508", "wcag2a", "wcag2aa"];
const BACKEND_TYPES: &[&str] = &["windows", "linux", "macos", "web"];

/// Typed automation settings applied when a session is created.
///
/// Every field has a default, so partial JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub screenshot_format: String,
    pub screenshot_quality: u8,
    pub screenshot_dir: Option<PathBuf>,

    pub visual_testing_enabled: bool,
    pub visual_baseline_dir: Option<PathBuf>,
    pub visual_threshold: f64,
    pub visual_algorithm: String,

    pub performance_enabled: bool,
    pub performance_metrics: Vec<String>,
    /// Seconds between performance samples.
    pub performance_interval: f64,
    pub performance_output_dir: Option<PathBuf>,

    /// Seconds.
    pub default_timeout: f64,
    /// Seconds.
    pub default_interval: f64,
    /// Seconds.
    pub implicit_wait: f64,
    /// Seconds.
    pub polling_interval: f64,

    pub ocr_enabled: bool,
    pub ocr_languages: Vec<String>,
    pub ocr_confidence: f64,

    pub accessibility_enabled: bool,
    pub accessibility_standards: Vec<String>,
    pub accessibility_output_dir: Option<PathBuf>,

    /// One of `windows`, `linux`, `macos`, `web`.
    pub backend_type: String,
    pub backend_options: BTreeMap<String, Value>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            screenshot_format: "png".to_string(),
            screenshot_quality: 90,
            screenshot_dir: None,
            visual_testing_enabled: false,
            visual_baseline_dir: None,
            visual_threshold: 0.95,
            visual_algorithm: "ssim".to_string(),
            performance_enabled: false,
            performance_metrics: strings(&["cpu", "memory", "response_time"]),
            performance_interval: 1.0,
            performance_output_dir: None,
            default_timeout: 10.0,
            default_interval: 0.5,
            implicit_wait: 0.0,
            polling_interval: 0.5,
            ocr_enabled: false,
            ocr_languages: strings(&["eng"]),
            ocr_confidence: 0.7,
            accessibility_enabled: false,
            accessibility_standards: strings(&["wcag2a", "wcag2aa"]),
            accessibility_output_dir: None,
            backend_type: host_backend_type().to_string(),
            backend_options: BTreeMap::new(),
        }
    }
}

impl AutomationConfig {
    /// Checks ranges and enumerated values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screenshot_quality > 100 {
            return Err(invalid("screenshot_quality", "must be between 0 and 100"));
        }
        unit_interval("visual_threshold", self.visual_threshold)?;
        positive("performance_interval", self.performance_interval)?;
        positive("default_timeout", self.default_timeout)?;
        positive("default_interval", self.default_interval)?;
        if self.implicit_wait.is_nan() || self.implicit_wait < 0.0 {
            return Err(invalid("implicit_wait", "must be non-negative"));
        }
        unit_interval("ocr_confidence", self.ocr_confidence)?;

        one_of("screenshot_format", &self.screenshot_format, SCREENSHOT_FORMATS)?;
        one_of("visual_algorithm", &self.visual_algorithm, VISUAL_ALGORITHMS)?;
        for metric in &self.performance_metrics {
            one_of("performance_metrics", metric, PERFORMANCE_METRICS)?;
        }
        for language in &self.ocr_languages {
            one_of("ocr_languages", language, OCR_LANGUAGES)?;
        }
        for standard in &self.accessibility_standards {
            one_of("accessibility_standards", standard, ACCESSIBILITY_STANDARDS)?;
        }
        one_of("backend_type", &self.backend_type, BACKEND_TYPES)?;
        Ok(())
    }

    /// Non-null fields as flat config entries.
    #[must_use]
    pub fn to_entries(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            // A struct of plain fields always serializes to an object.
            _ => Map::new(),
        }
    }

    /// Looks up a single field by its serialized name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_entries().remove(key)
    }
}

/// Backend type matching the host operating system.
#[must_use]
pub fn host_backend_type() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "macos",
        _ => "linux",
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.into(),
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(key, "must be positive"))
    }
}

fn unit_interval(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(key, "must be between 0 and 1"))
    }
}

fn one_of(key: &'static str, value: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            key,
            format!("`{value}` is not one of: {}", allowed.join(", ")),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
