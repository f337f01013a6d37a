use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uiharness_core::{ConfigError, ConfigStore};

use crate::service::ManagedService;

/// Outcome of [`ConfigurationManager::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Overview returned by [`ConfigurationManager::summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub total_keys: usize,
    pub validation: ValidationReport,
    pub file_path: Option<PathBuf>,
    pub file_exists: bool,
}

/// User-facing automation settings, seeded with defaults and optionally
/// backed by a JSON file.
#[derive(Debug)]
pub struct ConfigurationManager {
    store: ConfigStore,
    file: Option<PathBuf>,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: ConfigStore::with_entries(defaults()),
            file: None,
        }
    }

    /// Seeds defaults, then overlays `path` if it exists. `path` becomes the
    /// default target of [`save_to_file`](Self::save_to_file).
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn with_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        let path = path.into();
        manager.load_from_file(&path)?;
        manager.file = Some(path);
        Ok(manager)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.store.get_or(key, default)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.store.set(key, value);
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    #[must_use]
    pub fn get_all(&self) -> Map<String, Value> {
        self.store.snapshot()
    }

    pub fn update(&self, entries: Map<String, Value>) {
        self.store.update(entries);
    }

    /// Drops every key and restores the defaults.
    pub fn reset(&self) {
        self.store.clear();
        self.store.update(defaults());
        info!("configuration reset to defaults");
    }

    /// Merges the JSON object in `path` into the current settings.
    ///
    /// Returns `Ok(false)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for non-JSON extensions, unreadable files, malformed
    /// JSON, or a top-level value that is not an object.
    pub fn load_from_file(&self, path: &Path) -> Result<bool, ConfigError> {
        ensure_json(path)?;
        if !path.exists() {
            warn!(path = %path.display(), "config file not found");
            return Ok(false);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(entries) = parsed else {
            return Err(ConfigError::NotAnObject {
                path: path.to_path_buf(),
            });
        };
        self.store.update(entries);
        info!(path = %path.display(), "loaded config");
        Ok(true)
    }

    /// Writes the settings as pretty JSON to `path`, or to the file this
    /// manager was created with. Parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is known, the extension is not `.json`, or
    /// writing fails.
    pub fn save_to_file(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = path
            .or(self.file.as_deref())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "config_file",
                reason: "no file path specified".to_string(),
            })?;
        ensure_json(path)?;
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(&self.store.snapshot()).map_err(|source| {
            ConfigError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        std::fs::write(path, body).map_err(io_err)?;
        info!(path = %path.display(), "saved config");
        Ok(path.to_path_buf())
    }

    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let timeout = self.positive_number("default_timeout", &mut report);
        let interval = self.positive_number("default_interval", &mut report);

        let threshold = self.store.get("visual_threshold").and_then(|v| v.as_f64());
        if !threshold.is_some_and(|t| (0.0..=1.0).contains(&t)) {
            report
                .errors
                .push("visual_threshold must be between 0 and 1".to_string());
        }

        let languages_ok = matches!(
            self.store.get("ocr_languages"),
            Some(Value::Array(items)) if items.iter().all(Value::is_string)
        );
        if !languages_ok {
            report
                .errors
                .push("ocr_languages must be a list of strings".to_string());
        }

        let max_sessions = self.store.get("max_sessions").and_then(|v| v.as_u64());
        if !max_sessions.is_some_and(|n| n > 0) {
            report
                .errors
                .push("max_sessions must be a positive integer".to_string());
        }

        if timeout.is_some_and(|t| t > 60.0) {
            report
                .warnings
                .push("default_timeout is very high (>60s)".to_string());
        }
        if interval.is_some_and(|i| i > 5.0) {
            report
                .warnings
                .push("default_interval is very high (>5s)".to_string());
        }
        report
    }

    #[must_use]
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            total_keys: self.store.len(),
            validation: self.validate(),
            file_path: self.file.clone(),
            file_exists: self.file.as_deref().is_some_and(Path::exists),
        }
    }

    fn positive_number(&self, key: &str, report: &mut ValidationReport) -> Option<f64> {
        let value = self.store.get(key).and_then(|v| v.as_f64());
        if !value.is_some_and(|v| v > 0.0) {
            report.errors.push(format!("{key} must be a positive number"));
        }
        value
    }
}

impl ManagedService for ConfigurationManager {}

fn ensure_json(path: &Path) -> Result<(), ConfigError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

fn defaults() -> Map<String, Value> {
    [
        ("default_timeout", json!(10.0)),
        ("default_interval", json!(0.5)),
        ("screenshot_dir", json!("screenshots")),
        ("log_level", json!("INFO")),
        ("log_file", json!("automation.log")),
        ("visual_threshold", json!(0.95)),
        ("ocr_languages", json!(["eng"])),
        ("performance_monitoring", json!(false)),
        ("performance_interval", json!(1.0)),
        ("memory_leak_check", json!(false)),
        ("stress_test_duration", json!(60.0)),
        ("max_sessions", json!(10)),
        ("auto_cleanup", json!(true)),
        ("debug_mode", json!(false)),
        ("retry_attempts", json!(3)),
        ("retry_delay", json!(1.0)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
