//! Aggregated outcome of best-effort teardown.

use std::fmt;

use tracing::{debug, warn};

/// One resource whose cleanup failed.
#[derive(Debug)]
pub struct CleanupFailure {
    pub name: String,
    pub error: anyhow::Error,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.name, self.error)
    }
}

/// Result of tearing down a group of resources.
///
/// Teardown never stops at the first failure: every resource is visited,
/// successes land in `cleaned`, failures in `failures`.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub cleaned: Vec<String>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of cleaning `name`, logging failures at `warn`.
    pub fn record(&mut self, name: impl Into<String>, result: anyhow::Result<()>) {
        let name = name.into();
        match result {
            Ok(()) => {
                debug!(%name, "cleaned up");
                self.cleaned.push(name);
            }
            Err(error) => {
                warn!(%name, error = %format!("{error:#}"), "cleanup failed");
                self.failures.push(CleanupFailure { name, error });
            }
        }
    }

    /// Appends another report's entries to this one.
    pub fn merge(&mut self, other: CleanupReport) {
        self.cleaned.extend(other.cleaned);
        self.failures.extend(other.failures);
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapses the report into a single error listing every failure.
    ///
    /// # Errors
    ///
    /// Returns an error if any resource failed to clean up.
    pub fn into_result(self) -> anyhow::Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        Err(anyhow::anyhow!(
            "{} cleanup failure(s): {}",
            self.failures.len(),
            details.join("; ")
        ))
    }
}
