//! Condition polling.
//!
//! Every "wait for this UI state" operation reduces to [`wait_until`]: evaluate a
//! predicate, return as soon as it holds, otherwise sleep one poll interval and
//! retry until the deadline passes. Polling is cooperative and single-threaded;
//! the predicate is always evaluated once before the first sleep.
//!
//! When the timeout is shorter than the poll interval, the effective interval
//! is clamped to `timeout / 4` so a short window still gets several polls.

use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default overall timeout for a wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default pause between predicate evaluations (50ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// WaitError
// ---------------------------------------------------------------------------

/// Errors produced by the polling engine and the element wait helpers.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The deadline passed without the predicate holding.
    #[error("{message}")]
    Timeout { message: String, timeout: Duration },
    /// A malformed argument (negative duration, empty identifier, ...).
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    /// The target does not expose a capability the wait depends on.
    #[error("element does not expose a `{capability}` capability")]
    MissingCapability { capability: &'static str },
    /// The predicate itself failed; polling stops at the first failure.
    #[error("wait predicate failed: {0}")]
    Predicate(#[source] anyhow::Error),
    /// The wait was cancelled through its cancellation token.
    #[error("wait cancelled")]
    Cancelled,
}

impl WaitError {
    /// Whether this error is a deadline expiry, the only routinely expected failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        WaitError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// WaitSpec
// ---------------------------------------------------------------------------

/// Timeout, poll interval and failure message of a single wait.
///
/// Built per call and consumed by [`wait_until`]; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    timeout: Duration,
    poll_interval: Duration,
    error_message: Option<String>,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_message: None,
        }
    }
}

impl WaitSpec {
    /// Creates a spec with the given timeout and the default poll interval.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Creates a spec from fractional seconds, rejecting negative or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::InvalidArgument`] naming the offending parameter.
    pub fn from_secs_f64(timeout: f64, poll_interval: f64) -> Result<Self, WaitError> {
        Ok(Self {
            timeout: non_negative_secs("timeout", timeout)?,
            poll_interval: non_negative_secs("poll_interval", poll_interval)?,
            error_message: None,
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replaces the default "Timed out after N seconds" message.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The poll interval as requested, before clamping.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The interval actually slept between polls. Never exceeds the timeout.
    #[must_use]
    pub fn effective_poll_interval(&self) -> Duration {
        if self.timeout < self.poll_interval {
            self.timeout / 4
        } else {
            self.poll_interval
        }
    }

    /// Builds the timeout error this spec reports on deadline expiry.
    #[must_use]
    pub fn timeout_error(&self) -> WaitError {
        let message = self.error_message.clone().unwrap_or_else(|| {
            format!("Timed out after {} seconds", self.timeout.as_secs_f64())
        });
        WaitError::Timeout {
            message,
            timeout: self.timeout,
        }
    }
}

fn non_negative_secs(name: &'static str, secs: f64) -> Result<Duration, WaitError> {
    if secs.is_nan() {
        return Err(WaitError::invalid(name, "must be a number"));
    }
    if secs < 0.0 {
        return Err(WaitError::invalid(name, format!("must be non-negative, got {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| WaitError::invalid(name, format!("out of range: {e}")))
}

// ---------------------------------------------------------------------------
// Blocking polling
// ---------------------------------------------------------------------------

/// Blocks until `predicate` returns `true` or the spec's timeout elapses.
///
/// # Errors
///
/// Returns [`WaitError::Timeout`] carrying the spec's message on expiry.
pub fn wait_until<P>(spec: &WaitSpec, mut predicate: P) -> Result<(), WaitError>
where
    P: FnMut() -> bool,
{
    try_wait_until(spec, || Ok(predicate()))
}

/// Like [`wait_until`] for predicates that can fail.
///
/// A predicate error stops polling immediately and is returned as
/// [`WaitError::Predicate`].
///
/// # Errors
///
/// Returns [`WaitError::Timeout`] on expiry or [`WaitError::Predicate`] when the
/// predicate fails.
pub fn try_wait_until<P>(spec: &WaitSpec, mut predicate: P) -> Result<(), WaitError>
where
    P: FnMut() -> anyhow::Result<bool>,
{
    let interval = spec.effective_poll_interval();
    // `None` means the deadline is beyond what `Instant` can represent.
    let deadline = Instant::now().checked_add(spec.timeout);
    let mut polls: u64 = 0;

    while deadline.map_or(true, |d| Instant::now() < d) {
        polls += 1;
        if predicate().map_err(WaitError::Predicate)? {
            trace!(polls, "wait condition satisfied");
            return Ok(());
        }
        let pause = deadline.map_or(interval, |d| {
            interval.min(d.saturating_duration_since(Instant::now()))
        });
        thread::sleep(pause);
    }

    debug!(polls, timeout_ms = spec.timeout.as_millis(), "wait timed out");
    Err(spec.timeout_error())
}

// ---------------------------------------------------------------------------
// Async polling
// ---------------------------------------------------------------------------

/// Async rendition of [`wait_until`] driven by `tokio::time`.
///
/// Uses the same clamped interval and evaluate-before-sleep order. When a
/// cancellation token is given, cancelling it ends the wait with
/// [`WaitError::Cancelled`] at the next suspension point.
///
/// # Errors
///
/// Returns [`WaitError::Timeout`] on expiry or [`WaitError::Cancelled`].
pub async fn wait_until_async<P>(
    spec: &WaitSpec,
    mut predicate: P,
    cancel: Option<&CancellationToken>,
) -> Result<(), WaitError>
where
    P: FnMut() -> bool,
{
    use tokio::time::Instant;

    let interval = spec.effective_poll_interval();
    let deadline = Instant::now().checked_add(spec.timeout);

    while deadline.map_or(true, |d| Instant::now() < d) {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(WaitError::Cancelled);
        }
        if predicate() {
            return Ok(());
        }
        let pause = deadline.map_or(interval, |d| {
            interval.min(d.saturating_duration_since(Instant::now()))
        });
        match cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => return Err(WaitError::Cancelled),
                    () = tokio::time::sleep(pause) => {}
                }
            }
            None => tokio::time::sleep(pause).await,
        }
    }

    debug!(timeout_ms = spec.timeout.as_millis(), "async wait timed out");
    Err(spec.timeout_error())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
