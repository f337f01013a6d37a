//! Automation sessions: a backend, an optional locator and a config snapshot
//! bound under one id.

mod store;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info_span, Span};
use uiharness_core::{Backend, ElementWaits, Locator};

pub use store::SessionStore;

/// One automation run.
///
/// Shared between the [`SessionStore`] (by id) and callers (by `Arc`). Once
/// closed a session stays closed; the store drops its record on close.
pub struct Session {
    id: String,
    backend: Arc<dyn Backend>,
    locator: Option<Arc<dyn Locator>>,
    config: Map<String, Value>,
    closed: AtomicBool,
    span: Span,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("backend", &self.backend.backend_type())
            .field("locator", &self.locator.as_ref().map(|l| l.locator_type()))
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        backend: Arc<dyn Backend>,
        locator: Option<Arc<dyn Locator>>,
        config: Map<String, Value>,
    ) -> Self {
        let id = id.into();
        let span = info_span!("session", id = %id);
        Self {
            id,
            backend,
            locator,
            config,
            closed: AtomicBool::new(false),
            span,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    #[must_use]
    pub fn locator(&self) -> Option<&Arc<dyn Locator>> {
        self.locator.as_ref()
    }

    /// Configuration captured when the session was created.
    #[must_use]
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// Span entered by session-scoped operations.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the session closed without touching the backend.
    /// Returns `true` only for the call that performed the transition.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Closes the session and releases its backend.
    ///
    /// Idempotent: only the first call reaches the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's cleanup error. The session is closed regardless.
    pub fn cleanup(&self) -> anyhow::Result<()> {
        let _entered = self.span.enter();
        if !self.close() {
            return Ok(());
        }
        debug!("releasing session backend");
        self.backend.cleanup()
    }

    /// Element waits bound to this session's backend.
    #[must_use]
    pub fn waits(&self) -> ElementWaits {
        ElementWaits::new(self.backend.clone())
    }

    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            exists: true,
            id: Some(self.id.clone()),
            backend_type: Some(self.backend.backend_type().to_string()),
            locator_type: self.locator.as_ref().map(|l| l.locator_type().to_string()),
            config: self.config.clone(),
        }
    }
}

/// Introspection record returned by [`SessionStore::get_session_info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl SessionInfo {
    /// The record for an id the store does not know.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            exists: false,
            id: None,
            backend_type: None,
            locator_type: None,
            config: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
