use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uiharness_core::{Backend, Locator};

use super::{Session, SessionInfo};
use crate::cleanup::CleanupReport;
use crate::service::ManagedService;

/// Tracks open sessions by id.
///
/// Read and close paths never fail: lookups of unknown ids return `None`,
/// `false`, `0` or [`SessionInfo::missing`]. Only creation may return an
/// error. A session closed through its own handle counts as absent and is
/// replaced the next time its id is created.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session, or returns the open one already stored under `id`.
    ///
    /// Without an id a short random one (`session_` + 8 hex chars) is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the supplied id is empty.
    pub fn create_session(
        &self,
        backend: Arc<dyn Backend>,
        locator: Option<Arc<dyn Locator>>,
        id: Option<&str>,
    ) -> anyhow::Result<Arc<Session>> {
        self.create_session_with_config(backend, locator, id, Map::new())
    }

    /// As [`create_session`](Self::create_session), capturing `config` in the
    /// new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the supplied id is empty.
    pub fn create_session_with_config(
        &self,
        backend: Arc<dyn Backend>,
        locator: Option<Arc<dyn Locator>>,
        id: Option<&str>,
        config: Map<String, Value>,
    ) -> anyhow::Result<Arc<Session>> {
        let id = match id {
            Some("") => anyhow::bail!("session id must not be empty"),
            Some(id) => id.to_string(),
            None => generate_session_id(),
        };

        let mut sessions = self.sessions.write();
        match sessions.get(&id) {
            Some(existing) if !existing.is_closed() => {
                warn!(session_id = %id, "session already exists, returning existing session");
                return Ok(existing.clone());
            }
            Some(_) => debug!(session_id = %id, "replacing closed session"),
            None => {}
        }
        let session = Arc::new(Session::new(id.clone(), backend, locator, config));
        sessions.insert(id.clone(), session.clone());
        info!(session_id = %id, "created automation session");
        Ok(session)
    }

    #[must_use]
    pub fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.open(id);
        if session.is_none() {
            warn!(session_id = id, "session not found");
        }
        session
    }

    /// Runs the session's cleanup and drops it from the store.
    ///
    /// Returns whether a session was found. A failing cleanup is logged; the
    /// record is removed either way.
    pub fn close_session(&self, id: &str) -> bool {
        let Some(session) = self.sessions.write().remove(id) else {
            warn!(session_id = id, "session not found for closing");
            return false;
        };
        if let Err(e) = session.cleanup() {
            warn!(session_id = id, error = %e, "session cleanup failed");
        }
        info!(session_id = id, "closed automation session");
        true
    }

    /// Closes every tracked session, continuing past individual failures.
    pub fn cleanup_all_sessions(&self) -> CleanupReport {
        let drained: Vec<(String, Arc<Session>)> = self.sessions.write().drain().collect();
        let mut report = CleanupReport::new();
        for (id, session) in drained {
            let result = session.cleanup();
            report.record(id, result);
        }
        info!(
            closed = report.cleaned.len(),
            failed = report.failures.len(),
            "closed all sessions"
        );
        report
    }

    #[must_use]
    pub fn get_active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .values()
            .filter(|s| !s.is_closed())
            .map(|s| s.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn get_session_count(&self) -> usize {
        self.sessions.read().values().filter(|s| !s.is_closed()).count()
    }

    #[must_use]
    pub fn is_session_active(&self, id: &str) -> bool {
        self.open(id).is_some()
    }

    #[must_use]
    pub fn get_session_info(&self, id: &str) -> SessionInfo {
        self.open(id).map_or_else(SessionInfo::missing, |s| s.info())
    }

    fn open(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).filter(|s| !s.is_closed()).cloned()
    }
}

impl ManagedService for SessionStore {
    fn cleanup(&self) -> anyhow::Result<()> {
        self.cleanup_all_sessions().into_result()
    }
}

fn generate_session_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}", &hex[..8])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
