//! `uiharness` runtime: service registry, session lifecycle, automation facade.
//!
//! [`AutomationFacade::new`] builds a [`ServiceRegistry`] holding the default
//! service catalogue. Sessions come from the registered [`SessionStore`], and
//! waits on UI state go through [`Session::waits`].

pub mod cleanup;
pub mod facade;
pub mod logging;
pub mod service;
pub mod session;

pub use cleanup::{CleanupFailure, CleanupReport};
pub use facade::{AutomationFacade, ServiceInfo};
pub use logging::{init_tracing, LogFormat};
pub use service::{
    service_names, Lifecycle, ManagedService, Provider, ServiceError, ServiceInstance,
    ServiceRegistry,
};
pub use session::{Session, SessionInfo, SessionStore};
