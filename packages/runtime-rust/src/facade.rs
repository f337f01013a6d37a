//! Entry point tying the registry, sessions and services together.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};
use uiharness_core::{AutomationConfig, Backend, Criteria, ElementHandle};

use crate::cleanup::CleanupReport;
use crate::service::domain::ConfigurationManager;
use crate::service::{
    register_defaults, service_names, BackendFactory, ElementDiscoveryService, ElementFactory,
    InputService, LocatorFactory, MemoryLeakDetector, PerformanceAnalyzer, PerformanceMonitor,
    PerformanceTester, Region, Screenshot, ScreenshotService, ServiceError, ServiceRegistry,
    TypedElement, VisualTestingService,
};
use crate::session::{Session, SessionStore};

static GLOBAL: Mutex<Option<Arc<AutomationFacade>>> = parking_lot::const_mutex(None);

/// Snapshot returned by [`AutomationFacade::service_info`].
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub registered_services: Vec<String>,
    pub singleton_services: Vec<String>,
    pub configuration: Map<String, Value>,
}

/// Owns a [`ServiceRegistry`] and the current session.
///
/// Construct one per process entry point and pass it around, or use the
/// shared handle from [`AutomationFacade::global`]. Every operation resolves
/// its service from the registry at call time, so registering a replacement
/// provider takes effect immediately.
pub struct AutomationFacade {
    registry: Arc<ServiceRegistry>,
    current_session: ArcSwapOption<Session>,
    config: ArcSwapOption<AutomationConfig>,
}

impl std::fmt::Debug for AutomationFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationFacade")
            .field("registry", &self.registry)
            .field(
                "current_session",
                &self.current_session.load().as_ref().map(|s| s.id().to_string()),
            )
            .finish_non_exhaustive()
    }
}

impl Default for AutomationFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomationFacade {
    /// A facade over a fresh registry holding the default catalogue.
    #[must_use]
    pub fn new() -> Self {
        let registry = ServiceRegistry::new();
        register_defaults(&registry);
        info!("automation facade initialized");
        Self::with_registry(Arc::new(registry))
    }

    /// A facade over `registry` exactly as given.
    #[must_use]
    pub fn with_registry(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            current_session: ArcSwapOption::empty(),
            config: ArcSwapOption::empty(),
        }
    }

    /// The process-wide facade, created on first use.
    pub fn global() -> Arc<AutomationFacade> {
        GLOBAL
            .lock()
            .get_or_insert_with(|| Arc::new(AutomationFacade::new()))
            .clone()
    }

    /// Detaches the process-wide facade so the next [`global`](Self::global)
    /// call builds a fresh one.
    pub fn reset_global() -> Option<Arc<AutomationFacade>> {
        GLOBAL.lock().take()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    // -- service accessors --------------------------------------------------

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn backend_factory(&self) -> Result<Arc<dyn BackendFactory>, ServiceError> {
        self.registry.get_as(service_names::BACKEND_FACTORY)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn locator_factory(&self) -> Result<Arc<dyn LocatorFactory>, ServiceError> {
        self.registry.get_as(service_names::LOCATOR_FACTORY)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn session_manager(&self) -> Result<Arc<SessionStore>, ServiceError> {
        self.registry.get_as(service_names::SESSION_MANAGER)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn configuration_manager(&self) -> Result<Arc<ConfigurationManager>, ServiceError> {
        self.registry.get_as(service_names::CONFIGURATION_MANAGER)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn element_discovery_service(
        &self,
    ) -> Result<Arc<dyn ElementDiscoveryService>, ServiceError> {
        self.registry.get_as(service_names::ELEMENT_DISCOVERY_SERVICE)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn screenshot_service(&self) -> Result<Arc<dyn ScreenshotService>, ServiceError> {
        self.registry.get_as(service_names::SCREENSHOT_SERVICE)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn performance_monitor(&self) -> Result<Arc<dyn PerformanceMonitor>, ServiceError> {
        self.registry.get_as(service_names::PERFORMANCE_MONITOR)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn visual_testing_service(&self) -> Result<Arc<dyn VisualTestingService>, ServiceError> {
        self.registry.get_as(service_names::VISUAL_TESTING_SERVICE)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn input_service(&self) -> Result<Arc<dyn InputService>, ServiceError> {
        self.registry.get_as(service_names::INPUT_SERVICE)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn element_factory(&self) -> Result<Arc<dyn ElementFactory>, ServiceError> {
        self.registry.get_as(service_names::ELEMENT_FACTORY)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn performance_analyzer(&self) -> Result<Arc<dyn PerformanceAnalyzer>, ServiceError> {
        self.registry.get_as(service_names::PERFORMANCE_ANALYZER)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn performance_tester(&self) -> Result<Arc<dyn PerformanceTester>, ServiceError> {
        self.registry.get_as(service_names::PERFORMANCE_TESTER)
    }

    /// # Errors
    ///
    /// Fails if the service is missing, cannot be built, or has the wrong type.
    pub fn memory_leak_detector(&self) -> Result<Arc<dyn MemoryLeakDetector>, ServiceError> {
        self.registry.get_as(service_names::MEMORY_LEAK_DETECTOR)
    }

    // -- sessions -----------------------------------------------------------

    /// Creates a session and makes it current.
    ///
    /// A supplied config is validated, its non-null fields are written into
    /// the registry configuration, and its `backend_type` selects the backend.
    /// Without one, a `backend_type` config key (or the host platform) is used.
    ///
    /// # Errors
    ///
    /// Fails on invalid config, a missing service, or backend/locator
    /// construction failure.
    pub fn create_session(&self, config: Option<AutomationConfig>) -> anyhow::Result<Arc<Session>> {
        logged("create_session", self.try_create_session(config))
    }

    fn try_create_session(&self, config: Option<AutomationConfig>) -> anyhow::Result<Arc<Session>> {
        let platform = match config {
            Some(config) => {
                config.validate()?;
                self.registry.update_config(config.to_entries());
                let platform = config.backend_type.clone();
                self.config.store(Some(Arc::new(config)));
                Some(platform)
            }
            None => self.registry.config().get_typed::<String>("backend_type"),
        };

        let backend = self.backend_factory()?.create_backend(platform.as_deref())?;
        let locator = self.locator_factory()?.create_locator(backend.clone())?;
        let session = self.session_manager()?.create_session_with_config(
            backend,
            Some(locator),
            None,
            self.registry.get_all_config(),
        )?;

        if let Some(previous) = self.current_session.swap(Some(session.clone())) {
            debug!(previous = previous.id(), "replaced current session");
        }
        info!(session_id = session.id(), "automation session created");
        Ok(session)
    }

    #[must_use]
    pub fn get_current_session(&self) -> Option<Arc<Session>> {
        self.current_session.load_full()
    }

    /// The config passed to the most recent successful-validation
    /// [`create_session`](Self::create_session).
    #[must_use]
    pub fn current_config(&self) -> Option<Arc<AutomationConfig>> {
        self.config.load_full()
    }

    /// Closes the current session, if any.
    ///
    /// # Errors
    ///
    /// Fails if the session manager cannot be resolved; the session then
    /// stays current.
    pub fn close_session(&self) -> anyhow::Result<()> {
        let Some(session) = self.current_session.load_full() else {
            return Ok(());
        };
        let store = logged("close_session", self.session_manager().map_err(Into::into))?;
        store.close_session(session.id());
        self.current_session.store(None);
        info!(session_id = session.id(), "automation session closed");
        Ok(())
    }

    // -- delegations --------------------------------------------------------

    /// # Errors
    ///
    /// Fails for unsupported platforms or if the backend factory is missing.
    pub fn create_backend(&self, platform: Option<&str>) -> anyhow::Result<Arc<dyn Backend>> {
        logged(
            "create_backend",
            self.backend_factory()
                .map_err(Into::into)
                .and_then(|factory| factory.create_backend(platform)),
        )
        .inspect(|_| info!(platform = platform.unwrap_or("auto"), "backend created"))
    }

    /// # Errors
    ///
    /// Fails for unknown element types or if the element factory is missing.
    pub fn create_element(
        &self,
        element_type: &str,
        native: ElementHandle,
        session: &Session,
    ) -> anyhow::Result<TypedElement> {
        logged(
            "create_element",
            self.element_factory()
                .map_err(Into::into)
                .and_then(|factory| factory.create_element(element_type, native, session)),
        )
    }

    /// # Errors
    ///
    /// Propagates lookup failures and a missing discovery service.
    pub fn find_element(
        &self,
        session: &Session,
        criteria: &Criteria,
    ) -> anyhow::Result<Option<ElementHandle>> {
        logged(
            "find_element",
            self.element_discovery_service()
                .map_err(Into::into)
                .and_then(|discovery| discovery.find_element(session, criteria)),
        )
    }

    /// # Errors
    ///
    /// Propagates lookup failures and a missing discovery service.
    pub fn find_elements(
        &self,
        session: &Session,
        criteria: &Criteria,
    ) -> anyhow::Result<Vec<ElementHandle>> {
        logged(
            "find_elements",
            self.element_discovery_service()
                .map_err(Into::into)
                .and_then(|discovery| discovery.find_elements(session, criteria)),
        )
    }

    /// # Errors
    ///
    /// Fails if capture fails or no screenshot provider is configured.
    pub fn take_screenshot(
        &self,
        session: &Session,
        region: Option<Region>,
    ) -> anyhow::Result<Option<Screenshot>> {
        logged(
            "take_screenshot",
            self.screenshot_service()
                .map_err(Into::into)
                .and_then(|service| service.capture_screenshot(session, region)),
        )
    }

    /// # Errors
    ///
    /// Fails if sampling fails or no performance monitor is configured.
    pub fn get_performance_metrics(&self, session: &Session) -> anyhow::Result<Map<String, Value>> {
        logged(
            "get_performance_metrics",
            self.performance_monitor()
                .map_err(Into::into)
                .and_then(|monitor| monitor.get_metrics(session)),
        )
    }

    /// # Errors
    ///
    /// Fails if the comparison fails or no visual testing provider is
    /// configured.
    pub fn perform_visual_test(
        &self,
        session: &Session,
        baseline: &Path,
        current: &Screenshot,
    ) -> anyhow::Result<Map<String, Value>> {
        logged(
            "perform_visual_test",
            self.visual_testing_service()
                .map_err(Into::into)
                .and_then(|service| service.compare_with_baseline(session, baseline, current)),
        )
    }

    /// # Errors
    ///
    /// Fails if injection fails or no input provider is configured.
    pub fn send_input(
        &self,
        session: &Session,
        input_type: &str,
        params: &Map<String, Value>,
    ) -> anyhow::Result<bool> {
        logged(
            "send_input",
            self.input_service()
                .map_err(Into::into)
                .and_then(|service| service.send_input(session, input_type, params)),
        )
    }

    /// Settings held by the configuration manager.
    ///
    /// # Errors
    ///
    /// Fails if the configuration manager cannot be resolved.
    pub fn get_configuration(&self) -> anyhow::Result<Map<String, Value>> {
        Ok(self.configuration_manager()?.get_all())
    }

    /// # Errors
    ///
    /// Fails if the configuration manager cannot be resolved.
    pub fn update_configuration(&self, entries: Map<String, Value>) -> anyhow::Result<()> {
        self.configuration_manager()?.update(entries);
        Ok(())
    }

    #[must_use]
    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            registered_services: self.registry.registered_services(),
            singleton_services: self.registry.singleton_services(),
            configuration: self.registry.get_all_config(),
        }
    }

    // -- teardown -----------------------------------------------------------

    /// Closes the current session, cleans up every instantiated service and
    /// detaches this facade from the global handle if it is the global one.
    ///
    /// The registry is empty afterwards; build a new facade to continue.
    pub fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::new();
        if self.current_session.load().is_some() {
            report.record("current_session", self.close_session());
        }
        report.merge(self.registry.cleanup());
        self.current_session.store(None);

        let mut global = GLOBAL.lock();
        if global
            .as_ref()
            .is_some_and(|g| std::ptr::eq(Arc::as_ptr(g), self))
        {
            *global = None;
        }
        drop(global);

        info!(
            cleaned = report.cleaned.len(),
            failed = report.failures.len(),
            "automation facade cleanup completed"
        );
        report
    }
}

fn logged<T>(operation: &'static str, result: anyhow::Result<T>) -> anyhow::Result<T> {
    if let Err(e) = &result {
        error!(operation, error = %format!("{e:#}"), "automation operation failed");
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;
    use uiharness_core::Element;

    use super::*;
    use crate::service::ServiceInstance;
    use crate::session::tests::NullBackend;

    struct Button;

    impl Element for Button {
        fn get_property(&self, name: &str) -> Option<Value> {
            match name {
                "object_name" => Some(json!("ok_button")),
                "ControlType" => Some(json!("Button")),
                _ => None,
            }
        }

        fn click(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Backend exposing a single button.
    struct DialogBackend;

    impl Backend for DialogBackend {
        fn backend_type(&self) -> &str {
            "dialog"
        }

        fn find_element(&self, criteria: &Criteria) -> anyhow::Result<Option<ElementHandle>> {
            Ok(self.find_elements(criteria)?.into_iter().next())
        }

        fn find_elements(&self, criteria: &Criteria) -> anyhow::Result<Vec<ElementHandle>> {
            let button: ElementHandle = Arc::new(Button);
            let matches = criteria
                .iter()
                .all(|(key, value)| button.get_property(key) == Some(json!(value)));
            Ok(if matches { vec![button] } else { Vec::new() })
        }
    }

    /// Backend factory that hands out one backend type and counts calls.
    struct FakeBackendFactory {
        backend: Arc<dyn Backend>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl FakeBackendFactory {
        fn new(backend: Arc<dyn Backend>) -> Arc<Self> {
            Arc::new(Self {
                backend,
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    impl BackendFactory for FakeBackendFactory {
        fn create_backend(&self, platform: Option<&str>) -> anyhow::Result<Arc<dyn Backend>> {
            self.requested.lock().push(platform.map(String::from));
            Ok(self.backend.clone())
        }

        fn supported_platforms(&self) -> Vec<String> {
            vec!["fake".into()]
        }
    }

    fn facade_with(backend: Arc<dyn Backend>) -> (AutomationFacade, Arc<FakeBackendFactory>) {
        let facade = AutomationFacade::new();
        let factory = FakeBackendFactory::new(backend);
        let handle: Arc<dyn BackendFactory> = factory.clone();
        facade
            .registry()
            .register_instance(service_names::BACKEND_FACTORY, ServiceInstance::new(handle));
        (facade, factory)
    }

    #[test]
    fn create_then_close_session_end_to_end() {
        let facade = AutomationFacade::new();
        let factory = FakeBackendFactory::new(Arc::new(NullBackend::default()));
        let handle: Arc<dyn BackendFactory> = factory.clone();
        let store = Arc::new(SessionStore::new());
        facade
            .registry()
            .register_instance(service_names::BACKEND_FACTORY, ServiceInstance::new(handle));
        facade
            .registry()
            .register_instance(
                service_names::SESSION_MANAGER,
                ServiceInstance::managed(store.clone()),
            );

        let config = AutomationConfig {
            backend_type: "web".into(),
            ..AutomationConfig::default()
        };
        let session = facade.create_session(Some(config)).unwrap();

        let current = facade.get_current_session().unwrap();
        assert!(Arc::ptr_eq(&current, &session));
        assert!(store.is_session_active(session.id()));
        assert_eq!(*factory.requested.lock(), vec![Some("web".to_string())]);
        assert_eq!(session.config()["backend_type"], json!("web"));
        assert_eq!(session.info().locator_type.as_deref(), Some("backend"));

        facade.close_session().unwrap();

        assert!(facade.get_current_session().is_none());
        assert!(!store.is_session_active(session.id()));
        assert!(session.is_closed());
        facade.close_session().unwrap();
    }

    #[test]
    fn invalid_config_is_rejected_before_backend_creation() {
        let (facade, factory) = facade_with(Arc::new(NullBackend::default()));
        let config = AutomationConfig {
            screenshot_quality: 250,
            ..AutomationConfig::default()
        };

        assert!(facade.create_session(Some(config)).is_err());
        assert!(factory.requested.lock().is_empty());
        assert!(facade.get_current_session().is_none());
    }

    #[test]
    fn default_backend_factory_has_no_native_backends() {
        let facade = AutomationFacade::new();
        let err = facade.create_session(None).unwrap_err();
        assert!(err.to_string().starts_with("Unsupported platform"));
    }

    #[test]
    fn backend_type_config_key_selects_platform() {
        let (facade, factory) = facade_with(Arc::new(NullBackend::default()));
        facade.registry().set_config("backend_type", "linux");

        facade.create_session(None).unwrap();
        assert_eq!(*factory.requested.lock(), vec![Some("linux".to_string())]);
    }

    #[test]
    fn find_and_wrap_elements_through_services() {
        let (facade, _) = facade_with(Arc::new(DialogBackend));
        let session = facade.create_session(None).unwrap();
        let criteria = Criteria::new().with("object_name", "ok_button");

        let native = facade.find_element(&session, &criteria).unwrap().unwrap();
        assert_eq!(facade.find_elements(&session, &criteria).unwrap().len(), 1);
        assert!(facade
            .find_element(&session, &Criteria::new().with("object_name", "cancel"))
            .unwrap()
            .is_none());

        let element: TypedElement = facade.create_element("auto", native, &session).unwrap();
        assert_eq!(element.kind(), crate::service::ElementKind::Button);
        assert_eq!(element.session_id(), session.id());
        element.click().unwrap();
    }

    #[test]
    fn session_waits_find_elements_on_session_backend() {
        let (facade, _) = facade_with(Arc::new(DialogBackend));
        let session = facade.create_session(None).unwrap();

        let found = session
            .waits()
            .for_element_by_object_name("ok_button", std::time::Duration::from_millis(200))
            .unwrap();
        assert_eq!(found.get_property("ControlType"), Some(json!("Button")));
    }

    #[test]
    fn unconfigured_services_report_unavailable() {
        let (facade, _) = facade_with(Arc::new(NullBackend::default()));
        let session = facade.create_session(None).unwrap();

        let err = facade.take_screenshot(&session, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::Unavailable {
                name: service_names::SCREENSHOT_SERVICE,
                ..
            })
        ));
        assert!(facade.get_performance_metrics(&session).is_err());
        assert!(facade.send_input(&session, "keyboard", &Map::new()).is_err());

        let mut action = || -> anyhow::Result<()> { Ok(()) };
        assert!(facade
            .performance_tester()
            .unwrap()
            .measure_action(&mut action, 1, 5)
            .is_err());
        assert!(facade
            .memory_leak_detector()
            .unwrap()
            .check_memory_leaks(&mut action, 10, 1.0)
            .is_err());
        assert!(facade.performance_analyzer().unwrap().analyze_metrics(&[]).is_err());
    }

    #[test]
    fn replacement_provider_takes_effect() {
        struct CountingInput(AtomicU32);

        impl InputService for CountingInput {
            fn send_input(
                &self,
                _session: &Session,
                _input_type: &str,
                _params: &Map<String, Value>,
            ) -> anyhow::Result<bool> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        }

        let (facade, _) = facade_with(Arc::new(NullBackend::default()));
        let session = facade.create_session(None).unwrap();
        let input = Arc::new(CountingInput(AtomicU32::new(0)));
        let handle: Arc<dyn InputService> = input.clone();
        facade
            .registry()
            .register_instance(service_names::INPUT_SERVICE, ServiceInstance::new(handle));

        assert!(facade.send_input(&session, "mouse", &Map::new()).unwrap());
        assert_eq!(input.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn configuration_round_trips_through_manager() {
        let facade = AutomationFacade::new();
        let mut update = Map::new();
        update.insert("max_sessions".into(), json!(4));
        facade.update_configuration(update).unwrap();

        let config = facade.get_configuration().unwrap();
        assert_eq!(config["max_sessions"], json!(4));
        assert_eq!(config["default_timeout"], json!(10.0));
    }

    #[test]
    fn service_info_lists_catalogue_and_config() {
        let facade = AutomationFacade::new();
        let info = facade.service_info();

        assert_eq!(info.registered_services.len(), 19);
        assert!(info
            .singleton_services
            .contains(&service_names::SESSION_MANAGER.to_string()));
        assert!(!info
            .singleton_services
            .contains(&service_names::BUTTON_ELEMENT.to_string()));
        assert_eq!(info.configuration["timeout"], json!(30.0));
    }

    #[test]
    fn cleanup_closes_session_and_empties_registry() {
        let backend = Arc::new(NullBackend::default());
        let (facade, _) = facade_with(backend.clone());
        let session = facade.create_session(None).unwrap();

        let report = facade.cleanup();

        assert!(report.is_success());
        assert!(session.is_closed());
        assert_eq!(backend.cleanups.load(Ordering::SeqCst), 1);
        assert!(facade.get_current_session().is_none());
        assert!(facade.registry().is_empty());
    }

    #[test]
    fn global_handle_is_shared_until_cleanup() {
        let first = AutomationFacade::global();
        let second = AutomationFacade::global();
        assert!(Arc::ptr_eq(&first, &second));

        first.cleanup();
        let third = AutomationFacade::global();
        assert!(!Arc::ptr_eq(&first, &third));
        AutomationFacade::reset_global();
    }
}
