use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uiharness_core::ConfigStore;

use crate::cleanup::CleanupReport;

// ---------------------------------------------------------------------------
// ManagedService trait
// ---------------------------------------------------------------------------

/// Optional teardown capability of a registered service.
///
/// The registry calls `cleanup()` on every instantiated singleton during
/// [`ServiceRegistry::cleanup`], in reverse registration order, and on a
/// singleton superseded by re-registration or unregistration.
pub trait ManagedService: Send + Sync + 'static {
    /// Release resources held by the service.
    fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors surfaced by service resolution and by unconfigured services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service not found: {name}")]
    NotFound { name: String },
    #[error("service `{name}` is a `{actual}`, not a `{expected}`")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("failed to construct service `{name}`: {source}")]
    Construction {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("`{name}` cannot {operation}: no provider registered")]
    Unavailable {
        name: &'static str,
        operation: &'static str,
    },
}

// ---------------------------------------------------------------------------
// ServiceInstance
// ---------------------------------------------------------------------------

/// A resolved service: a type-erased handle plus its optional cleanup hook.
///
/// The handle is usually an `Arc<ConcreteService>` or an `Arc<dyn Trait>`;
/// [`ServiceRegistry::get_as`] recovers it by cloning.
#[derive(Clone)]
pub struct ServiceInstance {
    handle: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    hook: Option<Arc<dyn ManagedService>>,
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type_name", &self.type_name)
            .field("has_cleanup", &self.hook.is_some())
            .finish()
    }
}

impl ServiceInstance {
    /// Wraps a plain value with no cleanup capability.
    pub fn new<T: Clone + Send + Sync + 'static>(handle: T) -> Self {
        Self {
            handle: Arc::new(handle),
            type_name: type_name::<T>(),
            hook: None,
        }
    }

    /// Wraps a managed service; resolves as `Arc<S>`.
    pub fn managed<S: ManagedService>(service: Arc<S>) -> Self {
        let hook: Arc<dyn ManagedService> = service.clone();
        Self::with_cleanup(service, hook)
    }

    /// Wraps `handle` (typically an `Arc<dyn Trait>`) and attaches `hook` as
    /// its cleanup capability.
    pub fn with_cleanup<T: Clone + Send + Sync + 'static>(
        handle: T,
        hook: Arc<dyn ManagedService>,
    ) -> Self {
        Self {
            handle: Arc::new(handle),
            type_name: type_name::<T>(),
            hook: Some(hook),
        }
    }

    /// Type name of the stored handle.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Clones the handle out if it is a `T`.
    #[must_use]
    pub fn downcast<T: Clone + 'static>(&self) -> Option<T> {
        self.handle.downcast_ref::<T>().cloned()
    }

    /// Whether both values came from the same construction.
    #[must_use]
    pub fn same_instance(&self, other: &ServiceInstance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.handle).cast::<()>(),
            Arc::as_ptr(&other.handle).cast::<()>(),
        )
    }

    #[must_use]
    pub fn has_cleanup(&self) -> bool {
        self.hook.is_some()
    }

    /// Runs the cleanup hook. `None` when the instance has no hook.
    fn run_cleanup(&self) -> Option<anyhow::Result<()>> {
        self.hook.as_ref().map(|hook| hook.cleanup())
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

type ConstructorFn = dyn Fn() -> anyhow::Result<ServiceInstance> + Send + Sync;
type FactoryFn = dyn Fn(&ServiceRegistry) -> anyhow::Result<ServiceInstance> + Send + Sync;

/// How a registered service is produced.
#[derive(Clone)]
pub enum Provider {
    /// Zero-argument constructor.
    Constructor(Arc<ConstructorFn>),
    /// Factory receiving the registry, so it can resolve its own dependencies.
    Factory(Arc<FactoryFn>),
    /// Pre-built value returned as is.
    Instance(ServiceInstance),
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl Provider {
    pub fn constructor<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<ServiceInstance> + Send + Sync + 'static,
    {
        Provider::Constructor(Arc::new(f))
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&ServiceRegistry) -> anyhow::Result<ServiceInstance> + Send + Sync + 'static,
    {
        Provider::Factory(Arc::new(f))
    }

    fn kind(&self) -> &'static str {
        match self {
            Provider::Constructor(_) => "constructor",
            Provider::Factory(_) => "factory",
            Provider::Instance(_) => "instance",
        }
    }
}

/// Whether a service is constructed once per registry or once per resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Singleton,
    Transient,
}

struct ServiceDescriptor {
    provider: Provider,
    lifecycle: Lifecycle,
    cached: Option<ServiceInstance>,
    /// Bumped on every registration; a build only caches into its own.
    generation: u64,
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Name-keyed registry of lazily constructed services plus shared config.
///
/// Resolution order for [`get`](Self::get): cached singleton, then the
/// registered provider (factory, constructor or raw instance). Providers run
/// with no internal lock held, so a factory may resolve other services.
/// Singletons are cached first-writer-wins, and only into the registration
/// whose provider built them.
///
/// Registering a name again replaces its descriptor (last write wins) and
/// runs the superseded singleton's cleanup if one had been instantiated.
pub struct ServiceRegistry {
    descriptors: DashMap<String, ServiceDescriptor>,
    /// Registration order for deterministic teardown sequencing.
    order: RwLock<Vec<String>>,
    generations: AtomicU64,
    config: ConfigStore,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.registered_services())
            .field("config_entries", &self.config.len())
            .finish()
    }
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptors: DashMap::new(),
            order: RwLock::new(Vec::new()),
            generations: AtomicU64::new(0),
            config: ConfigStore::new(),
        }
    }

    /// Register `provider` under `name`.
    ///
    /// [`Provider::Instance`] is always treated as an already-built singleton.
    pub fn register(&self, name: impl Into<String>, provider: Provider, lifecycle: Lifecycle) {
        let name = name.into();
        let (lifecycle, cached) = match &provider {
            Provider::Instance(instance) => (Lifecycle::Singleton, Some(instance.clone())),
            _ => (lifecycle, None),
        };
        debug!(%name, kind = provider.kind(), ?lifecycle, "registered service");

        let descriptor = ServiceDescriptor {
            provider,
            lifecycle,
            cached: cached.clone(),
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
        };
        let previous = self.descriptors.insert(name.clone(), descriptor);

        {
            let mut order = self.order.write();
            order.retain(|n| n != &name);
            order.push(name.clone());
        }

        if let Some(old) = previous.and_then(|d| d.cached) {
            let replaced_by_same = cached.is_some_and(|c| c.same_instance(&old));
            if !replaced_by_same {
                Self::retire(&name, &old);
            }
        }
    }

    /// Register a type built with `T::default()`, resolving as `Arc<T>`.
    pub fn register_type<T>(&self, name: impl Into<String>, lifecycle: Lifecycle)
    where
        T: ManagedService + Default,
    {
        self.register(
            name,
            Provider::constructor(|| Ok(ServiceInstance::managed(Arc::new(T::default())))),
            lifecycle,
        );
    }

    /// Register a singleton factory invoked lazily on first resolution.
    pub fn register_factory<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ServiceRegistry) -> anyhow::Result<ServiceInstance> + Send + Sync + 'static,
    {
        self.register(name, Provider::factory(factory), Lifecycle::Singleton);
    }

    /// Register a factory with an explicit lifecycle.
    pub fn register_factory_with<F>(
        &self,
        name: impl Into<String>,
        factory: F,
        lifecycle: Lifecycle,
    ) where
        F: Fn(&ServiceRegistry) -> anyhow::Result<ServiceInstance> + Send + Sync + 'static,
    {
        self.register(name, Provider::factory(factory), lifecycle);
    }

    /// Register a pre-built instance, bypassing construction.
    pub fn register_instance(&self, name: impl Into<String>, instance: ServiceInstance) {
        self.register(name, Provider::Instance(instance), Lifecycle::Singleton);
    }

    /// Resolve a service by name.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if nothing is registered under `name`;
    /// [`ServiceError::Construction`] if the provider fails.
    pub fn get(&self, name: &str) -> Result<ServiceInstance, ServiceError> {
        loop {
            let (provider, lifecycle, generation) = {
                let Some(entry) = self.descriptors.get(name) else {
                    warn!(name, "service not found");
                    return Err(ServiceError::NotFound {
                        name: name.to_string(),
                    });
                };
                if let Some(cached) = &entry.cached {
                    return Ok(cached.clone());
                }
                (entry.provider.clone(), entry.lifecycle, entry.generation)
            };

            let built = match &provider {
                Provider::Factory(factory) => factory(self),
                Provider::Constructor(constructor) => constructor(),
                Provider::Instance(instance) => Ok(instance.clone()),
            };
            let instance = built.map_err(|source| {
                warn!(name, error = %source, "service construction failed");
                ServiceError::Construction {
                    name: name.to_string(),
                    source,
                }
            })?;

            if lifecycle == Lifecycle::Transient {
                return Ok(instance);
            }

            let cached = match self.descriptors.get_mut(name) {
                Some(mut entry) if entry.generation == generation => {
                    Some(entry.cached.get_or_insert_with(|| instance.clone()).clone())
                }
                Some(_) => None,
                // Unregistered while we were constructing; hand out the fresh value.
                None => return Ok(instance),
            };
            // Re-registered while we were constructing; resolve the new provider.
            let Some(winner) = cached else {
                debug!(name, "provider replaced during construction, retrying");
                Self::retire(name, &instance);
                continue;
            };
            if winner.same_instance(&instance) {
                debug!(name, "instantiated singleton");
            } else {
                Self::retire(name, &instance);
            }
            return Ok(winner);
        }
    }

    /// Resolve a service and clone its handle out as `T`.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`ServiceError::TypeMismatch`] when the
    /// stored handle is not a `T`.
    pub fn get_as<T: Clone + 'static>(&self, name: &str) -> Result<T, ServiceError> {
        let instance = self.get(name)?;
        instance.downcast::<T>().ok_or_else(|| ServiceError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            actual: instance.type_name(),
        })
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Remove a registration, cleaning up its singleton if instantiated.
    /// Returns whether anything was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let Some((_, descriptor)) = self.descriptors.remove(name) else {
            return false;
        };
        self.order.write().retain(|n| n != name);
        if let Some(instance) = descriptor.cached {
            Self::retire(name, &instance);
        }
        debug!(name, "unregistered service");
        true
    }

    /// Names of every registered service, in registration order.
    #[must_use]
    pub fn registered_services(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Names of services registered with the singleton lifecycle.
    #[must_use]
    pub fn singleton_services(&self) -> Vec<String> {
        let order = self.order.read().clone();
        order
            .into_iter()
            .filter(|name| {
                self.descriptors
                    .get(name)
                    .is_some_and(|d| d.lifecycle == Lifecycle::Singleton)
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // -- configuration ------------------------------------------------------

    /// The shared configuration store.
    #[must_use]
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn set_config(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.config.set(key, value);
    }

    #[must_use]
    pub fn get_config(&self, key: &str, default: Value) -> Value {
        self.config.get_or(key, default)
    }

    #[must_use]
    pub fn get_all_config(&self) -> Map<String, Value> {
        self.config.snapshot()
    }

    pub fn update_config(&self, entries: Map<String, Value>) {
        self.config.update(entries);
    }

    // -- teardown -----------------------------------------------------------

    /// Clean up every instantiated singleton in reverse registration order,
    /// then drop all registrations and configuration entries.
    ///
    /// A failing cleanup is recorded and logged; the remaining services are
    /// still cleaned up.
    pub fn cleanup(&self) -> CleanupReport {
        let order = std::mem::take(&mut *self.order.write());
        let mut report = CleanupReport::new();

        for name in order.iter().rev() {
            let cached = self
                .descriptors
                .get(name)
                .and_then(|entry| entry.cached.clone());
            if let Some(result) = cached.as_ref().and_then(ServiceInstance::run_cleanup) {
                report.record(name.clone(), result);
            }
        }

        self.descriptors.clear();
        self.config.clear();
        info!(
            cleaned = report.cleaned.len(),
            failed = report.failures.len(),
            "service registry cleanup completed"
        );
        report
    }

    /// Hard reset of services and configuration without running any cleanup.
    pub fn clear(&self) {
        self.descriptors.clear();
        self.order.write().clear();
        self.config.clear();
        info!("service registry cleared");
    }

    fn retire(name: &str, instance: &ServiceInstance) {
        match instance.run_cleanup() {
            Some(Err(e)) => warn!(name, error = %e, "cleanup of superseded service failed"),
            Some(Ok(())) => debug!(name, "cleaned up superseded service"),
            None => {}
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;

    /// Test service that tracks cleanup calls and global ordering.
    struct TestService {
        svc_name: &'static str,
        cleanup_counter: AtomicU32,
        fail_cleanup: bool,
        order_log: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    impl TestService {
        fn new(name: &'static str, order_log: Arc<parking_lot::Mutex<Vec<String>>>) -> Self {
            Self {
                svc_name: name,
                cleanup_counter: AtomicU32::new(0),
                fail_cleanup: false,
                order_log,
            }
        }

        fn failing(name: &'static str, order_log: Arc<parking_lot::Mutex<Vec<String>>>) -> Self {
            Self {
                fail_cleanup: true,
                ..Self::new(name, order_log)
            }
        }
    }

    impl ManagedService for TestService {
        fn cleanup(&self) -> anyhow::Result<()> {
            self.cleanup_counter.fetch_add(1, Ordering::SeqCst);
            self.order_log
                .lock()
                .push(format!("cleanup:{}", self.svc_name));
            if self.fail_cleanup {
                anyhow::bail!("{} refused to stop", self.svc_name);
            }
            Ok(())
        }
    }

    /// A default-constructible service for `register_type`.
    #[derive(Default)]
    struct Counter {
        hits: AtomicU32,
    }

    impl ManagedService for Counter {}

    fn log() -> Arc<parking_lot::Mutex<Vec<String>>> {
        Arc::new(parking_lot::Mutex::new(Vec::new()))
    }

    fn managed_factory(
        name: &'static str,
        order_log: &Arc<parking_lot::Mutex<Vec<String>>>,
        fail: bool,
    ) -> impl Fn(&ServiceRegistry) -> anyhow::Result<ServiceInstance> + Send + Sync + 'static {
        let order_log = order_log.clone();
        move |_| {
            let svc = if fail {
                TestService::failing(name, order_log.clone())
            } else {
                TestService::new(name, order_log.clone())
            };
            Ok(ServiceInstance::managed(Arc::new(svc)))
        }
    }

    #[test]
    fn singleton_resolves_to_same_instance() {
        let registry = ServiceRegistry::new();
        registry.register_type::<Counter>("counter", Lifecycle::Singleton);

        let a = registry.get_as::<Arc<Counter>>("counter").unwrap();
        let b = registry.get_as::<Arc<Counter>>("counter").unwrap();
        a.hits.fetch_add(1, Ordering::SeqCst);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_resolves_to_distinct_instances() {
        let registry = ServiceRegistry::new();
        registry.register_type::<Counter>("counter", Lifecycle::Transient);

        let a = registry.get("counter").unwrap();
        let b = registry.get("counter").unwrap();
        assert!(!a.same_instance(&b));
    }

    #[test]
    fn get_unregistered_returns_not_found() {
        let registry = ServiceRegistry::new();
        let err = registry.get("nonexistent").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { ref name } if name == "nonexistent"));
        assert!(!registry.has("nonexistent"));
    }

    #[test]
    fn factory_singleton_is_invoked_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = ServiceRegistry::new();
        let counter = calls.clone();
        registry.register_factory("clock", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ServiceInstance::new(42_u64))
        });

        assert_eq!(registry.get_as::<u64>("clock").unwrap(), 42);
        assert_eq!(registry.get_as::<u64>("clock").unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_factory_is_invoked_per_resolution() {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = ServiceRegistry::new();
        let counter = calls.clone();
        registry.register_factory_with(
            "ticket",
            move |_| Ok(ServiceInstance::new(counter.fetch_add(1, Ordering::SeqCst))),
            Lifecycle::Transient,
        );

        assert_eq!(registry.get_as::<u32>("ticket").unwrap(), 0);
        assert_eq!(registry.get_as::<u32>("ticket").unwrap(), 1);
    }

    #[test]
    fn factory_can_resolve_dependencies() {
        let registry = ServiceRegistry::new();
        registry.register_instance("base_url", ServiceInstance::new(String::from("ws://game")));
        registry.register_factory("endpoint", |reg| {
            let base = reg.get_as::<String>("base_url")?;
            Ok(ServiceInstance::new(format!("{base}/automation")))
        });

        assert_eq!(registry.get_as::<String>("endpoint").unwrap(), "ws://game/automation");
    }

    #[test]
    fn instance_registration_returns_that_instance() {
        let registry = ServiceRegistry::new();
        let shared = Arc::new(Counter::default());
        registry.register_instance("counter", ServiceInstance::managed(shared.clone()));

        let resolved = registry.get_as::<Arc<Counter>>("counter").unwrap();
        assert!(Arc::ptr_eq(&shared, &resolved));
        assert_eq!(registry.singleton_services(), vec!["counter"]);
    }

    #[test]
    fn construction_failure_is_reported_and_not_cached() {
        let attempts = Arc::new(AtomicU32::new(0));
        let registry = ServiceRegistry::new();
        let counter = attempts.clone();
        registry.register_factory("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("device busy");
            }
            Ok(ServiceInstance::new(()))
        });

        let err = registry.get("flaky").unwrap_err();
        assert!(matches!(err, ServiceError::Construction { .. }));
        assert!(err.to_string().contains("device busy"));
        assert!(registry.get("flaky").is_ok());
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let registry = ServiceRegistry::new();
        registry.register_instance("answer", ServiceInstance::new(42_u64));

        let err = registry.get_as::<String>("answer").unwrap_err();
        match err {
            ServiceError::TypeMismatch { expected, actual, .. } => {
                assert!(expected.contains("String"));
                assert_eq!(actual, "u64");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn reregistration_overwrites_and_cleans_superseded_singleton() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        registry.register_factory("svc", managed_factory("old", &order_log, false));
        let old = registry.get("svc").unwrap();

        registry.register_factory("svc", managed_factory("new", &order_log, false));
        let new = registry.get("svc").unwrap();

        assert!(!old.same_instance(&new));
        assert_eq!(*order_log.lock(), vec!["cleanup:old"]);
        assert_eq!(registry.registered_services(), vec!["svc"]);
    }

    #[test]
    fn reregistration_during_construction_resolves_new_provider() {
        let order_log = log();
        let registry = Arc::new(ServiceRegistry::new());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let entered_tx = parking_lot::Mutex::new(entered_tx);
        let release_rx = parking_lot::Mutex::new(release_rx);
        let old_log = order_log.clone();
        registry.register_factory("svc", move |_| {
            entered_tx.lock().send(()).ok();
            release_rx.lock().recv().ok();
            Ok(ServiceInstance::managed(Arc::new(TestService::new("old", old_log.clone()))))
        });

        let resolver = {
            let registry = registry.clone();
            std::thread::spawn(move || registry.get_as::<Arc<TestService>>("svc").unwrap())
        };
        entered_rx.recv().unwrap();
        registry.register_factory("svc", managed_factory("new", &order_log, false));
        release_tx.send(()).unwrap();

        let raced = resolver.join().unwrap();
        let now = registry.get_as::<Arc<TestService>>("svc").unwrap();
        assert_eq!(raced.svc_name, "new");
        assert!(Arc::ptr_eq(&raced, &now));
        assert_eq!(*order_log.lock(), vec!["cleanup:old"]);
    }

    #[test]
    fn reregistering_same_instance_does_not_clean_it() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        let service = Arc::new(TestService::new("same", order_log.clone()));
        let instance = ServiceInstance::managed(service);
        registry.register_instance("svc", instance.clone());
        registry.register_instance("svc", instance);

        assert!(order_log.lock().is_empty());
    }

    #[test]
    fn unregister_removes_and_reports() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        registry.register_factory("svc", managed_factory("svc", &order_log, false));
        registry.get("svc").unwrap();

        assert!(registry.unregister("svc"));
        assert!(!registry.has("svc"));
        assert!(!registry.unregister("svc"));
        assert_eq!(*order_log.lock(), vec!["cleanup:svc"]);
    }

    #[test]
    fn cleanup_runs_in_reverse_registration_order() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        for name in ["first", "second", "third"] {
            registry.register_factory(name, managed_factory(name, &order_log, false));
            registry.get(name).unwrap();
        }

        let report = registry.cleanup();

        assert!(report.is_success());
        assert_eq!(
            *order_log.lock(),
            vec!["cleanup:third", "cleanup:second", "cleanup:first"]
        );
        assert_eq!(report.cleaned, vec!["third", "second", "first"]);
    }

    #[test]
    fn cleanup_isolates_failures_and_clears_registrations() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        registry.register_factory("healthy", managed_factory("healthy", &order_log, false));
        registry.register_factory("broken", managed_factory("broken", &order_log, true));
        registry.get("healthy").unwrap();
        registry.get("broken").unwrap();
        registry.set_config("timeout", 5.0);

        let report = registry.cleanup();

        assert_eq!(report.cleaned, vec!["healthy"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "broken");
        assert!(registry.is_empty());
        assert!(registry.registered_services().is_empty());
        assert!(registry.get_all_config().is_empty());
        assert_eq!(*order_log.lock(), vec!["cleanup:broken", "cleanup:healthy"]);
    }

    #[test]
    fn cleanup_skips_uninstantiated_and_hookless_services() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        registry.register_factory("lazy", managed_factory("lazy", &order_log, false));
        registry.register_instance("plain", ServiceInstance::new(7_i32));

        let report = registry.cleanup();

        assert!(report.cleaned.is_empty());
        assert!(order_log.lock().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_drops_everything_without_cleanup() {
        let order_log = log();
        let registry = ServiceRegistry::new();
        registry.register_factory("svc", managed_factory("svc", &order_log, false));
        registry.get("svc").unwrap();
        registry.set_config("timeout", 5.0);

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.get_all_config().is_empty());
        assert!(order_log.lock().is_empty());
    }

    #[test]
    fn config_accessors_delegate_to_store() {
        let registry = ServiceRegistry::new();
        registry.set_config("timeout", 30.0);
        let mut batch = Map::new();
        batch.insert("retry_attempts".into(), json!(3));
        batch.insert("log_level".into(), json!("INFO"));
        registry.update_config(batch);

        assert_eq!(registry.get_config("timeout", Value::Null), json!(30.0));
        assert_eq!(registry.get_config("missing", json!(false)), json!(false));
        assert_eq!(registry.get_all_config().len(), 3);
        assert_eq!(registry.config().get_typed::<u32>("retry_attempts"), Some(3));
    }

    #[test]
    fn concurrent_singleton_resolution_yields_one_instance() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register_type::<Counter>("counter", Lifecycle::Singleton);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_as::<Arc<Counter>>("counter").unwrap())
            })
            .collect();
        let resolved: Vec<Arc<Counter>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let first = registry.get_as::<Arc<Counter>>("counter").unwrap();
        assert!(resolved.iter().all(|c| Arc::ptr_eq(c, &first)));
    }
}
