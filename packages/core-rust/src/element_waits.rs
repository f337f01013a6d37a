//! Named "wait for element" helpers bound to a backend.

use std::sync::Arc;
use std::time::Duration;

use crate::capability::{Backend, Element, ElementHandle};
use crate::wait::{try_wait_until, wait_until, WaitError, WaitSpec, DEFAULT_POLL_INTERVAL};

/// Polls a backend until a lookup yields an element.
///
/// Each helper validates its identifiers, then repeatedly runs one backend
/// lookup through [`try_wait_until`], keeping the first element found. Lookup
/// errors stop the wait and surface as [`WaitError::Predicate`].
#[derive(Clone)]
pub struct ElementWaits {
    backend: Arc<dyn Backend>,
    poll_interval: Duration,
}

impl std::fmt::Debug for ElementWaits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementWaits")
            .field("backend", &self.backend.backend_type())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl ElementWaits {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the default 50ms poll interval for all helpers.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Generic predicate wait, identical to [`crate::wait::wait_until`].
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] on expiry.
    pub fn wait_until<P>(&self, spec: &WaitSpec, predicate: P) -> Result<(), WaitError>
    where
        P: FnMut() -> bool,
    {
        wait_until(spec, predicate)
    }

    /// # Errors
    ///
    /// [`WaitError::InvalidArgument`] for an empty name, otherwise as
    /// [`try_wait_until`].
    pub fn for_element_by_object_name(
        &self,
        object_name: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, WaitError> {
        require_non_empty("object_name", object_name)?;
        self.wait_for_lookup(
            timeout,
            format!("Element not found with object_name={object_name}"),
            |backend| backend.find_element_by_object_name(object_name),
        )
    }

    /// # Errors
    ///
    /// [`WaitError::InvalidArgument`] for an empty type, otherwise as
    /// [`try_wait_until`].
    pub fn for_element_by_widget_type(
        &self,
        widget_type: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, WaitError> {
        require_non_empty("widget_type", widget_type)?;
        self.wait_for_lookup(
            timeout,
            format!("Element not found with widget_type={widget_type}"),
            |backend| backend.find_element_by_widget_type(widget_type),
        )
    }

    /// # Errors
    ///
    /// [`WaitError::InvalidArgument`] for empty text, otherwise as
    /// [`try_wait_until`].
    pub fn for_element_by_text(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, WaitError> {
        require_non_empty("text", text)?;
        self.wait_for_lookup(
            timeout,
            format!("Element not found with text={text}"),
            |backend| backend.find_element_by_text(text),
        )
    }

    /// # Errors
    ///
    /// [`WaitError::InvalidArgument`] if either string is empty, otherwise as
    /// [`try_wait_until`].
    pub fn for_element_by_property(
        &self,
        property_name: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, WaitError> {
        require_non_empty("property_name", property_name)?;
        require_non_empty("value", value)?;
        self.wait_for_lookup(
            timeout,
            format!("Element not found with {property_name}={value}"),
            |backend| backend.find_element_by_property(property_name, value),
        )
    }

    /// Waits until `element` reports support for `pattern_name`.
    ///
    /// # Errors
    ///
    /// [`WaitError::MissingCapability`] if the element exposes no pattern
    /// capability, [`WaitError::InvalidArgument`] for an empty pattern name,
    /// otherwise as [`wait_until`].
    pub fn for_element_pattern(
        &self,
        element: &dyn Element,
        pattern_name: &str,
        timeout: Duration,
    ) -> Result<(), WaitError> {
        let patterns = element.patterns().ok_or(WaitError::MissingCapability {
            capability: "has_pattern",
        })?;
        require_non_empty("pattern_name", pattern_name)?;
        let spec = self
            .spec(timeout)
            .with_error_message(format!("Pattern not supported: {pattern_name}"));
        wait_until(&spec, || patterns.has_pattern(pattern_name))
    }

    fn spec(&self, timeout: Duration) -> WaitSpec {
        WaitSpec::new(timeout).with_poll_interval(self.poll_interval)
    }

    fn wait_for_lookup<F>(
        &self,
        timeout: Duration,
        message: String,
        lookup: F,
    ) -> Result<ElementHandle, WaitError>
    where
        F: Fn(&dyn Backend) -> anyhow::Result<Option<ElementHandle>>,
    {
        let spec = self.spec(timeout).with_error_message(message);
        let mut found: Option<ElementHandle> = None;
        try_wait_until(&spec, || {
            found = lookup(self.backend.as_ref())?;
            Ok(found.is_some())
        })?;
        found.ok_or_else(|| spec.timeout_error())
    }
}

fn require_non_empty(name: &'static str, value: &str) -> Result<(), WaitError> {
    if value.is_empty() {
        return Err(WaitError::invalid(name, "must be a non-empty string"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::capability::{Criteria, PatternSource, OBJECT_NAME, TEXT, WIDGET_TYPE};

    struct FakeElement {
        label: String,
        pattern_ready_after: Option<u32>,
        pattern_checks: AtomicU32,
    }

    impl FakeElement {
        fn plain(label: &str) -> Self {
            Self {
                label: label.to_string(),
                pattern_ready_after: None,
                pattern_checks: AtomicU32::new(0),
            }
        }

        fn with_pattern_after(checks: u32) -> Self {
            Self {
                pattern_ready_after: Some(checks),
                ..Self::plain("patterned")
            }
        }
    }

    impl PatternSource for FakeElement {
        fn has_pattern(&self, pattern_name: &str) -> bool {
            let seen = self.pattern_checks.fetch_add(1, Ordering::SeqCst) + 1;
            pattern_name == "invoke" && self.pattern_ready_after.is_some_and(|n| seen >= n)
        }
    }

    impl Element for FakeElement {
        fn get_property(&self, name: &str) -> Option<Value> {
            (name == "label").then(|| Value::String(self.label.clone()))
        }

        fn click(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn patterns(&self) -> Option<&dyn PatternSource> {
            self.pattern_ready_after.map(|_| self as &dyn PatternSource)
        }
    }

    /// Backend whose single element appears after a number of lookups.
    struct AppearingBackend {
        criteria: Criteria,
        appear_after: u32,
        lookups: AtomicU32,
        fail: bool,
    }

    impl AppearingBackend {
        fn new(criteria: Criteria, appear_after: u32) -> Self {
            Self {
                criteria,
                appear_after,
                lookups: AtomicU32::new(0),
                fail: false,
            }
        }
    }

    impl Backend for AppearingBackend {
        fn backend_type(&self) -> &str {
            "appearing"
        }

        fn find_element(&self, criteria: &Criteria) -> anyhow::Result<Option<ElementHandle>> {
            if self.fail {
                anyhow::bail!("accessibility tree unavailable");
            }
            let seen = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
            if *criteria == self.criteria && seen >= self.appear_after {
                return Ok(Some(Arc::new(FakeElement::plain("found"))));
            }
            Ok(None)
        }

        fn find_elements(&self, criteria: &Criteria) -> anyhow::Result<Vec<ElementHandle>> {
            Ok(self.find_element(criteria)?.into_iter().collect())
        }
    }

    fn waits_for(backend: AppearingBackend) -> (ElementWaits, Arc<AppearingBackend>) {
        let backend = Arc::new(backend);
        let waits = ElementWaits::new(backend.clone()).with_poll_interval(Duration::from_millis(5));
        (waits, backend)
    }

    fn label_of(element: &ElementHandle) -> Option<Value> {
        element.get_property("label")
    }

    #[test]
    fn object_name_wait_returns_captured_element() {
        let (waits, backend) =
            waits_for(AppearingBackend::new(Criteria::new().with(OBJECT_NAME, "play"), 3));

        let element = waits
            .for_element_by_object_name("play", Duration::from_secs(1))
            .unwrap();

        assert_eq!(label_of(&element), Some(Value::String("found".into())));
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn widget_type_and_text_waits_use_named_lookups() {
        let (waits, _) =
            waits_for(AppearingBackend::new(Criteria::new().with(WIDGET_TYPE, "Slider"), 1));
        assert!(waits
            .for_element_by_widget_type("Slider", Duration::from_millis(200))
            .is_ok());

        let (waits, _) = waits_for(AppearingBackend::new(Criteria::new().with(TEXT, "Quit"), 2));
        assert!(waits.for_element_by_text("Quit", Duration::from_millis(200)).is_ok());
    }

    #[test]
    fn property_wait_times_out_with_descriptive_message() {
        let (waits, _) =
            waits_for(AppearingBackend::new(Criteria::new().with("role", "button"), u32::MAX));

        let err = waits
            .for_element_by_property("role", "dialog", Duration::from_millis(40))
            .err()
            .unwrap();

        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Element not found with role=dialog");
    }

    #[test]
    fn empty_identifiers_are_rejected_before_polling() {
        let (waits, backend) = waits_for(AppearingBackend::new(Criteria::new(), 1));
        let timeout = Duration::from_secs(1);

        for err in [
            waits.for_element_by_object_name("", timeout).err().unwrap(),
            waits.for_element_by_widget_type("", timeout).err().unwrap(),
            waits.for_element_by_text("", timeout).err().unwrap(),
            waits.for_element_by_property("", "x", timeout).err().unwrap(),
            waits.for_element_by_property("role", "", timeout).err().unwrap(),
        ] {
            assert!(matches!(err, WaitError::InvalidArgument { .. }), "got {err:?}");
        }
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn lookup_failure_propagates() {
        let mut backend = AppearingBackend::new(Criteria::new().with(TEXT, "OK"), 1);
        backend.fail = true;
        let (waits, _) = waits_for(backend);

        let err = waits.for_element_by_text("OK", Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, WaitError::Predicate(_)));
    }

    #[test]
    fn pattern_wait_polls_until_supported() {
        let (waits, _) = waits_for(AppearingBackend::new(Criteria::new(), 1));
        let element = FakeElement::with_pattern_after(3);

        waits
            .for_element_pattern(&element, "invoke", Duration::from_secs(1))
            .unwrap();
        assert_eq!(element.pattern_checks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn pattern_wait_times_out_for_unsupported_pattern() {
        let (waits, _) = waits_for(AppearingBackend::new(Criteria::new(), 1));
        let element = FakeElement::with_pattern_after(1);

        let err = waits
            .for_element_pattern(&element, "toggle", Duration::from_millis(30))
            .unwrap_err();
        assert_eq!(err.to_string(), "Pattern not supported: toggle");
    }

    #[test]
    fn pattern_wait_requires_pattern_capability() {
        let (waits, _) = waits_for(AppearingBackend::new(Criteria::new(), 1));
        let element = FakeElement::plain("no patterns");

        let err = waits
            .for_element_pattern(&element, "invoke", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, WaitError::MissingCapability { capability: "has_pattern" }));
    }
}
