use tracing::debug;
use uiharness_core::{Criteria, ElementHandle};

use crate::service::contracts::ElementDiscoveryService;
use crate::session::Session;

/// Looks elements up through the session's locator, or its backend when the
/// session has none.
#[derive(Debug, Default)]
pub struct DefaultElementDiscovery;

impl ElementDiscoveryService for DefaultElementDiscovery {
    fn find_element(
        &self,
        session: &Session,
        criteria: &Criteria,
    ) -> anyhow::Result<Option<ElementHandle>> {
        let _entered = session.span().enter();
        let found = match session.locator() {
            Some(locator) => locator.locate(criteria)?,
            None => session.backend().find_element(criteria)?,
        };
        debug!(%criteria, found = found.is_some(), "find_element");
        Ok(found)
    }

    fn find_elements(
        &self,
        session: &Session,
        criteria: &Criteria,
    ) -> anyhow::Result<Vec<ElementHandle>> {
        let _entered = session.span().enter();
        let found = match session.locator() {
            Some(locator) => locator.locate_all(criteria)?,
            None => session.backend().find_elements(criteria)?,
        };
        debug!(%criteria, count = found.len(), "find_elements");
        Ok(found)
    }
}
