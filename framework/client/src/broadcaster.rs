use std::collections::BTreeMap;

use perfana_core::prelude::ClientLogger;
use perfana_schedule::prelude::ScheduledEvent;

use crate::context::TestContext;

/// Extra properties for broadcaster plugins, keyed by plugin class and then by property name.
pub type EventProperties = BTreeMap<String, BTreeMap<String, String>>;

/// Hooks into the session lifecycle, for example to restart a service when a scheduled event
/// fires.
///
/// Every hook is optional. Errors are logged and never stop the session. Hooks are called from
/// the client's background tasks as well as from the caller's thread, so keep them short.
pub trait EventBroadcaster: Send + Sync {
    fn before_test(&self, _context: &TestContext, _properties: &EventProperties) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_test(&self, _context: &TestContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn keep_alive(&self, _context: &TestContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn abort_test(&self, _context: &TestContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn custom_event(&self, _context: &TestContext, _event: &ScheduledEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl EventBroadcaster for NoopBroadcaster {}

/// Log a failed hook and carry on.
pub(crate) fn log_hook_result(logger: &dyn ClientLogger, hook: &str, result: anyhow::Result<()>) {
    if let Err(e) = result {
        logger.error(&format!("Broadcaster hook `{hook}` failed: {e:?}"));
    }
}
