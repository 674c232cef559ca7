use std::sync::Arc;

use perfana_core::prelude::DelegatedShutdownListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::broadcaster::log_hook_result;
use crate::client::ClientInner;
use crate::executor::Executor;

/// Fire the scheduled events of a session in order, each at `started + fire_at`.
///
/// Each event goes to the broadcaster and is recorded as an event in Perfana. Stops early on
/// shutdown, which includes the kill switch.
pub(crate) fn start_event_scheduler(
    executor: &Executor,
    inner: Arc<ClientInner>,
    started: Instant,
    mut shutdown_listener: DelegatedShutdownListener,
) -> JoinHandle<()> {
    executor.spawn(async move {
        for event in inner.schedule.iter() {
            let Some(deadline) = started.checked_add(event.fire_at()) else {
                inner.logger.warn(&format!(
                    "Skipping scheduled event `{}`, {:?} is too far in the future",
                    event.event_type(),
                    event.fire_at()
                ));
                continue;
            };

            tokio::select! {
                _ = shutdown_listener.wait_for_shutdown() => {
                    inner.logger.debug("Event scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }

            inner.logger.info(&format!(
                "Firing scheduled event `{}` at {:?}",
                event.event_type(),
                event.fire_at()
            ));

            log_hook_result(
                inner.logger.as_ref(),
                "custom_event",
                inner.broadcaster.custom_event(&inner.context, event),
            );

            let description = event.description().unwrap_or(event.event_type());
            if let Err(e) = inner
                .post_event(&event.title(), description, &mut shutdown_listener)
                .await
            {
                inner.logger.warn(&format!(
                    "Failed to record scheduled event `{}`: {e}",
                    event.event_type()
                ));
            }
        }

        inner.logger.debug("All scheduled events fired");
    })
}
