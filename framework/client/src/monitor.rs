use std::sync::Arc;

use perfana_core::prelude::{DelegatedShutdownListener, KillSwitch, KillSwitchError, SharedLogger};
use tokio::task::JoinHandle;

use crate::broadcaster::log_hook_result;
use crate::client::ClientInner;
use crate::context::TestContext;
use crate::error::PerfanaError;
use crate::executor::Executor;
use crate::message::{parse_test_run_status, perfana_message_to_json, TestRunStatus};
use crate::transport::Transport;

/// Reports the test run to Perfana and turns an abort directive into a kill switch.
#[derive(Debug, Clone)]
pub(crate) struct SessionMonitor {
    transport: Transport,
    logger: SharedLogger,
}

impl SessionMonitor {
    pub(crate) fn new(transport: Transport, logger: SharedLogger) -> Self {
        Self { transport, logger }
    }

    /// Send the test context to `/test` and read the directive in the reply.
    ///
    /// Returns [PerfanaError::KillSwitch] when the reply asks for an abort, whatever the value of
    /// `completed`. Transport failures come back after the retry policy has run out.
    pub(crate) async fn call_test_endpoint(
        &self,
        context: &TestContext,
        completed: bool,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<TestRunStatus, PerfanaError> {
        let body = perfana_message_to_json(context, completed)?;
        self.logger.debug(&format!("Reporting test run: {body}"));

        let reply = self.transport.post_json(&["test"], body, cancel).await?;
        let url = self.transport.settings().endpoint(&["test"]);
        let status = parse_test_run_status(&url, &reply.body)?;

        if status.abort {
            let reason = status
                .abort_message
                .clone()
                .unwrap_or_else(|| "Perfana requested to abort the test".to_string());
            self.logger.warn(&format!(
                "Kill switch for test run {}: {reason}",
                context.test_run_id()
            ));
            return Err(KillSwitchError::new(reason).into());
        }

        if !status.test_results.is_empty() {
            self.logger.info(&format!(
                "Perfana returned {} test result(s) for {}",
                status.test_results.len(),
                context.test_run_id()
            ));
        }

        Ok(status)
    }
}

/// Keep the test run alive in Perfana and watch for an abort directive.
///
/// Every keep-alive interval the test context is reported. An abort directive triggers the
/// session's kill switch, which also stops the other background tasks. Failures to reach Perfana
/// are logged and do not stop the monitor.
pub(crate) fn start_keep_alive(
    executor: &Executor,
    inner: Arc<ClientInner>,
    kill_switch: KillSwitch,
    mut shutdown_listener: DelegatedShutdownListener,
) -> JoinHandle<()> {
    executor.spawn(async move {
        let interval = inner.transport.settings().keep_alive_interval();

        loop {
            tokio::select! {
                _ = shutdown_listener.wait_for_shutdown() => {
                    inner.logger.debug("Keep-alive monitor shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match inner
                .monitor
                .call_test_endpoint(&inner.context, false, &mut shutdown_listener)
                .await
            {
                Ok(_) => log_hook_result(
                    inner.logger.as_ref(),
                    "keep_alive",
                    inner.broadcaster.keep_alive(&inner.context),
                ),
                Err(PerfanaError::KillSwitch(e)) => {
                    kill_switch.trigger(e.reason());
                    log_hook_result(
                        inner.logger.as_ref(),
                        "abort_test",
                        inner.broadcaster.abort_test(&inner.context),
                    );
                    break;
                }
                Err(PerfanaError::Shutdown(_)) => break,
                Err(e) => inner.logger.warn(&format!("Keep-alive call failed: {e}")),
            }
        }
    })
}
