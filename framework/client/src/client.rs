use std::sync::Arc;

use parking_lot::Mutex;
use perfana_core::prelude::{
    DelegatedShutdownListener, KillSwitch, LogFacadeLogger, SharedLogger, ShutdownHandle,
};
use perfana_schedule::prelude::Schedule;
use tokio::task::JoinHandle;

use crate::assertions::check_assertions;
use crate::broadcaster::{log_hook_result, EventBroadcaster, EventProperties, NoopBroadcaster};
use crate::context::TestContext;
use crate::error::PerfanaError;
use crate::executor::Executor;
use crate::message::{perfana_event_to_json, TestRunStatus};
use crate::monitor::{start_keep_alive, SessionMonitor};
use crate::scheduler::start_event_scheduler;
use crate::settings::ConnectionSettings;
use crate::transport::Transport;

/// Everything needed to build a [PerfanaClient]. Absent values fall back to defaults.
#[derive(Default)]
pub struct ClientConfig {
    pub connection_settings: ConnectionSettings,
    pub test_context: TestContext,
    /// Raw custom event schedule, see [Schedule::parse].
    pub custom_events: Option<String>,
    /// Check the Perfana benchmark results when the session stops.
    pub assert_results_enabled: bool,
    pub event_properties: EventProperties,
    pub logger: Option<SharedLogger>,
    pub broadcaster: Option<Arc<dyn EventBroadcaster>>,
}

impl ClientConfig {
    /// Parse the schedule and set up the client. Fails only if the runtime or HTTP client cannot
    /// be created.
    pub fn build(self) -> Result<PerfanaClient, PerfanaError> {
        let logger = self.logger.unwrap_or_else(LogFacadeLogger::shared);
        let broadcaster = self
            .broadcaster
            .unwrap_or_else(|| Arc::new(NoopBroadcaster));

        let schedule = Schedule::parse(self.custom_events.as_deref(), logger.as_ref());
        logger.debug(&format!("Parsed {} scheduled event(s)", schedule.len()));

        let transport = Transport::new(self.connection_settings, logger.clone())?;
        let client_shutdown = ShutdownHandle::new();
        let executor = Executor::new(client_shutdown.clone())?;

        Ok(PerfanaClient {
            inner: Arc::new(ClientInner {
                monitor: SessionMonitor::new(transport.clone(), logger.clone()),
                transport,
                context: self.test_context,
                schedule,
                logger,
                broadcaster,
            }),
            executor,
            client_shutdown,
            assert_results_enabled: self.assert_results_enabled,
            event_properties: self.event_properties,
            session: Mutex::new(SessionState::Idle),
        })
    }
}

/// State shared between the client and its background tasks.
pub(crate) struct ClientInner {
    pub(crate) transport: Transport,
    pub(crate) monitor: SessionMonitor,
    pub(crate) context: TestContext,
    pub(crate) schedule: Schedule,
    pub(crate) logger: SharedLogger,
    pub(crate) broadcaster: Arc<dyn EventBroadcaster>,
}

impl ClientInner {
    pub(crate) async fn post_event(
        &self,
        title: &str,
        description: &str,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<(), PerfanaError> {
        let body = perfana_event_to_json(&self.context, title, description)?;
        self.transport.post_json(&["events"], body, cancel).await?;
        Ok(())
    }
}

struct ActiveSession {
    shutdown_handle: ShutdownHandle,
    kill_switch: KillSwitch,
    tasks: Vec<JoinHandle<()>>,
}

/// The session slot. `Starting` covers the start report, which runs without holding the lock.
enum SessionState {
    Idle,
    Starting,
    Running(ActiveSession),
}

/// Reports a load test to Perfana.
///
/// The load generator calls [PerfanaClient::start_session] when the test starts,
/// [PerfanaClient::check_session] from its run loop, and [PerfanaClient::stop_session] or
/// [PerfanaClient::abort_session] at the end. In between, background tasks keep the run alive
/// in Perfana and fire the scheduled events.
///
/// All methods block. Do not call them from inside a Tokio runtime.
pub struct PerfanaClient {
    inner: Arc<ClientInner>,
    executor: Executor,
    client_shutdown: ShutdownHandle,
    assert_results_enabled: bool,
    event_properties: EventProperties,
    session: Mutex<SessionState>,
}

impl PerfanaClient {
    pub fn schedule(&self) -> &Schedule {
        &self.inner.schedule
    }

    pub fn context(&self) -> &TestContext {
        &self.inner.context
    }

    pub fn connection_settings(&self) -> &ConnectionSettings {
        self.inner.transport.settings()
    }

    /// Report `context` to Perfana and read its directive.
    ///
    /// Returns [PerfanaError::KillSwitch] if Perfana asks for the test to be aborted, also when
    /// `completed` is true.
    pub fn call_test_endpoint(
        &self,
        context: &TestContext,
        completed: bool,
    ) -> Result<TestRunStatus, PerfanaError> {
        let mut cancel = self.client_shutdown.new_listener();
        self.executor.execute_in_place(
            self.inner
                .monitor
                .call_test_endpoint(context, completed, &mut cancel),
        )
    }

    /// Record an event for this test run in Perfana.
    pub fn call_event(&self, title: &str, description: &str) -> Result<(), PerfanaError> {
        let mut cancel = self.client_shutdown.new_listener();
        self.executor
            .execute_in_place(self.inner.post_event(title, description, &mut cancel))
    }

    /// Start reporting the test run and fire scheduled events from now on.
    ///
    /// If Perfana cannot be reached the session still starts and the failure is logged. If
    /// Perfana asks for an abort straight away the session is not started and the kill switch is
    /// returned.
    pub fn start_session(&self) -> Result<(), PerfanaError> {
        {
            let mut session = self.session.lock();
            if !matches!(*session, SessionState::Idle) {
                return Err(PerfanaError::SessionAlreadyStarted);
            }
            *session = SessionState::Starting;
        }

        let context = &self.inner.context;
        self.inner.logger.info(&format!(
            "Starting Perfana session for test run {}",
            context.test_run_id()
        ));

        match self.call_test_endpoint(context, false) {
            Ok(_) => {}
            Err(e) if e.is_kill_switch() => {
                *self.session.lock() = SessionState::Idle;
                return Err(e);
            }
            Err(e) => self
                .inner
                .logger
                .warn(&format!("Could not report test start: {e}")),
        }
        self.record_event("Test start", "Test run started");
        log_hook_result(
            self.inner.logger.as_ref(),
            "before_test",
            self.inner
                .broadcaster
                .before_test(context, &self.event_properties),
        );

        let shutdown_handle = ShutdownHandle::new();
        let kill_switch = KillSwitch::new(shutdown_handle.clone());
        let started = tokio::time::Instant::now();

        let tasks = vec![
            start_keep_alive(
                &self.executor,
                self.inner.clone(),
                kill_switch.clone(),
                shutdown_handle.new_listener(),
            ),
            start_event_scheduler(
                &self.executor,
                self.inner.clone(),
                started,
                shutdown_handle.new_listener(),
            ),
        ];

        *self.session.lock() = SessionState::Running(ActiveSession {
            shutdown_handle,
            kill_switch,
            tasks,
        });

        Ok(())
    }

    /// Returns [PerfanaError::KillSwitch] once Perfana has asked for the running test to be
    /// aborted. Call this from the test's run loop and end the test when it fails.
    ///
    /// Never waits for Perfana, also not while [PerfanaClient::start_session] is still reporting.
    pub fn check_session(&self) -> Result<(), PerfanaError> {
        match &*self.session.lock() {
            SessionState::Running(session) => {
                session.kill_switch.check().map_err(PerfanaError::from)
            }
            SessionState::Idle | SessionState::Starting => Ok(()),
        }
    }

    /// Stop the session and send the final report.
    ///
    /// When result assertions are enabled the summary of the Perfana checks is returned, or
    /// [PerfanaError::AssertionsFailed] if any check failed. A kill switch seen before or during
    /// the final report is returned as [PerfanaError::KillSwitch].
    pub fn stop_session(&self) -> Result<Option<String>, PerfanaError> {
        let session = self.end_session()?;
        let context = &self.inner.context;

        let final_report = self.call_test_endpoint(context, true);

        // The keep-alive monitor has already notified the broadcaster of its own kill switch.
        if let Err(e) = session.kill_switch.check() {
            self.record_event("Test aborted", &e.to_string());
            return Err(e.into());
        }

        if let Err(e) = final_report {
            if e.is_kill_switch() {
                self.record_event("Test aborted", &e.to_string());
                log_hook_result(
                    self.inner.logger.as_ref(),
                    "abort_test",
                    self.inner.broadcaster.abort_test(context),
                );
                return Err(e);
            }
            self.inner
                .logger
                .warn(&format!("Could not report test end: {e}"));
        }

        self.record_event("Test end", "Test run completed");
        log_hook_result(
            self.inner.logger.as_ref(),
            "after_test",
            self.inner.broadcaster.after_test(context),
        );

        if !self.assert_results_enabled {
            return Ok(None);
        }

        self.assert_results().map(Some)
    }

    /// Stop the session without a final report, for example because the test itself failed.
    pub fn abort_session(&self) -> Result<(), PerfanaError> {
        self.end_session()?;

        self.inner.logger.warn(&format!(
            "Aborting Perfana session for test run {}",
            self.inner.context.test_run_id()
        ));
        self.record_event("Test aborted", "Test run aborted");
        log_hook_result(
            self.inner.logger.as_ref(),
            "abort_test",
            self.inner.broadcaster.abort_test(&self.inner.context),
        );

        Ok(())
    }

    /// Check the Perfana benchmark results for this test run.
    pub fn assert_results(&self) -> Result<String, PerfanaError> {
        let mut cancel = self.client_shutdown.new_listener();
        self.executor.execute_in_place(check_assertions(
            &self.inner.transport,
            &self.inner.context,
            &mut cancel,
        ))
    }

    /// Take the running session and wait for its background tasks to stop.
    fn end_session(&self) -> Result<ActiveSession, PerfanaError> {
        let mut session = {
            let mut state = self.session.lock();
            match std::mem::replace(&mut *state, SessionState::Idle) {
                SessionState::Running(session) => session,
                other => {
                    *state = other;
                    return Err(PerfanaError::NoActiveSession);
                }
            }
        };

        session.shutdown_handle.shutdown();
        let tasks = std::mem::take(&mut session.tasks);
        let logger = self.inner.logger.clone();
        self.executor.execute_in_place(async move {
            for task in tasks {
                if let Err(e) = task.await {
                    logger.debug(&format!("Background task ended abnormally: {e}"));
                }
            }
            Ok(())
        })?;

        Ok(session)
    }

    /// Record an event in Perfana, logging instead of failing.
    fn record_event(&self, title: &str, description: &str) {
        if let Err(e) = self.call_event(title, description) {
            self.inner
                .logger
                .warn(&format!("Could not record event `{title}`: {e}"));
        }
    }
}

impl Drop for PerfanaClient {
    fn drop(&mut self) {
        if let SessionState::Running(session) = self.session.get_mut() {
            session.shutdown_handle.shutdown();
        }
        self.client_shutdown.shutdown();
    }
}
