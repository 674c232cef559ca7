#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use perfana_client::prelude::*;
use wiremock::{Mock, MockServer, Request};

pub const SAMPLE_SCHEDULE: &str = "   \n    PT1S  |restart   (   restart to reset replicas  )   |{ 'server':'myserver' 'replicas':2, 'tags': [ 'first', 'second' ] }    \nPT600S   |scale-down |   { 'replicas':1 }   \nPT660S|    heapdump|server=    myserver.example.com;   port=1567  \n   PT900S|scale-up|{ 'replicas':2 }\n  \n";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A mock Perfana server for use from synchronous tests.
///
/// The client owns its own runtime and blocks, so tests stay synchronous and the mock server
/// gets a runtime of its own.
pub struct MockPerfana {
    server: MockServer,
    runtime: tokio::runtime::Runtime,
}

impl MockPerfana {
    pub fn start() -> Self {
        init_logging();
        let runtime = tokio::runtime::Runtime::new().expect("Failed to create test runtime");
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }

    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettingsConfig {
            url: Some(self.uri()),
            retry_max_count: Some("5".to_string()),
            retry_duration: Some("PT0.05S".to_string()),
            keep_alive_interval: Some("PT0.1S".to_string()),
            ..Default::default()
        }
        .build()
        .expect("Test settings are valid")
    }
}

pub fn test_context() -> TestContext {
    TestContextConfig {
        application: Some("shop".to_string()),
        test_type: Some("testType".to_string()),
        test_environment: Some("testEnv".to_string()),
        test_run_id: Some("testRunId".to_string()),
        ci_build_results_url: Some("http://url".to_string()),
        application_release: Some("release".to_string()),
        ramp_up_seconds: Some("10".to_string()),
        constant_load_seconds: Some("300".to_string()),
        annotations: Some("annotation".to_string()),
        variables: Some(Variables::Map(Default::default())),
        tags: Some(Tags::Csv(String::new())),
        ..Default::default()
    }
    .build()
}

/// Records every call so tests can see what the client did.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl EventBroadcaster for RecordingBroadcaster {
    fn before_test(&self, _context: &TestContext, properties: &EventProperties) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push(format!("before_test:{}", properties.len()));
        Ok(())
    }

    fn after_test(&self, _context: &TestContext) -> anyhow::Result<()> {
        self.calls.lock().push("after_test".to_string());
        Ok(())
    }

    fn keep_alive(&self, _context: &TestContext) -> anyhow::Result<()> {
        self.calls.lock().push("keep_alive".to_string());
        Ok(())
    }

    fn abort_test(&self, _context: &TestContext) -> anyhow::Result<()> {
        self.calls.lock().push("abort_test".to_string());
        Ok(())
    }

    fn custom_event(&self, _context: &TestContext, event: &ScheduledEvent) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push(format!("custom_event:{}", event.event_type()));
        Ok(())
    }
}

/// Keeps warnings and errors so tests can check what the client complained about.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub warnings: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

impl ClientLogger for RecordingLogger {
    fn info(&self, _message: &str) {}

    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn debug(&self, _message: &str) {}
}

pub fn shared(broadcaster: &Arc<RecordingBroadcaster>) -> Option<Arc<dyn EventBroadcaster>> {
    Some(broadcaster.clone() as Arc<dyn EventBroadcaster>)
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
