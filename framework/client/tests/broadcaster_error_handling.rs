mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use parking_lot::Mutex;
use perfana_client::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[derive(Debug, Default)]
struct FailingBroadcaster {
    custom_events: Mutex<u32>,
}

impl EventBroadcaster for FailingBroadcaster {
    fn before_test(&self, _context: &TestContext, _properties: &EventProperties) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("Error in before_test"))
    }

    fn after_test(&self, _context: &TestContext) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("Error in after_test"))
    }

    fn keep_alive(&self, _context: &TestContext) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("Error in keep_alive"))
    }

    fn abort_test(&self, _context: &TestContext) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("Error in abort_test"))
    }

    fn custom_event(&self, _context: &TestContext, _event: &ScheduledEvent) -> anyhow::Result<()> {
        *self.custom_events.lock() += 1;
        Err(anyhow::anyhow!("Error in custom_event"))
    }
}

fn mock_perfana() -> MockPerfana {
    let perfana = MockPerfana::start();
    perfana.mount(
        Mock::given(method("POST"))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}")),
    );
    perfana.mount(
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200)),
    );
    perfana
}

#[test]
fn capture_hook_errors_and_continue() {
    let perfana = mock_perfana();
    let broadcaster = Arc::new(FailingBroadcaster::default());
    let logger = Arc::new(RecordingLogger::default());

    let client = ClientConfig {
        connection_settings: perfana.settings(),
        test_context: test_context(),
        custom_events: Some("PT0S|restart|\nPT0.05S|scale-down|".to_string()),
        logger: Some(logger.clone()),
        broadcaster: Some(broadcaster.clone()),
        ..Default::default()
    }
    .build()
    .unwrap();

    client.start_session().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        *broadcaster.custom_events.lock() == 2
    }));
    assert!(client.check_session().is_ok());

    assert_eq!(client.stop_session().unwrap(), None);

    let warnings = logger.warnings();
    for hook in ["before_test", "custom_event", "after_test"] {
        assert!(
            warnings.iter().any(|w| w.contains(&format!("Error in {hook}"))),
            "no warning for {hook} in {warnings:?}"
        );
    }
}

#[test]
fn capture_abort_hook_error() {
    let perfana = mock_perfana();
    let broadcaster = Arc::new(FailingBroadcaster::default());

    let client = ClientConfig {
        connection_settings: perfana.settings(),
        test_context: test_context(),
        broadcaster: Some(broadcaster),
        ..Default::default()
    }
    .build()
    .unwrap();

    client.start_session().unwrap();

    assert!(client.abort_session().is_ok());
}
