use perfana_schedule::prelude::parse_lenient_object;
use serde::{Deserialize, Serialize};

use crate::context::TestContext;
use crate::error::PerfanaError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PerfanaMessage<'a> {
    test_run_id: &'a str,
    test_type: &'a str,
    test_environment: &'a str,
    application: &'a str,
    application_release: &'a str,
    #[serde(rename = "CIBuildResultsUrl", skip_serializing_if = "Option::is_none")]
    ci_build_results_url: Option<&'a str>,
    ramp_up: String,
    duration: String,
    completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotations: Option<&'a str>,
    variables: Vec<Variable<'a>>,
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct Variable<'a> {
    placeholder: &'a str,
    value: &'a str,
}

/// Render the body of a `/test` call for `context`. `completed` marks the final call of a run.
pub fn perfana_message_to_json(
    context: &TestContext,
    completed: bool,
) -> Result<String, serde_json::Error> {
    let message = PerfanaMessage {
        test_run_id: context.test_run_id(),
        test_type: context.test_type(),
        test_environment: context.test_environment(),
        application: context.application(),
        application_release: context.application_release(),
        ci_build_results_url: context.ci_build_results_url(),
        ramp_up: context.ramp_up().as_secs().to_string(),
        duration: context.constant_load().as_secs().to_string(),
        completed,
        annotations: context.annotations(),
        variables: context
            .variables()
            .iter()
            .map(|(placeholder, value)| Variable { placeholder, value })
            .collect(),
        tags: context.tags(),
    };

    serde_json::to_string(&message)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PerfanaEvent<'a> {
    application: &'a str,
    test_environment: &'a str,
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
}

/// Render the body of an `/events` call.
pub(crate) fn perfana_event_to_json(
    context: &TestContext,
    title: &str,
    description: &str,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PerfanaEvent {
        application: context.application(),
        test_environment: context.test_environment(),
        title,
        description,
        tags: context.tags(),
    })
}

/// Reply to a `/test` call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestRunStatus {
    /// The service wants the test stopped.
    #[serde(default)]
    pub abort: bool,
    #[serde(default, rename = "abortMessage")]
    pub abort_message: Option<String>,
    /// Results of checks the service already evaluated for this run.
    #[serde(default, rename = "test-results", alias = "testResults")]
    pub test_results: Vec<serde_json::Value>,
}

/// Parse a `/test` reply. Accepts strict JSON and the relaxed notation some servers send
/// (`{ abort: true, test-results: [ ] }`). An empty body means "carry on".
pub(crate) fn parse_test_run_status(url: &str, body: &str) -> Result<TestRunStatus, PerfanaError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(TestRunStatus::default());
    }

    if let Ok(status) = serde_json::from_str::<TestRunStatus>(body) {
        return Ok(status);
    }

    let invalid = |reason: String| PerfanaError::InvalidResponse {
        url: url.to_string(),
        reason,
    };

    let object = parse_lenient_object(body).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| invalid(e.to_string()))
}
