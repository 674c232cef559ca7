use perfana_core::prelude::DelegatedShutdownListener;
use serde::Deserialize;

use crate::context::TestContext;
use crate::error::PerfanaError;
use crate::transport::Transport;

/// Perfana is still evaluating the run.
const STILL_EVALUATING: u16 = 202;

/// One kind of check evaluated by Perfana for a test run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BenchmarkResult {
    pub result: bool,
    #[serde(default)]
    pub deeplink: Option<String>,
}

/// Reply of the benchmark results endpoint. A check that was not configured is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResults {
    #[serde(default)]
    pub requirements: Option<BenchmarkResult>,
    #[serde(default)]
    pub benchmark_previous_test_run: Option<BenchmarkResult>,
    #[serde(default)]
    pub benchmark_baseline_test_run: Option<BenchmarkResult>,
}

impl BenchmarkResults {
    fn checks(&self) -> [(&'static str, Option<&BenchmarkResult>); 3] {
        [
            ("requirements", self.requirements.as_ref()),
            ("compared to previous test run", self.benchmark_previous_test_run.as_ref()),
            ("compared to baseline test run", self.benchmark_baseline_test_run.as_ref()),
        ]
    }

    /// A readable summary, one line per configured check.
    pub fn summary(&self) -> String {
        let lines: Vec<String> = self
            .checks()
            .into_iter()
            .filter_map(|(name, check)| {
                check.map(|check| {
                    let outcome = if check.result { "OK" } else { "FAILED" };
                    match &check.deeplink {
                        Some(link) => format!("{name}: {outcome} ({link})"),
                        None => format!("{name}: {outcome}"),
                    }
                })
            })
            .collect();

        if lines.is_empty() {
            "No checks have been specified for this test run".to_string()
        } else {
            lines.join("\n")
        }
    }

    pub fn all_passed(&self) -> bool {
        self.checks()
            .into_iter()
            .all(|(_, check)| check.map_or(true, |check| check.result))
    }
}

/// Fetch the benchmark results for the run, waiting while Perfana is still evaluating.
///
/// Each poll is a single request. "Still evaluating", 5xx replies and connection failures all
/// count against `retry_max_count`, with the retry time between polls.
///
/// Returns the summary when every configured check passed and
/// [PerfanaError::AssertionsFailed] otherwise.
pub(crate) async fn check_assertions(
    transport: &Transport,
    context: &TestContext,
    cancel: &mut DelegatedShutdownListener,
) -> Result<String, PerfanaError> {
    let url = transport.settings().endpoint(&[
        "get-benchmark-results",
        context.application(),
        context.test_run_id(),
    ]);
    let attempts = transport.settings().retry_max_count();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        last_error = match transport.get_once(&url, cancel).await {
            Ok(reply) if reply.status == STILL_EVALUATING => {
                "benchmark results are still being evaluated".to_string()
            }
            Ok(reply) if (200..300).contains(&reply.status) => {
                let results: BenchmarkResults = serde_json::from_str(&reply.body).map_err(|e| {
                    PerfanaError::InvalidResponse {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                })?;

                let summary = results.summary();
                return if results.all_passed() {
                    Ok(summary)
                } else {
                    Err(PerfanaError::AssertionsFailed(summary))
                };
            }
            Ok(reply) if reply.status >= 500 => format!("status {}", reply.status),
            Ok(reply) => {
                return Err(PerfanaError::UnexpectedStatus {
                    url,
                    status: reply.status,
                    body: reply.body,
                })
            }
            Err(PerfanaError::Transport { source, .. }) => source.to_string(),
            Err(e) => return Err(e),
        };

        if attempt < attempts {
            transport.retry_pause(cancel).await?;
        }
    }

    Err(PerfanaError::RetriesExhausted {
        url,
        attempts,
        last_error,
    })
}
