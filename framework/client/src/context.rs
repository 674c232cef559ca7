use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use perfana_core::prelude::{ClientLogger, LogFacadeLogger};

const UNKNOWN: &str = "unknown";

/// Variables attached to a test run, shown by Perfana next to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variables {
    Map(HashMap<String, String>),
    /// Properties-file text: one `key=value` or `key: value` per line, `#` and `!` comments.
    Properties(String),
}

impl From<HashMap<String, String>> for Variables {
    fn from(map: HashMap<String, String>) -> Self {
        Variables::Map(map)
    }
}

impl Variables {
    fn normalize(self) -> BTreeMap<String, String> {
        match self {
            Variables::Map(map) => map.into_iter().collect(),
            Variables::Properties(text) => parse_properties(&text),
        }
    }
}

/// Tags attached to a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tags {
    /// Comma separated, e.g. `"tag-1, tag-2"`.
    Csv(String),
    List(Vec<String>),
}

impl Tags {
    fn normalize(self) -> Vec<String> {
        let tags: Vec<String> = match self {
            Tags::Csv(csv) => csv.split(',').map(str::to_string).collect(),
            Tags::List(list) => list,
        };

        tags.into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Unvalidated description of a test run. Every field is optional.
///
/// Durations can be given either as a whole number of seconds in a string or as a [Duration];
/// the [Duration] wins when both are present.
#[derive(Debug, Clone, Default)]
pub struct TestContextConfig {
    pub application: Option<String>,
    pub test_type: Option<String>,
    pub test_environment: Option<String>,
    pub test_run_id: Option<String>,
    pub ci_build_results_url: Option<String>,
    pub application_release: Option<String>,
    pub ramp_up_seconds: Option<String>,
    pub ramp_up: Option<Duration>,
    pub constant_load_seconds: Option<String>,
    pub constant_load: Option<Duration>,
    pub annotations: Option<String>,
    pub variables: Option<Variables>,
    pub tags: Option<Tags>,
}

impl TestContextConfig {
    /// Resolve defaults. Never fails: unparsable seconds become zero with a warning.
    pub fn build(self) -> TestContext {
        self.build_with_logger(&LogFacadeLogger)
    }

    pub fn build_with_logger(self, logger: &dyn ClientLogger) -> TestContext {
        let or_unknown = |value: Option<String>| non_blank(value).unwrap_or_else(|| UNKNOWN.to_string());

        TestContext {
            application: or_unknown(self.application),
            test_type: or_unknown(self.test_type),
            test_environment: or_unknown(self.test_environment),
            test_run_id: non_blank(self.test_run_id).unwrap_or_else(|| nanoid::nanoid!()),
            ci_build_results_url: non_blank(self.ci_build_results_url),
            application_release: or_unknown(self.application_release),
            ramp_up: resolve_duration("ramp up", self.ramp_up, self.ramp_up_seconds, logger),
            constant_load: resolve_duration(
                "constant load",
                self.constant_load,
                self.constant_load_seconds,
                logger,
            ),
            annotations: non_blank(self.annotations),
            variables: self.variables.map(Variables::normalize).unwrap_or_default(),
            tags: self.tags.map(Tags::normalize).unwrap_or_default(),
        }
    }
}

/// A validated description of the test run that is reported to Perfana.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestContext {
    application: String,
    test_type: String,
    test_environment: String,
    test_run_id: String,
    ci_build_results_url: Option<String>,
    application_release: String,
    ramp_up: Duration,
    constant_load: Duration,
    annotations: Option<String>,
    variables: BTreeMap<String, String>,
    tags: Vec<String>,
}

impl Default for TestContext {
    fn default() -> Self {
        TestContextConfig::default().build()
    }
}

impl TestContext {
    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn test_type(&self) -> &str {
        &self.test_type
    }

    pub fn test_environment(&self) -> &str {
        &self.test_environment
    }

    pub fn test_run_id(&self) -> &str {
        &self.test_run_id
    }

    pub fn ci_build_results_url(&self) -> Option<&str> {
        self.ci_build_results_url.as_deref()
    }

    pub fn application_release(&self) -> &str {
        &self.application_release
    }

    pub fn ramp_up(&self) -> Duration {
        self.ramp_up
    }

    pub fn constant_load(&self) -> Duration {
        self.constant_load
    }

    /// Planned length of the test: ramp up plus constant load.
    pub fn planned_duration(&self) -> Duration {
        self.ramp_up + self.constant_load
    }

    pub fn annotations(&self) -> Option<&str> {
        self.annotations.as_deref()
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve_duration(
    name: &str,
    duration: Option<Duration>,
    seconds: Option<String>,
    logger: &dyn ClientLogger,
) -> Duration {
    if let Some(duration) = duration {
        return duration;
    }

    match non_blank(seconds) {
        None => Duration::ZERO,
        Some(seconds) => match seconds.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                logger.warn(&format!(
                    "Ignoring {name} time `{seconds}`, it is not a whole number of seconds"
                ));
                Duration::ZERO
            }
        },
    }
}

fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split_at = line.find(['=', ':'])?;
            let key = line[..split_at].trim();
            let value = line[split_at + 1..].trim();
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
