use std::time::Duration;

use perfana_core::prelude::{parse_iso_duration, ClientLogger, DurationParseError, LogFacadeLogger};
use url::Url;

pub const DEFAULT_URL: &str = "http://localhost:8888";
pub const DEFAULT_RETRY_MAX_COUNT: u32 = 30;
pub const DEFAULT_RETRY_TIME: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors found while building [ConnectionSettings].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid Perfana url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid {name} `{value}`: {source}")]
    InvalidDuration {
        name: &'static str,
        value: String,
        source: DurationParseError,
    },
}

/// Unvalidated connection settings, as they arrive from a build plugin or the environment.
///
/// Every field is optional. The `*_seconds` and count fields are lenient: a value that is not a
/// whole number is replaced by the default with a warning. The ISO-8601 fields (`retry_duration`,
/// `keep_alive_interval`, `request_timeout`) are strict and fail [ConnectionSettingsConfig::build]
/// when set to something that is not a duration. When both forms are given the ISO-8601 one wins.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettingsConfig {
    pub url: Option<String>,
    pub retry_max_count: Option<String>,
    pub retry_time_seconds: Option<String>,
    pub retry_duration: Option<String>,
    pub keep_alive_time_seconds: Option<String>,
    pub keep_alive_interval: Option<String>,
    pub request_timeout: Option<String>,
}

impl ConnectionSettingsConfig {
    /// Read settings from `PERFANA_*` environment variables. Unset variables stay `None`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();

        Self {
            url: var("PERFANA_URL"),
            retry_max_count: var("PERFANA_RETRY_MAX_COUNT"),
            retry_time_seconds: var("PERFANA_RETRY_TIME_SECONDS"),
            retry_duration: var("PERFANA_RETRY_DURATION"),
            keep_alive_time_seconds: var("PERFANA_KEEP_ALIVE_TIME_SECONDS"),
            keep_alive_interval: var("PERFANA_KEEP_ALIVE_INTERVAL"),
            request_timeout: var("PERFANA_REQUEST_TIMEOUT"),
        }
    }

    pub fn build(self) -> Result<ConnectionSettings, SettingsError> {
        self.build_with_logger(&LogFacadeLogger)
    }

    pub fn build_with_logger(
        self,
        logger: &dyn ClientLogger,
    ) -> Result<ConnectionSettings, SettingsError> {
        let url = match non_blank(self.url) {
            Some(url) => url,
            None => DEFAULT_URL.to_string(),
        };
        let url = Url::parse(&url).map_err(|e| SettingsError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidUrl {
                url: url.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let retry_max_count = lenient_number(
            "retry max count",
            self.retry_max_count,
            u64::from(DEFAULT_RETRY_MAX_COUNT),
            logger,
        );
        let retry_max_count = u32::try_from(retry_max_count).unwrap_or(u32::MAX).max(1);

        let retry_time = match strict_duration("retry duration", self.retry_duration)? {
            Some(duration) => duration,
            None => Duration::from_secs(lenient_number(
                "retry time in seconds",
                self.retry_time_seconds,
                DEFAULT_RETRY_TIME.as_secs(),
                logger,
            )),
        };

        let keep_alive_interval =
            match strict_duration("keep alive interval", self.keep_alive_interval)? {
                Some(duration) => duration,
                None => Duration::from_secs(lenient_number(
                    "keep alive time in seconds",
                    self.keep_alive_time_seconds,
                    DEFAULT_KEEP_ALIVE_INTERVAL.as_secs(),
                    logger,
                )),
            };
        let keep_alive_interval = if keep_alive_interval.is_zero() {
            logger.warn("Keep alive interval of zero is not allowed, using the default");
            DEFAULT_KEEP_ALIVE_INTERVAL
        } else {
            keep_alive_interval
        };

        let request_timeout = strict_duration("request timeout", self.request_timeout)?
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(ConnectionSettings {
            url,
            retry_max_count,
            retry_time,
            keep_alive_interval,
            request_timeout,
        })
    }
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    url: Url,
    retry_max_count: u32,
    retry_time: Duration,
    keep_alive_interval: Duration,
    request_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_URL).expect("default url is valid"),
            retry_max_count: DEFAULT_RETRY_MAX_COUNT,
            retry_time: DEFAULT_RETRY_TIME,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ConnectionSettings {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Maximum number of attempts per request, at least 1.
    pub fn retry_max_count(&self) -> u32 {
        self.retry_max_count
    }

    /// Wait between attempts.
    pub fn retry_time(&self) -> Duration {
        self.retry_time
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Upper bound for a single HTTP call.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Absolute url of a Perfana endpoint, e.g. `endpoint(&["test"])`.
    ///
    /// Each segment is percent-encoded, so values like a test run id cannot change the path.
    pub fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.url.clone();
        // Only fails for urls that cannot be a base, which build() rejects.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn lenient_number(name: &str, value: Option<String>, default: u64, logger: &dyn ClientLogger) -> u64 {
    let Some(value) = non_blank(value) else {
        return default;
    };

    match value.parse::<u64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            logger.warn(&format!(
                "Ignoring {name} `{value}`, it is not a whole number. Using default {default}"
            ));
            default
        }
    }
}

fn strict_duration(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<Duration>, SettingsError> {
    non_blank(value)
        .map(|value| {
            parse_iso_duration(&value).map_err(|source| SettingsError::InvalidDuration {
                name,
                value,
                source,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ConnectionSettingsConfig {
        ConnectionSettingsConfig::default()
    }

    #[test]
    fn all_absent_uses_defaults() {
        let settings = config().build().unwrap();
        assert_eq!(settings, ConnectionSettings::default());
        assert_eq!(settings.endpoint(&["test"]), "http://localhost:8888/test");
        assert_eq!(settings.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn parses_given_values() {
        let settings = ConnectionSettingsConfig {
            url: Some("http://perfana:4000/".to_string()),
            retry_max_count: Some("5".to_string()),
            retry_time_seconds: Some("3".to_string()),
            keep_alive_time_seconds: Some("45".to_string()),
            ..config()
        }
        .build()
        .unwrap();

        assert_eq!(settings.retry_max_count(), 5);
        assert_eq!(settings.retry_time(), Duration::from_secs(3));
        assert_eq!(settings.keep_alive_interval(), Duration::from_secs(45));
        assert_eq!(settings.endpoint(&["events"]), "http://perfana:4000/events");
    }

    #[test]
    fn endpoint_segments_are_encoded() {
        let settings = ConnectionSettingsConfig {
            url: Some("http://perfana:4000/api".to_string()),
            ..config()
        }
        .build()
        .unwrap();

        assert_eq!(
            settings.endpoint(&["get-benchmark-results", "my shop", "run#1/b?"]),
            "http://perfana:4000/api/get-benchmark-results/my%20shop/run%231%2Fb%3F"
        );
    }

    #[test]
    fn unparsable_seconds_fall_back_to_default() {
        let settings = ConnectionSettingsConfig {
            retry_time_seconds: Some("P5".to_string()),
            retry_max_count: Some("many".to_string()),
            ..config()
        }
        .build()
        .unwrap();

        assert_eq!(settings.retry_time(), DEFAULT_RETRY_TIME);
        assert_eq!(settings.retry_max_count(), DEFAULT_RETRY_MAX_COUNT);
    }

    #[test]
    fn unparsable_iso_duration_fails_at_build() {
        let err = ConnectionSettingsConfig {
            retry_duration: Some("P5".to_string()),
            ..config()
        }
        .build()
        .unwrap_err();

        assert!(matches!(
            err,
            SettingsError::InvalidDuration {
                name: "retry duration",
                ..
            }
        ));
    }

    #[test]
    fn iso_duration_wins_over_seconds() {
        let settings = ConnectionSettingsConfig {
            retry_time_seconds: Some("3".to_string()),
            retry_duration: Some("PT0.5S".to_string()),
            keep_alive_interval: Some("PT1M".to_string()),
            ..config()
        }
        .build()
        .unwrap();

        assert_eq!(settings.retry_time(), Duration::from_millis(500));
        assert_eq!(settings.keep_alive_interval(), Duration::from_secs(60));
    }

    #[test]
    fn zero_retry_count_still_tries_once() {
        let settings = ConnectionSettingsConfig {
            retry_max_count: Some("0".to_string()),
            ..config()
        }
        .build()
        .unwrap();

        assert_eq!(settings.retry_max_count(), 1);
    }

    #[test]
    fn invalid_url_fails_at_build() {
        for url in ["not a url", "ftp://perfana"] {
            let err = ConnectionSettingsConfig {
                url: Some(url.to_string()),
                ..config()
            }
            .build()
            .unwrap_err();

            assert!(matches!(err, SettingsError::InvalidUrl { .. }), "{url}");
        }
    }
}
