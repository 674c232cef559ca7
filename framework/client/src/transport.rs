use perfana_core::prelude::{DelegatedShutdownListener, SharedLogger, ShutdownSignalError};
use reqwest::Method;

use crate::error::PerfanaError;
use crate::settings::ConnectionSettings;

/// Status and body of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub status: u16,
    pub body: String,
}

/// HTTP calls to the Perfana service, retried according to the connection settings.
///
/// Connection failures and 5xx replies are retried. Other non-2xx replies fail immediately.
/// Every call, including one in flight, ends early with [PerfanaError::Shutdown] when `cancel`
/// fires.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
    settings: ConnectionSettings,
    logger: SharedLogger,
}

impl Transport {
    pub(crate) fn new(settings: ConnectionSettings, logger: SharedLogger) -> Result<Self, PerfanaError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|source| PerfanaError::Transport {
                url: settings.url().to_string(),
                source,
            })?;

        Ok(Self {
            client,
            settings,
            logger,
        })
    }

    pub(crate) fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub(crate) async fn post_json(
        &self,
        segments: &[&str],
        body: String,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<Reply, PerfanaError> {
        let url = self.settings.endpoint(segments);
        self.send_with_retry(Method::POST, url, Some(body), cancel)
            .await
    }

    /// A single GET without retries. Any status is returned, the caller decides what it means.
    pub(crate) async fn get_once(
        &self,
        url: &str,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<Reply, PerfanaError> {
        self.send(Method::GET, url, None, cancel)
            .await?
            .map_err(|source| PerfanaError::Transport {
                url: url.to_string(),
                source,
            })
    }

    /// Wait for the configured retry time, returning early with an error on shutdown.
    pub(crate) async fn retry_pause(
        &self,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<(), PerfanaError> {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.retry_time()) => Ok(()),
            _ = cancel.wait_for_shutdown() => Err(ShutdownSignalError::default().into()),
        }
    }

    /// One HTTP exchange. The outer error is a shutdown, the inner one a transport failure.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<Result<Reply, reqwest::Error>, PerfanaError> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(Reply { status, body })
        };

        tokio::select! {
            reply = exchange => Ok(reply),
            _ = cancel.wait_for_shutdown() => Err(ShutdownSignalError::default().into()),
        }
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        cancel: &mut DelegatedShutdownListener,
    ) -> Result<Reply, PerfanaError> {
        let attempts = self.settings.retry_max_count();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            last_error = match self
                .send(method.clone(), &url, body.as_deref(), cancel)
                .await?
            {
                Ok(reply) if (200..300).contains(&reply.status) => return Ok(reply),
                Ok(reply) if reply.status < 500 => {
                    return Err(PerfanaError::UnexpectedStatus {
                        url,
                        status: reply.status,
                        body: reply.body,
                    })
                }
                Ok(reply) => format!("status {}", reply.status),
                Err(e) => e.to_string(),
            };

            self.logger.warn(&format!(
                "Call {attempt}/{attempts} to {method} {url} failed: {last_error}"
            ));

            if attempt < attempts {
                self.retry_pause(cancel).await?;
            }
        }

        Err(PerfanaError::RetriesExhausted {
            url,
            attempts,
            last_error,
        })
    }
}
