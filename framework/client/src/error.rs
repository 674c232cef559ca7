use perfana_core::prelude::{KillSwitchError, ShutdownSignalError};

use crate::settings::SettingsError;

/// Everything the client can fail with.
///
/// [PerfanaError::KillSwitch] is special: the service asked for the test to stop. It is never
/// retried and a run loop that sees it should end the test. Use [PerfanaError::is_kill_switch]
/// rather than treating it like the other, recoverable, variants.
#[derive(Debug, thiserror::Error)]
pub enum PerfanaError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    KillSwitch(#[from] KillSwitchError),
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },
    #[error("Giving up on {url} after {attempts} attempt(s), last error: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
    #[error("{url} responded with unexpected status {status}: {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Perfana assertions are false: {0}")]
    AssertionsFailed(String),
    #[error("A session is already running")]
    SessionAlreadyStarted,
    #[error("No session is running")]
    NoActiveSession,
    #[error("Failed to create the client runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Shutdown(#[from] ShutdownSignalError),
}

impl PerfanaError {
    pub fn is_kill_switch(&self) -> bool {
        matches!(self, PerfanaError::KillSwitch(_))
    }

    /// True for failures to reach the service, which a caller may choose to ignore.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            PerfanaError::Transport { .. } | PerfanaError::RetriesExhausted { .. }
        )
    }
}
