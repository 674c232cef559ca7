use std::sync::Arc;

use parking_lot::Mutex;

use crate::shutdown::ShutdownHandle;

/// Raised when the remote service instructs the running test to stop.
///
/// This is not a transport failure. It must never be retried and callers should let it end their
/// run loop.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
#[display("Kill switch activated: {reason}")]
pub struct KillSwitchError {
    reason: String,
}

impl KillSwitchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Default for KillSwitchError {
    fn default() -> Self {
        Self::new("Abort requested by the remote service")
    }
}

/// Shared kill switch state for a session.
///
/// Background tasks trigger it when they see an abort directive. The thread that drives the test
/// observes it through [KillSwitch::check]. Triggering also shuts down the session so that the
/// other background tasks stop promptly.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    reason: Arc<Mutex<Option<String>>>,
    shutdown_handle: ShutdownHandle,
}

impl KillSwitch {
    pub fn new(shutdown_handle: ShutdownHandle) -> Self {
        Self {
            reason: Arc::new(Mutex::new(None)),
            shutdown_handle,
        }
    }

    /// Activate the kill switch. Only the first reason is kept.
    pub fn trigger(&self, reason: impl Into<String>) {
        {
            let mut guard = self.reason.lock();
            if guard.is_none() {
                *guard = Some(reason.into());
            }
        }
        self.shutdown_handle.shutdown();
    }

    pub fn is_triggered(&self) -> bool {
        self.reason.lock().is_some()
    }

    pub fn check(&self) -> Result<(), KillSwitchError> {
        match self.reason.lock().as_ref() {
            Some(reason) => Err(KillSwitchError::new(reason.clone())),
            None => Ok(()),
        }
    }
}
