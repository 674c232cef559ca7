use std::fmt::Debug;
use std::sync::Arc;

/// Logging capability handed to the parser and the client at construction.
///
/// Nothing in these crates installs a global logger. Supply your own implementation to route
/// client messages into the load generator's log, or use [LogFacadeLogger] to forward them to
/// whatever `log` backend the process has set up.
pub trait ClientLogger: Debug + Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

pub type SharedLogger = Arc<dyn ClientLogger>;

/// Forwards to the `log` macros under the `perfana` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeLogger;

const TARGET: &str = "perfana";

impl LogFacadeLogger {
    pub fn shared() -> SharedLogger {
        Arc::new(Self)
    }
}

impl ClientLogger for LogFacadeLogger {
    fn info(&self, message: &str) {
        log::info!(target: TARGET, "{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!(target: TARGET, "{message}");
    }

    fn error(&self, message: &str) {
        log::error!(target: TARGET, "{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!(target: TARGET, "{message}");
    }
}
