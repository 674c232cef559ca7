mod assertions;
mod broadcaster;
mod client;
mod context;
mod error;
mod executor;
mod message;
mod monitor;
mod scheduler;
mod settings;
mod transport;

pub mod prelude {
    pub use crate::assertions::{BenchmarkResult, BenchmarkResults};
    pub use crate::broadcaster::{EventBroadcaster, EventProperties, NoopBroadcaster};
    pub use crate::client::{ClientConfig, PerfanaClient};
    pub use crate::context::{Tags, TestContext, TestContextConfig, Variables};
    pub use crate::error::PerfanaError;
    pub use crate::message::{perfana_message_to_json, TestRunStatus};
    pub use crate::settings::{ConnectionSettings, ConnectionSettingsConfig, SettingsError};

    pub use perfana_core::prelude::{ClientLogger, KillSwitchError, LogFacadeLogger, SharedLogger};
    pub use perfana_schedule::prelude::{EventSettings, Schedule, ScheduledEvent};
}
