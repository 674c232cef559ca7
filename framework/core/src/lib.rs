mod duration;
mod kill_switch;
mod logger;
mod shutdown;

pub mod prelude {
    pub use crate::duration::{parse_iso_duration, DurationParseError};
    pub use crate::kill_switch::{KillSwitch, KillSwitchError};
    pub use crate::logger::{ClientLogger, LogFacadeLogger, SharedLogger};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
