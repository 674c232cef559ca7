//! Custom event schedules for Perfana test runs.
//!
//! A schedule is a block of text with one event per line:
//!
//! ```text
//! PT1S   | restart (reset replicas) | { 'server':'myserver', 'replicas':2 }
//! PT660S | heapdump                 | server=myserver.example.com; port=1567
//! ```
//!
//! Each line holds an ISO-8601 offset from the start of the test, an event type with an optional
//! description in parentheses, and a settings payload. See [Schedule::parse].

mod event;
mod lenient;
mod parser;
mod payload;

pub mod prelude {
    pub use crate::event::{EventSettings, ScheduledEvent};
    pub use crate::lenient::{parse_lenient_object, LenientParseError};
    pub use crate::parser::{Schedule, ScheduleError, ScheduleLineError};
    pub use crate::payload::PayloadError;
}
