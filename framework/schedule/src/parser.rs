use std::time::Duration;

use perfana_core::prelude::{parse_iso_duration, ClientLogger, DurationParseError};

use crate::event::{EventSettings, ScheduledEvent};
use crate::payload::{parse_payload, PayloadError};

/// Why a schedule line was not turned into an event. Line numbers are 1-based and count blank
/// lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleLineError {
    #[error("line {line}: expected `duration | event-type | settings`")]
    MissingDelimiter { line: usize },
    #[error("line {line}: invalid duration: {source}")]
    InvalidDuration {
        line: usize,
        source: DurationParseError,
    },
    #[error("line {line}: event type is empty")]
    EmptyEventType { line: usize },
    #[error("line {line}: description is not closed with `)`")]
    UnclosedDescription { line: usize },
    #[error("line {line}: invalid settings: {source}")]
    InvalidPayload { line: usize, source: PayloadError },
}

impl ScheduleLineError {
    pub fn line(&self) -> usize {
        match self {
            ScheduleLineError::MissingDelimiter { line }
            | ScheduleLineError::InvalidDuration { line, .. }
            | ScheduleLineError::EmptyEventType { line }
            | ScheduleLineError::UnclosedDescription { line }
            | ScheduleLineError::InvalidPayload { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule has {} invalid line(s)", .0.len())]
    InvalidLines(Vec<ScheduleLineError>),
}

/// An ordered, immutable list of scheduled events.
///
/// Events are sorted by [ScheduledEvent::fire_at]. Events with the same offset keep the order in
/// which they appeared in the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    events: Vec<ScheduledEvent>,
}

impl Schedule {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a schedule, skipping lines that cannot be understood.
    ///
    /// Missing input and blank lines produce no events. A line with a bad duration, missing `|`
    /// delimiter, empty event type or unclosed description is skipped with a warning. A line whose
    /// settings cannot be parsed is kept with [EventSettings::Raw] settings, also with a warning.
    pub fn parse(raw: Option<&str>, logger: &dyn ClientLogger) -> Self {
        let mut events = Vec::new();

        for (line_no, line) in numbered_lines(raw) {
            match parse_line(line_no, line) {
                Ok((event, None)) => events.push(event),
                Ok((event, Some(payload_error))) => {
                    logger.warn(&format!(
                        "Schedule line {line_no}: keeping raw settings for `{}`: {payload_error}",
                        event.event_type()
                    ));
                    events.push(event);
                }
                Err(e) => logger.warn(&format!("Skipping schedule line: {e}")),
            }
        }

        Self::from_events(events)
    }

    /// Parse a schedule, failing if any line is invalid, including lines whose
    /// settings cannot be parsed. All invalid lines are reported.
    pub fn parse_strict(raw: Option<&str>) -> Result<Self, ScheduleError> {
        let mut events = Vec::new();
        let mut errors = Vec::new();

        for (line_no, line) in numbered_lines(raw) {
            match parse_line(line_no, line) {
                Ok((event, None)) => events.push(event),
                Ok((_, Some(source))) => errors.push(ScheduleLineError::InvalidPayload {
                    line: line_no,
                    source,
                }),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(Self::from_events(events))
        } else {
            Err(ScheduleError::InvalidLines(errors))
        }
    }

    /// Build a schedule from events in any order.
    pub fn from_events(mut events: Vec<ScheduledEvent>) -> Self {
        // Stable, so ties keep their input order.
        events.sort_by_key(ScheduledEvent::fire_at);
        Self { events }
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduledEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events that have become due since the last call, for callers that drive their own loop.
    ///
    /// `cursor` is the number of events already handed out and is advanced past the returned
    /// events. Start with `0`.
    pub fn due_since(&self, elapsed: Duration, cursor: &mut usize) -> &[ScheduledEvent] {
        let start = (*cursor).min(self.events.len());
        let due = self.events[start..]
            .iter()
            .take_while(|event| event.fire_at() <= elapsed)
            .count();
        *cursor = start + due;
        &self.events[start..start + due]
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a ScheduledEvent;
    type IntoIter = std::slice::Iter<'a, ScheduledEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn numbered_lines(raw: Option<&str>) -> impl Iterator<Item = (usize, &str)> {
    raw.unwrap_or_default()
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
}

fn parse_line(
    line_no: usize,
    line: &str,
) -> Result<(ScheduledEvent, Option<PayloadError>), ScheduleLineError> {
    let mut fields = line.splitn(3, '|');
    let (Some(duration), Some(name)) = (fields.next(), fields.next()) else {
        return Err(ScheduleLineError::MissingDelimiter { line: line_no });
    };
    let payload = fields.next().unwrap_or_default();

    let fire_at = parse_iso_duration(duration).map_err(|source| {
        ScheduleLineError::InvalidDuration {
            line: line_no,
            source,
        }
    })?;

    let (event_type, description) = match name.split_once('(') {
        Some((event_type, rest)) => {
            let Some((description, _)) = rest.rsplit_once(')') else {
                return Err(ScheduleLineError::UnclosedDescription { line: line_no });
            };
            let description = description.trim();
            (
                event_type.trim(),
                (!description.is_empty()).then(|| description.to_string()),
            )
        }
        None => (name.trim(), None),
    };

    if event_type.is_empty() {
        return Err(ScheduleLineError::EmptyEventType { line: line_no });
    }

    let (settings, payload_error) = match parse_payload(payload) {
        Ok(settings) => (settings, None),
        Err(e) => (EventSettings::Raw(payload.trim().to_string()), Some(e)),
    };

    Ok((
        ScheduledEvent::new(fire_at, event_type, description, settings),
        payload_error,
    ))
}
