use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

/// Settings carried by a scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventSettings {
    /// The line had no payload field.
    Empty,
    /// Brace-delimited payload, e.g. `{ 'replicas': 2, 'tags': ['a', 'b'] }`.
    Json(Map<String, Value>),
    /// Semicolon separated payload, e.g. `server=myserver; port=1567`.
    KeyValue(BTreeMap<String, String>),
    /// A payload that could not be parsed in either dialect, kept verbatim (trimmed).
    Raw(String),
}

impl EventSettings {
    /// Look up a setting as a string.
    ///
    /// Scalars in the brace dialect are rendered without quotes. Lists and nested objects are
    /// rendered as JSON. Raw settings have no keys.
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            EventSettings::Json(map) => map.get(key).map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            EventSettings::KeyValue(map) => map.get(key).cloned(),
            EventSettings::Empty | EventSettings::Raw(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EventSettings::Empty => true,
            EventSettings::Json(map) => map.is_empty(),
            EventSettings::KeyValue(map) => map.is_empty(),
            EventSettings::Raw(raw) => raw.is_empty(),
        }
    }
}

/// One event from a schedule. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    fire_at: Duration,
    event_type: String,
    description: Option<String>,
    settings: EventSettings,
}

impl ScheduledEvent {
    pub fn new(
        fire_at: Duration,
        event_type: impl Into<String>,
        description: Option<String>,
        settings: EventSettings,
    ) -> Self {
        Self {
            fire_at,
            event_type: event_type.into(),
            description,
            settings,
        }
    }

    /// Offset from the start of the test at which this event is due.
    pub fn fire_at(&self) -> Duration {
        self.fire_at
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn settings(&self) -> &EventSettings {
        &self.settings
    }

    /// Human readable summary used as the title of events reported to Perfana.
    pub fn title(&self) -> String {
        format!("Scheduled event: {}", self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_renders_json_scalars_without_quotes() {
        let Value::Object(map) = json!({ "server": "myserver", "replicas": 2, "tags": ["a", "b"] })
        else {
            unreachable!()
        };
        let settings = EventSettings::Json(map);

        assert_eq!(settings.get("server").as_deref(), Some("myserver"));
        assert_eq!(settings.get("replicas").as_deref(), Some("2"));
        assert_eq!(settings.get("tags").as_deref(), Some(r#"["a","b"]"#));
        assert_eq!(settings.get("missing"), None);
    }

    #[test]
    fn raw_settings_have_no_keys() {
        let settings = EventSettings::Raw("garbage".to_string());
        assert_eq!(settings.get("garbage"), None);
        assert!(!settings.is_empty());
        assert!(EventSettings::Empty.is_empty());
    }
}
