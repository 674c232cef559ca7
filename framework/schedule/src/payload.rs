use std::collections::BTreeMap;

use crate::event::EventSettings;
use crate::lenient::{parse_lenient_object, LenientParseError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid brace payload: {0}")]
    Object(#[from] LenientParseError),
    #[error("Key-value pair `{0}` has no `=`")]
    MissingEquals(String),
    #[error("Key-value pair `{0}` has an empty key")]
    EmptyKey(String),
}

/// Parse an event payload. A leading `{` selects the brace dialect, anything else is read as
/// semicolon separated `key=value` pairs.
pub(crate) fn parse_payload(payload: &str) -> Result<EventSettings, PayloadError> {
    let payload = payload.trim();

    if payload.is_empty() {
        return Ok(EventSettings::Empty);
    }

    if payload.starts_with('{') {
        Ok(EventSettings::Json(parse_lenient_object(payload)?))
    } else {
        parse_key_values(payload).map(EventSettings::KeyValue)
    }
}

fn parse_key_values(payload: &str) -> Result<BTreeMap<String, String>, PayloadError> {
    let mut settings = BTreeMap::new();

    for pair in payload.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(PayloadError::MissingEquals(pair.to_string()));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(PayloadError::EmptyKey(pair.to_string()));
        }

        settings.insert(key.to_string(), value.trim().to_string());
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_values_are_trimmed() {
        let settings = parse_payload("server=    myserver.example.com;   port=1567  ").unwrap();

        assert_eq!(
            settings,
            EventSettings::KeyValue(BTreeMap::from([
                ("port".to_string(), "1567".to_string()),
                ("server".to_string(), "myserver.example.com".to_string()),
            ]))
        );
    }

    #[test]
    fn value_may_contain_equals() {
        let settings = parse_payload("query=a=b;").unwrap();
        assert_eq!(settings.get("query").as_deref(), Some("a=b"));
    }

    #[test]
    fn brace_dialect_selected_by_leading_brace() {
        let settings = parse_payload("   { 'replicas':1 }   ").unwrap();
        assert!(matches!(settings, EventSettings::Json(_)));
        assert_eq!(settings.get("replicas").as_deref(), Some("1"));
    }

    #[test]
    fn blank_payload_is_empty() {
        assert_eq!(parse_payload("   ").unwrap(), EventSettings::Empty);
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert_eq!(
            parse_payload("server; port=1"),
            Err(PayloadError::MissingEquals("server".to_string()))
        );
        assert_eq!(
            parse_payload(" =1"),
            Err(PayloadError::EmptyKey("=1".to_string()))
        );
        assert!(matches!(
            parse_payload("{ 'replicas': "),
            Err(PayloadError::Object(_))
        ));
    }
}
