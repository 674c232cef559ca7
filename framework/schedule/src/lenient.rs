use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::{Map, Number, Value};

/// Nesting limit for objects and arrays inside the top-level object, the same as serde_json's.
const MAX_DEPTH: usize = 128;

/// Errors from [parse_lenient_object].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LenientParseError {
    #[error("Expected `{expected}` at offset {offset}")]
    Expected { expected: &'static str, offset: usize },
    #[error("Unexpected `{found}` at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("Unexpected end of input")]
    UnexpectedEnd,
    #[error("Trailing content after the closing brace at offset {offset}")]
    TrailingContent { offset: usize },
    #[error("Nesting deeper than {MAX_DEPTH} levels at offset {offset}")]
    TooDeep { offset: usize },
}

/// Parse a brace-delimited object written in the relaxed notation people use in schedules and
/// that the Perfana server uses in some responses.
///
/// Compared to JSON this accepts:
/// - single-quoted strings as well as double-quoted ones,
/// - bare words as keys and values (`abort: true`, `test-results: []`),
/// - optional commas between members and between list items.
///
/// Bare values become numbers, booleans or null when they read as such, otherwise strings.
pub fn parse_lenient_object(input: &str) -> Result<Map<String, Value>, LenientParseError> {
    let mut parser = Parser {
        chars: input.char_indices().peekable(),
        depth: 0,
    };

    parser.skip_whitespace();
    let object = parser.object()?;

    parser.skip_whitespace();
    if let Some((offset, _)) = parser.chars.peek() {
        return Err(LenientParseError::TrailingContent { offset: *offset });
    }

    Ok(object)
}

struct Parser<'a> {
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    /// Skip whitespace and any number of separating commas.
    fn skip_separators(&mut self) {
        while self
            .chars
            .next_if(|(_, c)| c.is_whitespace() || *c == ',')
            .is_some()
        {}
    }

    fn expect(&mut self, expected: char, name: &'static str) -> Result<(), LenientParseError> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((offset, _)) => Err(LenientParseError::Expected {
                expected: name,
                offset,
            }),
            None => Err(LenientParseError::UnexpectedEnd),
        }
    }

    fn object(&mut self) -> Result<Map<String, Value>, LenientParseError> {
        self.expect('{', "{")?;
        let mut map = Map::new();

        loop {
            self.skip_separators();
            match self.chars.peek() {
                Some((_, '}')) => {
                    self.chars.next();
                    return Ok(map);
                }
                None => return Err(LenientParseError::UnexpectedEnd),
                _ => {}
            }

            let key = self.key()?;
            self.skip_whitespace();
            self.expect(':', ":")?;
            self.skip_whitespace();
            let value = self.value()?;
            map.insert(key, value);
        }
    }

    fn array(&mut self) -> Result<Vec<Value>, LenientParseError> {
        self.expect('[', "[")?;
        let mut items = Vec::new();

        loop {
            self.skip_separators();
            match self.chars.peek() {
                Some((_, ']')) => {
                    self.chars.next();
                    return Ok(items);
                }
                None => return Err(LenientParseError::UnexpectedEnd),
                _ => items.push(self.value()?),
            }
        }
    }

    fn key(&mut self) -> Result<String, LenientParseError> {
        match self.chars.peek().copied() {
            Some((_, '\'' | '"')) => self.quoted(),
            Some((_, c)) if is_bare(c) => Ok(self.bare_word()),
            Some((offset, found)) => Err(LenientParseError::Unexpected { found, offset }),
            None => Err(LenientParseError::UnexpectedEnd),
        }
    }

    fn value(&mut self) -> Result<Value, LenientParseError> {
        match self.chars.peek().copied() {
            Some((offset, '{')) => self.nested(offset, |p| p.object().map(Value::Object)),
            Some((offset, '[')) => self.nested(offset, |p| p.array().map(Value::Array)),
            Some((_, '\'' | '"')) => self.quoted().map(Value::String),
            Some((_, c)) if is_bare(c) => Ok(bare_value(self.bare_word())),
            Some((offset, found)) => Err(LenientParseError::Unexpected { found, offset }),
            None => Err(LenientParseError::UnexpectedEnd),
        }
    }

    fn nested(
        &mut self,
        offset: usize,
        parse: impl FnOnce(&mut Self) -> Result<Value, LenientParseError>,
    ) -> Result<Value, LenientParseError> {
        if self.depth == MAX_DEPTH {
            return Err(LenientParseError::TooDeep { offset });
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn quoted(&mut self) -> Result<String, LenientParseError> {
        let Some((start, quote)) = self.chars.next() else {
            return Err(LenientParseError::UnexpectedEnd);
        };

        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }

        Err(LenientParseError::UnterminatedString { offset: start })
    }

    fn bare_word(&mut self) -> String {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next_if(|(_, c)| is_bare(*c)) {
            out.push(c);
        }
        out
    }
}

fn is_bare(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '\'' | '"')
}

fn bare_value(word: String) -> Value {
    match word.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = word.parse::<i64>() {
                return Value::Number(n.into());
            }
            word.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(word))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(input: &str) -> Value {
        Value::Object(parse_lenient_object(input).unwrap())
    }

    #[test]
    fn tolerates_missing_comma_between_members() {
        assert_eq!(
            parse("{ 'server':'myserver' 'replicas':2, 'tags': [ 'first', 'second' ] }"),
            json!({ "server": "myserver", "replicas": 2, "tags": ["first", "second"] })
        );
    }

    #[test]
    fn accepts_bare_keys_and_values() {
        assert_eq!(
            parse("{ abort: true, test-results: [ ] }"),
            json!({ "abort": true, "test-results": [] })
        );
    }

    #[test]
    fn accepts_strict_json() {
        assert_eq!(
            parse(r#"{"a": {"b": [1, 2.5, null]}, "c": "d"}"#),
            json!({ "a": { "b": [1, 2.5, null] }, "c": "d" })
        );
    }

    #[test]
    fn keeps_separators_inside_quotes() {
        assert_eq!(
            parse("{ 'msg': 'a, b: {c}' }"),
            json!({ "msg": "a, b: {c}" })
        );
    }

    #[test]
    fn handles_escapes() {
        assert_eq!(parse(r"{ 'it': 'it\'s' }"), json!({ "it": "it's" }));
    }

    #[test]
    fn reports_structural_errors() {
        assert_eq!(
            parse_lenient_object("{ 'a': 1"),
            Err(LenientParseError::UnexpectedEnd)
        );
        assert_eq!(
            parse_lenient_object("{ 'a' 1 }"),
            Err(LenientParseError::Expected {
                expected: ":",
                offset: 6
            })
        );
        assert_eq!(
            parse_lenient_object("{ 'a': 'b }"),
            Err(LenientParseError::UnterminatedString { offset: 7 })
        );
        assert!(matches!(
            parse_lenient_object("{ } x"),
            Err(LenientParseError::TrailingContent { offset: 4 })
        ));
        assert!(matches!(
            parse_lenient_object("replicas=1"),
            Err(LenientParseError::Expected { expected: "{", .. })
        ));
    }

    #[test]
    fn rejects_deep_nesting_without_overflowing() {
        let input = format!("{{ 'a': {}", "[".repeat(200_000));

        assert_eq!(
            parse_lenient_object(&input),
            Err(LenientParseError::TooDeep { offset: 7 + MAX_DEPTH })
        );
    }

    #[test]
    fn accepts_nesting_up_to_the_limit() {
        let input = format!(
            "{{ 'a': {}{} }}",
            "[".repeat(MAX_DEPTH),
            "]".repeat(MAX_DEPTH)
        );

        assert!(parse_lenient_object(&input).is_ok());
    }
}
