use std::time::Duration;

/// Why a duration token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationParseError {
    #[error("Duration is empty")]
    Empty,
    #[error("Duration `{0}` must start with `P`")]
    MissingDesignator(String),
    #[error("Duration `{0}` is negative")]
    Negative(String),
    #[error("Duration `{0}` has no components")]
    NoComponents(String),
    #[error("Duration `{input}` has an invalid number `{number}`")]
    InvalidNumber { input: String, number: String },
    #[error("Duration `{input}` has unsupported or misplaced unit `{unit}`")]
    InvalidUnit { input: String, unit: char },
    #[error("Duration `{input}` has a number without a unit")]
    MissingUnit { input: String },
    #[error("Duration `{0}` is too large")]
    Overflow(String),
}

/// Parse an ISO-8601 duration of the form `PnDTnHnMn.nS`, such as `PT600S` or `P1DT2H`.
///
/// Designators are case-insensitive and whitespace anywhere in the token is ignored. Years, months
/// and weeks are not accepted because they have no fixed length. Only the seconds component may
/// carry a fraction. Negative durations are rejected.
pub fn parse_iso_duration(input: &str) -> Result<Duration, DurationParseError> {
    let token: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    if token.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let rest = match token.strip_prefix('-') {
        Some(_) => return Err(DurationParseError::Negative(input.to_string())),
        None => token.strip_prefix('+').unwrap_or(&token),
    };

    let Some(body) = rest.strip_prefix('P') else {
        return Err(DurationParseError::MissingDesignator(input.to_string()));
    };

    let mut total = Duration::ZERO;
    let mut in_time = false;
    let mut seen_component = false;
    // Units must appear in order: D, then T, then H, M, S.
    let mut last_rank = 0u8;
    let mut number = String::new();

    for c in body.chars() {
        match c {
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            'T' => {
                if in_time || !number.is_empty() {
                    return Err(DurationParseError::InvalidUnit {
                        input: input.to_string(),
                        unit: c,
                    });
                }
                in_time = true;
            }
            'D' | 'H' | 'M' | 'S' => {
                let (rank, unit_secs) = match (c, in_time) {
                    ('D', false) => (1, 86_400u64),
                    ('H', true) => (2, 3_600),
                    ('M', true) => (3, 60),
                    ('S', true) => (4, 1),
                    _ => {
                        return Err(DurationParseError::InvalidUnit {
                            input: input.to_string(),
                            unit: c,
                        })
                    }
                };
                if rank <= last_rank {
                    return Err(DurationParseError::InvalidUnit {
                        input: input.to_string(),
                        unit: c,
                    });
                }
                last_rank = rank;

                let component = component_duration(input, &number, unit_secs, c == 'S')?;
                total = total
                    .checked_add(component)
                    .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;
                number.clear();
                seen_component = true;
            }
            other => {
                return Err(DurationParseError::InvalidUnit {
                    input: input.to_string(),
                    unit: other,
                })
            }
        }
    }

    if !number.is_empty() {
        return Err(DurationParseError::MissingUnit {
            input: input.to_string(),
        });
    }

    if !seen_component {
        return Err(DurationParseError::NoComponents(input.to_string()));
    }

    Ok(total)
}

fn component_duration(
    input: &str,
    number: &str,
    unit_secs: u64,
    allow_fraction: bool,
) -> Result<Duration, DurationParseError> {
    let invalid = || DurationParseError::InvalidNumber {
        input: input.to_string(),
        number: number.to_string(),
    };

    if number.is_empty() {
        return Err(invalid());
    }

    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) if allow_fraction => (whole, fraction),
        Some(_) => return Err(invalid()),
        None => (number, ""),
    };

    if whole.is_empty() || fraction.contains('.') || fraction.len() > 9 {
        return Err(invalid());
    }

    let whole: u64 = whole.parse().map_err(|_| invalid())?;
    let secs = whole
        .checked_mul(unit_secs)
        .ok_or_else(|| DurationParseError::Overflow(input.to_string()))?;

    let nanos = if fraction.is_empty() {
        0
    } else {
        let digits: u32 = fraction.parse().map_err(|_| invalid())?;
        digits * 10u32.pow(9 - fraction.len() as u32)
    };

    Ok(Duration::new(secs, nanos))
}
