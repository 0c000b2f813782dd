//! Text-to-value coercion for scalar properties.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::error::ParseError;
use crate::model::ScalarKind;
use crate::value::Value;

/// Default date-only format (`dd.MM.yyyy`).
pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";
/// Default date-time format (`dd.MM.yyyy HH:mm:ss`).
pub const DEFAULT_DATE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Date and date-time formats used when parsing record text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formats {
    pub date: String,
    pub date_time: String,
}

impl Default for Formats {
    fn default() -> Self {
        Self {
            date: DEFAULT_DATE_FORMAT.to_string(),
            date_time: DEFAULT_DATE_TIME_FORMAT.to_string(),
        }
    }
}

impl Formats {
    pub fn new(date: impl Into<String>, date_time: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            date_time: date_time.into(),
        }
    }
}

/// `"null"` in any case, or the empty string: leave the property unset.
pub fn is_null_literal(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case("null")
}

/// Parse `text` as `kind`. Null literals parse to [`Value::Null`].
pub fn parse_scalar(kind: ScalarKind, text: &str, formats: &Formats) -> Result<Value, ParseError> {
    if is_null_literal(text) {
        return Ok(Value::Null);
    }

    let trimmed = text.trim();
    let invalid = |reason: String| ParseError::InvalidScalar {
        value: text.to_string(),
        kind,
        reason,
    };

    let value = match kind {
        ScalarKind::Text => Value::Text(text.to_string()),
        ScalarKind::Int => Value::Int(
            trimmed
                .parse::<i32>()
                .map_err(|err| invalid(err.to_string()))?,
        ),
        ScalarKind::Long => Value::Long(
            trimmed
                .parse::<i64>()
                .map_err(|err| invalid(err.to_string()))?,
        ),
        ScalarKind::Float => Value::Float(
            trimmed
                .parse::<f64>()
                .map_err(|err| invalid(err.to_string()))?,
        ),
        ScalarKind::Bool => Value::Bool(parse_bool(trimmed).ok_or_else(|| {
            invalid("expected true/false, yes/no or 1/0".to_string())
        })?),
        ScalarKind::Date => Value::Date(
            NaiveDate::parse_from_str(trimmed, &formats.date)
                .map_err(|err| invalid(format!("{err} (format '{}')", formats.date)))?,
        ),
        ScalarKind::DateTime => Value::DateTime(parse_date_time(trimmed, formats).map_err(
            |err| invalid(format!("{err} (format '{}')", formats.date_time)),
        )?),
        ScalarKind::Uuid => {
            Value::Uuid(Uuid::parse_str(trimmed).map_err(|err| invalid(err.to_string()))?)
        }
    };

    Ok(value)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

// A date-only value is accepted for date-time properties and means midnight.
fn parse_date_time(text: &str, formats: &Formats) -> Result<NaiveDateTime, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(text, &formats.date_time) {
        Ok(value) => Ok(value),
        Err(err) => NaiveDate::parse_from_str(text, &formats.date)
            .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default())
            .map_err(|_| err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_literals_parse_to_null() {
        let formats = Formats::default();
        for text in ["", "null", "NULL", "Null"] {
            assert_eq!(
                parse_scalar(ScalarKind::Int, text, &formats),
                Ok(Value::Null)
            );
        }
    }

    #[test]
    fn parses_numbers_and_booleans() {
        let formats = Formats::default();
        assert_eq!(
            parse_scalar(ScalarKind::Int, " 42 ", &formats),
            Ok(Value::Int(42))
        );
        assert_eq!(
            parse_scalar(ScalarKind::Long, "9000000000", &formats),
            Ok(Value::Long(9_000_000_000))
        );
        assert_eq!(
            parse_scalar(ScalarKind::Bool, "TRUE", &formats),
            Ok(Value::Bool(true))
        );
        assert!(parse_scalar(ScalarKind::Int, "4x", &formats).is_err());
    }

    #[test]
    fn parses_dates_with_configured_formats() {
        let formats = Formats::default();
        let date = NaiveDate::from_ymd_opt(2011, 3, 14).expect("date");
        assert_eq!(
            parse_scalar(ScalarKind::Date, "14.03.2011", &formats),
            Ok(Value::Date(date))
        );
        assert_eq!(
            parse_scalar(ScalarKind::DateTime, "14.03.2011 08:30:00", &formats),
            Ok(Value::DateTime(date.and_hms_opt(8, 30, 0).expect("time")))
        );
        assert_eq!(
            parse_scalar(ScalarKind::DateTime, "14.03.2011", &formats),
            Ok(Value::DateTime(date.and_hms_opt(0, 0, 0).expect("time")))
        );

        let iso = Formats::new("%Y-%m-%d", "%Y-%m-%dT%H:%M:%S");
        assert!(parse_scalar(ScalarKind::Date, "14.03.2011", &iso).is_err());
    }

    #[test]
    fn text_keeps_surrounding_whitespace() {
        let formats = Formats::default();
        assert_eq!(
            parse_scalar(ScalarKind::Text, " a ", &formats),
            Ok(Value::Text(" a ".to_string()))
        );
    }
}
