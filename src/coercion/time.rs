//! Time parsing for `time` fields.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};

use super::{CoercionResult, InvalidType};
use crate::value::Value;

/// The zero time, `0001-01-01T00:00:00Z`. Unparsable non-empty input maps
/// here.
pub fn zero_time() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_default()
}

/// Converts Unix seconds to a timestamp, falling back to the zero time when
/// the value is out of range.
pub fn from_unix_seconds(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_else(zero_time)
}

pub fn from_unix_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(zero_time)
}

/// Parses a raw value into a timestamp.
///
/// Null and the empty string are treated as empty input and rejected. Any
/// other input that cannot be read yields [`zero_time`].
pub fn parse_time(value: &Value) -> CoercionResult<DateTime<Utc>> {
    match value {
        Value::Null => Err(InvalidType),
        Value::String(s) if s.is_empty() => Err(InvalidType),
        Value::String(s) => Ok(DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| zero_time())),
        Value::Time(t) => Ok(*t),
        Value::Int(seconds) => Ok(from_unix_seconds(*seconds)),
        Value::UInt(seconds) => Ok(i64::try_from(*seconds)
            .map(from_unix_seconds)
            .unwrap_or_else(|_| zero_time())),
        Value::Float(seconds) if seconds.is_finite() => {
            // `as` saturates, and saturated values fall outside chrono's range
            Ok(from_unix_seconds(seconds.trunc() as i64))
        }
        Value::Float(_) | Value::Bool(_) | Value::Bytes(_) | Value::Array(_) | Value::Map(_) => {
            Ok(zero_time())
        }
    }
}

/// RFC-3339 in UTC with nanoseconds, trailing zeros of the fraction trimmed.
pub fn format_rfc3339_nano(time: &DateTime<Utc>) -> String {
    let mut text = time.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = time.nanosecond() % 1_000_000_000;
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text.push('Z');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_rfc3339() {
        let parsed = parse_time(&Value::from("2024-08-06T15:02:00Z")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 8, 6, 15, 2, 0).unwrap());

        let offset = parse_time(&Value::from("2024-08-06T17:02:00+02:00")).unwrap();
        assert_eq!(offset, parsed);
    }

    #[test]
    fn test_unix_seconds() {
        assert_eq!(parse_time(&Value::Int(1)).unwrap(), from_unix_seconds(1));
        assert_eq!(parse_time(&Value::Float(5.6)).unwrap(), from_unix_seconds(5));
    }

    #[test]
    fn test_empty_and_unparsable() {
        assert_eq!(parse_time(&Value::Null), Err(InvalidType));
        assert_eq!(parse_time(&Value::from("")), Err(InvalidType));
        assert_eq!(parse_time(&Value::from("abc")).unwrap(), zero_time());
        assert_eq!(parse_time(&Value::from("01")).unwrap(), zero_time());
        assert_eq!(zero_time().year(), 1);
    }

    #[test]
    fn test_format_trims_fraction() {
        let t = Utc.with_ymd_and_hms(2025, 2, 28, 10, 0, 0).unwrap();
        assert_eq!(format_rfc3339_nano(&t), "2025-02-28T10:00:00Z");

        let with_nanos = t + chrono::Duration::milliseconds(500);
        assert_eq!(format_rfc3339_nano(&with_nanos), "2025-02-28T10:00:00.5Z");
    }
}
