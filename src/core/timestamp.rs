//! Microsecond-precision UTC timestamps and their ISO-8601 text form.
//!
//! Records carry timestamps as naive ISO-8601 strings with six fractional
//! digits (`2024-01-01T00:00:00.000000`). Every timestamp handed out by this
//! module is truncated to microseconds so that formatting and parsing are
//! exact inverses.

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};

/// Format used when writing timestamps into records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Current wall-clock time, truncated to microseconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Current time, or one microsecond past `previous` when the clock has not
/// moved beyond it.
pub fn next_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let current = now();
    if current > previous {
        current
    } else {
        previous + Duration::microseconds(1)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a record timestamp.
///
/// Accepts the naive form written by [`format_timestamp`] (fraction optional)
/// and RFC 3339 strings carrying an offset.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(DateTime::from_naive_utc_and_offset(parsed, Utc).trunc_subsecs(6));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc).trunc_subsecs(6));
    }

    Err(format!("unsupported timestamp format: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn test_format_has_six_fraction_digits() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_micro_opt(0, 0, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(format_timestamp(&ts), "2024-01-01T00:00:00.000000");
    }

    #[test]
    fn test_parse_roundtrip_is_exact() {
        let ts = now();
        let parsed = parse_timestamp(&format_timestamp(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_parse_without_fraction() {
        let parsed = parse_timestamp("2024-01-01T12:30:00").unwrap();
        assert_eq!(parsed.hour(), 12);
        assert_eq!(parsed.minute(), 30);
        assert_eq!(parsed.nanosecond(), 0);
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let parsed = parse_timestamp("2024-01-01T02:00:00.5+02:00").unwrap();
        assert_eq!(format_timestamp(&parsed), "2024-01-01T00:00:00.500000");
    }

    #[test]
    fn test_parse_truncates_to_micros() {
        let parsed = parse_timestamp("2024-01-01T00:00:00.123456789").unwrap();
        assert_eq!(parsed.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_now_is_truncated() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }

    #[test]
    fn test_next_after_is_strictly_later() {
        let future = now() + Duration::seconds(60);
        let next = next_after(future);
        assert_eq!(next, future + Duration::microseconds(1));
        assert!(next_after(next) > next);
    }
}
