//! Elapsed-time display and parsing of edited values.

use chrono::{DateTime, Utc};

use crate::error::{Result, RoutineError};
use crate::patterns::{RE_CLOCK, RE_PLAIN_MINUTES, RE_UNITS};

/// `MM:SS` below an hour, `H:MM:SS` from an hour on.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Parses a duration typed into the edit-before-saving form.
///
/// Accepts plain minutes (`45`), the display clock form (`02:05`, `1:01:05`)
/// and unit form (`1h 5m`, `90s`). The result must be positive.
pub fn parse_duration_input(input: &str) -> Result<u64> {
    let trimmed = input.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(RoutineError::invalid_override("duration", "a value is required"));
    }

    let seconds = if RE_PLAIN_MINUTES.is_match(&trimmed) {
        number(&trimmed)?.checked_mul(60)
    } else if let Some(caps) = RE_CLOCK.captures(&trimmed) {
        let hours = caps.get(1).map(|m| number(m.as_str())).transpose()?;
        let minutes = number(&caps[2])?;
        let secs = number(&caps[3])?;
        if secs >= 60 || (hours.is_some() && minutes >= 60) {
            return Err(RoutineError::invalid_override(
                "duration",
                format!("'{}' is not a valid clock time", input.trim()),
            ));
        }
        combine(hours.unwrap_or(0), minutes, secs)
    } else if let Some(caps) = RE_UNITS
        .captures(&trimmed)
        .filter(|caps| caps.iter().skip(1).any(|m| m.is_some()))
    {
        let part = |index: usize| -> Result<u64> {
            caps.get(index)
                .map(|m| number(m.as_str()))
                .transpose()
                .map(|value| value.unwrap_or(0))
        };
        combine(part(1)?, part(2)?, part(3)?)
    } else {
        return Err(RoutineError::invalid_override(
            "duration",
            format!("'{}' is not a number", input.trim()),
        ));
    };

    match seconds {
        Some(0) => Err(RoutineError::invalid_override(
            "duration",
            "must be greater than zero",
        )),
        Some(value) => Ok(value),
        None => Err(RoutineError::invalid_override("duration", "is too large")),
    }
}

/// Parses an edited start time (RFC 3339). Must not lie after `now`.
pub fn parse_start_input(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(input.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            RoutineError::invalid_override("start time", format!("'{}': {}", input.trim(), err))
        })?;
    if parsed > now {
        return Err(RoutineError::invalid_override(
            "start time",
            "cannot be in the future",
        ));
    }
    Ok(parsed)
}

fn number(digits: &str) -> Result<u64> {
    digits
        .parse::<u64>()
        .map_err(|_| RoutineError::invalid_override("duration", "is too large"))
}

fn combine(hours: u64, minutes: u64, seconds: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn formats_minutes_and_seconds_below_an_hour() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(125), "02:05");
        assert_eq!(format_elapsed(3599), "59:59");
    }

    #[test]
    fn formats_unpadded_hours_from_an_hour() {
        assert_eq!(format_elapsed(3600), "1:00:00");
        assert_eq!(format_elapsed(3665), "1:01:05");
        assert_eq!(format_elapsed(36_000 + 61), "10:01:01");
    }

    #[test]
    fn plain_numbers_are_minutes() {
        assert_eq!(parse_duration_input("45").unwrap(), 45 * 60);
        assert_eq!(parse_duration_input(" 1 ").unwrap(), 60);
    }

    #[test]
    fn clock_form_matches_display() {
        assert_eq!(parse_duration_input("02:05").unwrap(), 125);
        assert_eq!(parse_duration_input("1:01:05").unwrap(), 3665);
    }

    #[test]
    fn unit_form_is_accepted() {
        assert_eq!(parse_duration_input("1h 5m").unwrap(), 3900);
        assert_eq!(parse_duration_input("90s").unwrap(), 90);
        assert_eq!(parse_duration_input("2H30M").unwrap(), 9000);
        assert_eq!(parse_duration_input("20 min").unwrap(), 1200);
    }

    #[test]
    fn rejects_non_numeric_input() {
        let err = parse_duration_input("soon").unwrap_err();
        assert!(err.is_validation());
        assert!(parse_duration_input("").is_err());
        assert!(parse_duration_input("-5").is_err());
        assert!(parse_duration_input("1:75").is_err());
    }

    #[test]
    fn rejects_non_positive_input() {
        let err = parse_duration_input("0").unwrap_err();
        assert_eq!(err.to_string(), "Invalid duration: must be greater than zero");
        assert!(parse_duration_input("00:00").is_err());
    }

    #[test]
    fn start_time_must_not_be_in_the_future() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        assert_eq!(
            parse_start_input("2026-10-16T08:30:00Z", now).unwrap(),
            now - Duration::minutes(30)
        );
        assert!(parse_start_input("2026-10-16T09:30:00Z", now).is_err());
        assert!(parse_start_input("yesterday", now).is_err());
    }
}
