use std::fmt;
use std::ops::Sub;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A GTFS time of day, stored as the duration since the start of the service
/// day. Trips running past midnight keep counting upwards (`25:30:00`), so
/// this is never a wall-clock time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceTime(u32);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("invalid time format {0:?}, expected HH:MM:SS")]
    Format(String),
    #[error("invalid time value {0:?}, minutes and seconds must be below 60")]
    Value(String),
}

impl ServiceTime {
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    /// Parses `H:MM:SS` or `HH:MM:SS`. Hours may exceed 23.
    pub fn parse(value: &str) -> Result<Self, TimeParseError> {
        let trimmed = value.trim();
        let mut parts = trimmed.split(':');
        let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TimeParseError::Format(value.to_string()));
        };
        if h.is_empty() || m.len() != 2 || s.len() != 2 {
            return Err(TimeParseError::Format(value.to_string()));
        }

        let number = |part: &str| -> Result<u32, TimeParseError> {
            if !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(TimeParseError::Format(value.to_string()));
            }
            part.parse()
                .map_err(|_| TimeParseError::Format(value.to_string()))
        };
        let (hours, minutes, seconds) = (number(h)?, number(m)?, number(s)?);
        if minutes >= 60 || seconds >= 60 {
            return Err(TimeParseError::Value(value.to_string()));
        }
        hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60 + seconds))
            .map(Self)
            .ok_or_else(|| TimeParseError::Value(value.to_string()))
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }

    /// Hour bucket of this time. Post-midnight times keep their overflowing
    /// hour (`25:10:00` is hour 25).
    pub fn hour(self) -> u32 {
        self.0 / 3600
    }

    pub fn as_minutes(self) -> f64 {
        self.0 as f64 / 60.0
    }
}

impl Sub for ServiceTime {
    type Output = chrono::Duration;

    fn sub(self, earlier: ServiceTime) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.0) - i64::from(earlier.0))
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl Serialize for ServiceTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ServiceTime::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Converts a signed duration to fractional minutes.
pub fn minutes(duration: chrono::Duration) -> f64 {
    duration.num_seconds() as f64 / 60.0
}

/// Converts a signed duration to fractional hours.
pub fn hours(duration: chrono::Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regular_and_post_midnight() {
        assert_eq!(ServiceTime::parse("08:10:00").unwrap(), ServiceTime::from_hms(8, 10, 0));
        assert_eq!(ServiceTime::parse("7:05:09").unwrap(), ServiceTime::from_hms(7, 5, 9));
        let late = ServiceTime::parse("25:30:00").unwrap();
        assert_eq!(late.as_secs(), 25 * 3600 + 30 * 60);
        assert_eq!(late.hour(), 25);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(ServiceTime::parse(" 06:00:00 ").unwrap().hour(), 6);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "8:00", "08:00:00:00", "aa:00:00", "08:0:00", "-1:00:00", "08:00:0x"] {
            assert!(
                matches!(ServiceTime::parse(bad), Err(TimeParseError::Format(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(
            ServiceTime::parse("08:60:00"),
            Err(TimeParseError::Value(_))
        ));
    }

    #[test]
    fn test_display_round_trips_overflowing_hours() {
        assert_eq!(ServiceTime::from_hms(25, 3, 7).to_string(), "25:03:07");
        assert_eq!(ServiceTime::from_hms(6, 0, 0).to_string(), "06:00:00");
    }

    #[test]
    fn test_subtraction_across_midnight() {
        let before = ServiceTime::from_hms(23, 50, 0);
        let after = ServiceTime::from_hms(24, 10, 0);
        assert_eq!((after - before).num_minutes(), 20);
        assert_eq!((before - after).num_minutes(), -20);
        assert_eq!(minutes(after - before), 20.0);
        assert_eq!(hours(ServiceTime::from_hms(9, 30, 0) - ServiceTime::from_hms(8, 0, 0)), 1.5);
    }

    #[test]
    fn test_json_uses_gtfs_notation() {
        let late = ServiceTime::from_hms(25, 30, 0);
        assert_eq!(serde_json::to_string(&late).unwrap(), "\"25:30:00\"");
        let parsed: ServiceTime = serde_json::from_str("\"25:30:00\"").unwrap();
        assert_eq!(parsed, late);
        assert!(serde_json::from_str::<ServiceTime>("\"25h30\"").is_err());
    }
}
