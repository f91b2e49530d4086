//! Timetable time handling.
//!
//! Schedules express times as an offset from midnight of the service day in
//! the feed's local time zone. A trip that starts late in the evening keeps
//! counting past midnight, so "25:10:00" is a perfectly valid time. This
//! module provides that representation and its conversion from the absolute
//! instants used by realtime feeds.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

const SECONDS_PER_HOUR: i64 = 60 * 60;

/// Seconds since midnight of the service day, in the feed's local time.
///
/// Can exceed 24 hours for trips running past midnight, and can be negative
/// when a realtime prediction puts a stop before the start of its service day.
///
/// # Examples
///
/// ```
/// use transit_fusion::domain::ServiceTime;
///
/// let t = ServiceTime::parse_hhmmss("25:10:00").unwrap();
/// assert_eq!(t.seconds(), 25 * 3600 + 10 * 60);
/// assert_eq!(t.to_string(), "25:10:00");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ServiceTime(i32);

impl ServiceTime {
    /// Creates a time from seconds since service-day midnight.
    pub fn from_seconds(seconds: i32) -> Self {
        Self(seconds)
    }

    /// Creates a time from hour, minute and second components.
    ///
    /// Returns `None` if minutes or seconds are out of range.
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if minute > 59 || second > 59 {
            return None;
        }
        let total = i64::from(hour) * SECONDS_PER_HOUR + i64::from(minute) * 60 + i64::from(second);
        i32::try_from(total).ok().map(Self)
    }

    /// Parse a time in "HH:MM:SS" format. Hours may exceed 23.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_fusion::domain::ServiceTime;
    ///
    /// assert!(ServiceTime::parse_hhmmss("00:00:00").is_ok());
    /// assert!(ServiceTime::parse_hhmmss("26:59:59").is_ok());
    /// assert!(ServiceTime::parse_hhmmss("8:00:00").is_ok());
    ///
    /// assert!(ServiceTime::parse_hhmmss("08:00").is_err());
    /// assert!(ServiceTime::parse_hhmmss("08:60:00").is_err());
    /// ```
    pub fn parse_hhmmss(s: &str) -> Result<Self, TimeError> {
        let mut parts = s.split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TimeError::new("expected HH:MM:SS format"));
        };

        if h.is_empty() || h.len() > 3 || !h.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeError::new("invalid hour digits"));
        }
        let hour: u32 = h.parse().map_err(|_| TimeError::new("invalid hour digits"))?;
        let minute =
            parse_two_digits(m.as_bytes()).ok_or_else(|| TimeError::new("invalid minute digits"))?;
        let second =
            parse_two_digits(sec.as_bytes()).ok_or_else(|| TimeError::new("invalid second digits"))?;

        Self::from_hms(hour, minute, second)
            .ok_or_else(|| TimeError::new("minute and second must be 0-59"))
    }

    /// Converts an absolute instant into the timetable frame of `service_date`.
    ///
    /// `offset_hours` is the UTC offset in effect for the service day, as
    /// reported by the day-offset cache. Returns `None` if the instant is out
    /// of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_fusion::domain::ServiceTime;
    /// use chrono::NaiveDate;
    ///
    /// // 2023-11-14 22:13:20 UTC, viewed from a UTC+11 feed, is 09:13:20 on the 15th.
    /// let date = NaiveDate::from_ymd_opt(2023, 11, 15).unwrap();
    /// let t = ServiceTime::from_instant(1_700_000_000, date, 11.0).unwrap();
    /// assert_eq!(t.to_string(), "09:13:20");
    /// ```
    pub fn from_instant(epoch_secs: i64, service_date: NaiveDate, offset_hours: f64) -> Option<Self> {
        let instant = DateTime::from_timestamp(epoch_secs, 0)?;
        let offset_secs = (offset_hours * SECONDS_PER_HOUR as f64).round() as i64;
        let local = instant
            .naive_utc()
            .checked_add_signed(TimeDelta::try_seconds(offset_secs)?)?;
        let midnight = service_date.and_hms_opt(0, 0, 0)?;
        let seconds = local.signed_duration_since(midnight).num_seconds();
        i32::try_from(seconds).ok().map(Self)
    }

    /// Returns seconds since service-day midnight.
    pub fn seconds(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let total = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_valid_times() {
        assert_eq!(ServiceTime::parse_hhmmss("00:00:00").unwrap().seconds(), 0);
        assert_eq!(
            ServiceTime::parse_hhmmss("08:30:15").unwrap().seconds(),
            8 * 3600 + 30 * 60 + 15
        );
        assert_eq!(
            ServiceTime::parse_hhmmss("24:05:00").unwrap().seconds(),
            24 * 3600 + 5 * 60
        );
    }

    #[test]
    fn reject_invalid_times() {
        assert!(ServiceTime::parse_hhmmss("").is_err());
        assert!(ServiceTime::parse_hhmmss("08:30").is_err());
        assert!(ServiceTime::parse_hhmmss("08:30:00:00").is_err());
        assert!(ServiceTime::parse_hhmmss("aa:30:00").is_err());
        assert!(ServiceTime::parse_hhmmss("08:3:00").is_err());
        assert!(ServiceTime::parse_hhmmss("08:30:61").is_err());
        assert!(ServiceTime::parse_hhmmss("-1:30:00").is_err());
    }

    #[test]
    fn display_formats() {
        assert_eq!(ServiceTime::from_seconds(0).to_string(), "00:00:00");
        assert_eq!(ServiceTime::from_seconds(90_061).to_string(), "25:01:01");
        assert_eq!(ServiceTime::from_seconds(-60).to_string(), "-00:01:00");
    }

    #[test]
    fn from_instant_utc() {
        // 1_700_000_000 = 2023-11-14 22:13:20 UTC
        let t = ServiceTime::from_instant(1_700_000_000, date(2023, 11, 14), 0.0).unwrap();
        assert_eq!(t.seconds(), 22 * 3600 + 13 * 60 + 20);
    }

    #[test]
    fn from_instant_past_midnight() {
        // Same instant, but the service day started the day before in a UTC+2 zone:
        // local time is 00:13:20 on the 15th, i.e. 24:13:20 on the 14th.
        let t = ServiceTime::from_instant(1_700_000_000, date(2023, 11, 14), 2.0).unwrap();
        assert_eq!(t.to_string(), "24:13:20");
    }

    #[test]
    fn from_instant_half_hour_offset() {
        let t = ServiceTime::from_instant(1_700_000_000, date(2023, 11, 15), 5.5).unwrap();
        assert_eq!(t.to_string(), "03:43:20");
    }

    #[test]
    fn from_instant_beyond_chrono_range() {
        let max = DateTime::<chrono::Utc>::MAX_UTC.timestamp();
        assert_eq!(ServiceTime::from_instant(max, date(2023, 11, 14), 10.0), None);

        let min = DateTime::<chrono::Utc>::MIN_UTC.timestamp();
        assert_eq!(ServiceTime::from_instant(min, date(2023, 11, 14), -10.0), None);
        assert_eq!(ServiceTime::from_instant(i64::MAX, date(2023, 11, 14), 0.0), None);
    }

    #[test]
    fn ordering_follows_seconds() {
        let early = ServiceTime::parse_hhmmss("23:59:00").unwrap();
        let late = ServiceTime::parse_hhmmss("24:01:00").unwrap();
        assert!(early < late);
    }
}
