//! Day-granular UTC offset lookup.
//!
//! Converting between feed-local timetable times and absolute instants needs
//! the UTC offset in effect on the service day. DST transitions happen
//! overnight, in the middle of some trips, so the offset is sampled once per
//! date at a configured "check hour" and that value is used for the whole
//! service day.
//!
//! Offsets are memoized per date. When the cache reaches capacity it is
//! cleared entirely and refilled from empty rather than evicting entries one
//! at a time; lookups arrive in bursts clustered around a few dates, so a
//! full clear is cheap.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{LocalResult, NaiveDate, Offset, TimeZone};
use chrono_tz::Tz;
use moka::sync::Cache as MokaCache;
use tracing::debug;

/// Error returned when a time zone setting can't be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OffsetError {
    #[error("unknown time zone: {0}")]
    UnknownTimezone(String),

    #[error("check hour must be 0-23, got {0}")]
    InvalidCheckHour(u32),
}

/// The time zone a feed's timetable times are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedTimezone {
    /// An IANA zone with DST rules, e.g. `Australia/Melbourne`.
    Named(Tz),
    /// A constant offset from UTC, in minutes.
    Fixed(i32),
}

impl FeedTimezone {
    /// Parse an IANA zone name, or a fixed offset in hours such as `+10` or `5.5`.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_fusion::offset::FeedTimezone;
    ///
    /// assert!(matches!(FeedTimezone::parse("Europe/Berlin"), Ok(FeedTimezone::Named(_))));
    /// assert_eq!(FeedTimezone::parse("+10").unwrap(), FeedTimezone::Fixed(600));
    /// assert_eq!(FeedTimezone::parse("-3.5").unwrap(), FeedTimezone::Fixed(-210));
    /// assert!(FeedTimezone::parse("Mars/Olympus").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, OffsetError> {
        let s = s.trim();
        if let Ok(tz) = s.parse::<Tz>() {
            return Ok(FeedTimezone::Named(tz));
        }
        match s.parse::<f64>() {
            Ok(hours) if hours.is_finite() && hours.abs() <= 18.0 => {
                Ok(FeedTimezone::Fixed((hours * 60.0).round() as i32))
            }
            _ => Err(OffsetError::UnknownTimezone(s.to_string())),
        }
    }
}

/// Memoized date → UTC offset calculator for one time zone.
pub struct DayOffsetCache {
    timezone: FeedTimezone,
    check_hour: u32,
    capacity: u64,
    entries: MokaCache<NaiveDate, f64>,
    /// Entries computed since the last clear.
    occupancy: AtomicU64,
}

impl DayOffsetCache {
    /// Creates an empty cache.
    ///
    /// `check_hour` is the local hour (0-23) at which each date's offset is
    /// sampled. A capacity of zero is treated as one.
    pub fn new(timezone: FeedTimezone, check_hour: u32, capacity: u64) -> Result<Self, OffsetError> {
        if check_hour > 23 {
            return Err(OffsetError::InvalidCheckHour(check_hour));
        }
        Ok(Self {
            timezone,
            check_hour,
            capacity: capacity.max(1),
            entries: MokaCache::builder().build(),
            occupancy: AtomicU64::new(0),
        })
    }

    pub fn timezone(&self) -> FeedTimezone {
        self.timezone
    }

    /// UTC offset, in hours, in effect at the check hour on `date`.
    ///
    /// Only one caller clears a full cache. Concurrent callers that pass the
    /// capacity check together may each add an entry first, so occupancy can
    /// briefly exceed capacity by the number of concurrent callers.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_fusion::offset::{DayOffsetCache, FeedTimezone};
    /// use chrono::NaiveDate;
    ///
    /// let cache = DayOffsetCache::new(FeedTimezone::parse("Europe/Berlin").unwrap(), 12, 16).unwrap();
    /// let winter = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
    /// let summer = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap();
    /// assert_eq!(cache.offset_hours(winter), 1.0);
    /// assert_eq!(cache.offset_hours(summer), 2.0);
    /// ```
    pub fn offset_hours(&self, date: NaiveDate) -> f64 {
        let tz = match self.timezone {
            FeedTimezone::Fixed(minutes) => return f64::from(minutes) / 60.0,
            FeedTimezone::Named(tz) => tz,
        };

        if let Some(hours) = self.entries.get(&date) {
            return hours;
        }

        let capacity = self.capacity;
        let reset = self
            .occupancy
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n >= capacity).then_some(0));
        if reset.is_ok() {
            debug!(capacity, "offset cache full, clearing");
            self.entries.invalidate_all();
        }

        self.entries.get_with(date, || {
            self.occupancy.fetch_add(1, Ordering::Relaxed);
            compute_offset_hours(tz, date, self.check_hour)
        })
    }

    /// Number of dates computed since the last clear.
    pub fn len(&self) -> u64 {
        self.occupancy.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Offset of `tz` from UTC at `check_hour` local time on `date`.
fn compute_offset_hours(tz: Tz, date: NaiveDate, check_hour: u32) -> f64 {
    let Some(local) = date.and_hms_opt(check_hour, 0, 0) else {
        return 0.0;
    };
    let seconds = match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.offset().fix().local_minus_utc(),
        // The check hour fell into a spring-forward gap; read the offset as
        // if the wall-clock time were UTC, which lands just after the gap.
        LocalResult::None => tz.offset_from_utc_datetime(&local).fix().local_minus_utc(),
    };
    f64::from(seconds) / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::{Australia::Melbourne, Europe::Berlin};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_timezones() {
        assert_eq!(
            FeedTimezone::parse("Australia/Melbourne").unwrap(),
            FeedTimezone::Named(Melbourne)
        );
        assert_eq!(FeedTimezone::parse("0").unwrap(), FeedTimezone::Fixed(0));
        assert_eq!(FeedTimezone::parse(" 5.75 ").unwrap(), FeedTimezone::Fixed(345));
        assert!(FeedTimezone::parse("").is_err());
        assert!(FeedTimezone::parse("25").is_err());
        assert!(FeedTimezone::parse("NaN").is_err());
    }

    #[test]
    fn rejects_bad_check_hour() {
        let err = DayOffsetCache::new(FeedTimezone::Fixed(0), 24, 8).err();
        assert_eq!(err, Some(OffsetError::InvalidCheckHour(24)));
    }

    #[test]
    fn named_zone_follows_dst() {
        let cache = DayOffsetCache::new(FeedTimezone::Named(Melbourne), 3, 16).unwrap();
        // Southern hemisphere: daylight time in January, standard time in July.
        assert_eq!(cache.offset_hours(date(2025, 1, 10)), 11.0);
        assert_eq!(cache.offset_hours(date(2025, 7, 10)), 10.0);
    }

    #[test]
    fn check_hour_decides_transition_day() {
        // Berlin springs forward at 02:00 on 2026-03-29.
        let before = DayOffsetCache::new(FeedTimezone::Named(Berlin), 1, 16).unwrap();
        let after = DayOffsetCache::new(FeedTimezone::Named(Berlin), 12, 16).unwrap();
        assert_eq!(before.offset_hours(date(2026, 3, 29)), 1.0);
        assert_eq!(after.offset_hours(date(2026, 3, 29)), 2.0);
    }

    #[test]
    fn check_hour_in_gap_does_not_panic() {
        let cache = DayOffsetCache::new(FeedTimezone::Named(Berlin), 2, 16).unwrap();
        let offset = cache.offset_hours(date(2026, 3, 29));
        assert!(offset == 1.0 || offset == 2.0);
    }

    #[test]
    fn fixed_offset_bypasses_cache() {
        let cache = DayOffsetCache::new(FeedTimezone::Fixed(-210), 3, 4).unwrap();
        assert_eq!(cache.offset_hours(date(2025, 1, 1)), -3.5);
        assert!(cache.is_empty());
    }

    #[test]
    fn memoizes_per_date() {
        let cache = DayOffsetCache::new(FeedTimezone::Named(Berlin), 3, 16).unwrap();
        let first = cache.offset_hours(date(2026, 7, 1));
        let second = cache.offset_hours(date(2026, 7, 1));
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        cache.offset_hours(date(2026, 7, 2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_lookups_stay_bounded() {
        let cache = DayOffsetCache::new(FeedTimezone::Named(Berlin), 12, 4).unwrap();
        let threads = 8;

        std::thread::scope(|scope| {
            for t in 0..threads {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..200 {
                        let d = date(2026, 1, 1) + chrono::Duration::days((i * 7 + t) % 365);
                        let expected = compute_offset_hours(Berlin, d, 12);
                        assert_eq!(cache.offset_hours(d), expected);
                    }
                });
            }
        });

        assert!(cache.len() <= 4 + threads as u64);
    }

    #[test]
    fn overflow_clears_everything() {
        let cache = DayOffsetCache::new(FeedTimezone::Named(Berlin), 3, 3).unwrap();
        for day in 1..=3 {
            cache.offset_hours(date(2026, 1, day));
        }
        assert_eq!(cache.len(), 3);

        // The fourth date triggers a full clear before it is stored.
        cache.offset_hours(date(2026, 1, 4));
        assert_eq!(cache.len(), 1);

        // Previously cached dates are recomputed, not remembered.
        cache.offset_hours(date(2026, 1, 1));
        assert_eq!(cache.len(), 2);
    }
}
