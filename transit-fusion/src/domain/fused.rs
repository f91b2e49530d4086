//! Trips with an optional realtime overlay.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DomainError, StopTime, Trip};

/// A scheduled trip plus live data for one service date.
///
/// Live times are indexed exactly like the trip's scheduled times. They are
/// only authoritative on `live_date`; every other date falls back to the
/// schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeTrip {
    trip: Trip,
    live_date: NaiveDate,
    live_times: Vec<Option<StopTime>>,
    cancelled: bool,
}

impl RealtimeTrip {
    /// Attaches a realtime overlay to a trip.
    pub fn new(
        trip: Trip,
        live_date: NaiveDate,
        live_times: Vec<Option<StopTime>>,
        cancelled: bool,
    ) -> Result<Self, DomainError> {
        if live_times.len() != trip.times().len() {
            return Err(DomainError::LiveTimesLength {
                expected: trip.times().len(),
                found: live_times.len(),
            });
        }
        Ok(Self {
            trip,
            live_date,
            live_times,
            cancelled,
        })
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn live_date(&self) -> NaiveDate {
        self.live_date
    }

    pub fn live_times(&self) -> &[Option<StopTime>] {
        &self.live_times
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// A trip as held in a schedule store: either purely scheduled or carrying
/// a realtime overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FusedTrip {
    Scheduled(Trip),
    Realtime(RealtimeTrip),
}

impl FusedTrip {
    /// The underlying scheduled trip.
    pub fn trip(&self) -> &Trip {
        match self {
            FusedTrip::Scheduled(trip) => trip,
            FusedTrip::Realtime(rt) => rt.trip(),
        }
    }

    /// Live times for `date`, if the overlay applies to that date.
    pub fn live_times_on(&self, date: NaiveDate) -> Option<&[Option<StopTime>]> {
        match self {
            FusedTrip::Scheduled(_) => None,
            FusedTrip::Realtime(rt) if rt.live_date == date => Some(rt.live_times()),
            FusedTrip::Realtime(_) => None,
        }
    }

    /// Live time at a stop list index on `date`, if known.
    pub fn live_time_at(&self, date: NaiveDate, index: usize) -> Option<StopTime> {
        self.live_times_on(date)
            .and_then(|times| times.get(index).copied().flatten())
    }

    /// Is this trip cancelled on `date`? Only the live date can be cancelled.
    pub fn is_cancelled_on(&self, date: NaiveDate) -> bool {
        match self {
            FusedTrip::Scheduled(_) => false,
            FusedTrip::Realtime(rt) => rt.live_date == date && rt.cancelled,
        }
    }
}

impl From<Trip> for FusedTrip {
    fn from(trip: Trip) -> Self {
        FusedTrip::Scheduled(trip)
    }
}

impl From<RealtimeTrip> for FusedTrip {
    fn from(trip: RealtimeTrip) -> Self {
        FusedTrip::Realtime(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn overlay(cancelled: bool) -> RealtimeTrip {
        let trip = make_trip("T1", "weekday", &[Some("08:00:00"), Some("08:05:00")]);
        let live = vec![None, Some(StopTime::new(time("08:07:00"), 2))];
        RealtimeTrip::new(trip, date(2025, 3, 14), live, cancelled).unwrap()
    }

    #[test]
    fn rejects_misaligned_live_times() {
        let trip = make_trip("T1", "weekday", &[Some("08:00:00"), Some("08:05:00")]);
        let err = RealtimeTrip::new(trip, date(2025, 3, 14), vec![None], false).unwrap_err();
        assert_eq!(
            err,
            DomainError::LiveTimesLength {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn live_data_only_on_live_date() {
        let fused = FusedTrip::from(overlay(false));

        let live = fused.live_time_at(date(2025, 3, 14), 1).unwrap();
        assert_eq!(live.time, time("08:07:00"));
        assert!(fused.live_time_at(date(2025, 3, 14), 0).is_none());

        assert!(fused.live_times_on(date(2025, 3, 15)).is_none());
        assert!(fused.live_time_at(date(2025, 3, 15), 1).is_none());
    }

    #[test]
    fn cancellation_only_on_live_date() {
        let fused = FusedTrip::from(overlay(true));
        assert!(fused.is_cancelled_on(date(2025, 3, 14)));
        assert!(!fused.is_cancelled_on(date(2025, 3, 15)));

        let scheduled = FusedTrip::from(fused.trip().clone());
        assert!(!scheduled.is_cancelled_on(date(2025, 3, 14)));
    }

    #[test]
    fn serde_tags_variant() {
        let fused = FusedTrip::from(overlay(false));
        let json = serde_json::to_value(&fused).unwrap();
        assert_eq!(json["kind"], "realtime");

        let parsed: FusedTrip = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, fused);
    }
}
