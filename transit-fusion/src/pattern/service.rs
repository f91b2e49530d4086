//! Services: one trip on one date, seen from one stop.
//!
//! A `Service` is what the continuation merger works on. It carries a
//! stopping pattern over its (line, route, direction) stop list, the index
//! of the stop the passenger is looking from, and optionally the service the
//! same vehicle continues as once it reaches its terminus.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DirectionId, FusedTrip, LineId, RouteId};

use super::{CompletePattern, PatternError, PatternStop, ServedDetail, StoppingPattern};

/// Identity of a service: the external trip ID it runs as and its date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    pub trip_id: String,
    pub date: NaiveDate,
}

impl ServiceKey {
    pub fn new(trip_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            trip_id: trip_id.into(),
            date,
        }
    }
}

/// A trip running on a particular date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub key: ServiceKey,
    pub line: LineId,
    pub route: RouteId,
    pub direction: DirectionId,
    pub pattern: StoppingPattern,
    /// Stop list index of the stop the passenger is viewing from
    pub perspective_index: usize,
    pub cancelled: bool,
    /// The service this vehicle runs as next, if any
    pub continuation: Option<Box<Service>>,
}

impl Service {
    pub fn new(
        key: ServiceKey,
        line: LineId,
        route: RouteId,
        direction: DirectionId,
        pattern: StoppingPattern,
        perspective_index: usize,
    ) -> Self {
        Self {
            key,
            line,
            route,
            direction,
            pattern,
            perspective_index,
            cancelled: false,
            continuation: None,
        }
    }

    /// Builds a service from a fused trip on `date`.
    ///
    /// The trip's timetable gives a complete pattern from its first to its
    /// last served stop; stop list entries in between without a time are
    /// express. Live times and cancellation are taken from the realtime
    /// overlay only when it is for `date`.
    ///
    /// Fails if the trip doesn't call anywhere.
    pub fn from_trip(
        fused: &FusedTrip,
        date: NaiveDate,
        perspective_index: usize,
    ) -> Result<Self, PatternError> {
        let trip = fused.trip();
        let (Some(origin), Some(terminus)) = (trip.origin_index(), trip.terminus_index()) else {
            return Err(PatternError::Empty);
        };

        let stops = (origin..=terminus)
            .map(|index| match trip.time_at(index) {
                Some(stop_time) => PatternStop::Served {
                    index,
                    detail: Some(ServedDetail {
                        sequence: stop_time.sequence,
                        scheduled: stop_time.time,
                        live: fused.live_time_at(date, index).map(|live| live.time),
                    }),
                },
                None => PatternStop::Express { index },
            })
            .collect();
        let pattern = CompletePattern::new(stops)?;

        // Every trip has at least one identity pair.
        let trip_id = trip
            .id_pairs()
            .first()
            .map(|p| p.trip_id.clone())
            .unwrap_or_default();

        Ok(Self {
            key: ServiceKey::new(trip_id, date),
            line: trip.line().clone(),
            route: trip.route().clone(),
            direction: trip.direction().clone(),
            pattern: pattern.into(),
            perspective_index,
            cancelled: fused.is_cancelled_on(date),
            continuation: None,
        })
    }

    /// Sets the service this one continues as.
    pub fn with_continuation(mut self, next: Service) -> Self {
        self.continuation = Some(Box::new(next));
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }
}
