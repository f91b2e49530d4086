//! Scheduled trips.
//!
//! A `Trip` is one scheduled run of a vehicle along a (line, route, direction)
//! stop list. Its per-stop times are indexed by position in that canonical
//! stop list; `None` means the trip does not call there (either the stop is
//! skipped or it lies outside the trip's range).
//!
//! Trips are values: every "modification" (tagging a subfeed, vetoing a
//! calendar, adding an identity pair) consumes the trip and returns a new one.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use seahash::SeaHasher;
use serde::{Deserialize, Serialize};

use super::{Calendar, CalendarId, DirectionId, DomainError, LineId, RouteId, ServiceTime, SubfeedId};

/// One way of referring to a trip: its external ID under one calendar.
///
/// `continuation_index` disambiguates repeated occurrences of the same
/// external ID within a calendar (e.g. a trip that loops and is published as
/// two halves with the same ID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripIdPair {
    pub trip_id: String,
    pub calendar: CalendarId,
    #[serde(default)]
    pub continuation_index: u32,
}

impl TripIdPair {
    /// Creates an identity pair for the first occurrence of a trip ID.
    pub fn new(trip_id: impl Into<String>, calendar: CalendarId) -> Self {
        Self {
            trip_id: trip_id.into(),
            calendar,
            continuation_index: 0,
        }
    }

    /// Sets the continuation index.
    pub fn with_continuation_index(mut self, index: u32) -> Self {
        self.continuation_index = index;
        self
    }
}

/// A timed call at one stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopTime {
    pub time: ServiceTime,
    /// The feed's stop sequence number, used to match realtime updates.
    pub sequence: u32,
}

impl StopTime {
    pub fn new(time: ServiceTime, sequence: u32) -> Self {
        Self { time, sequence }
    }
}

/// A scheduled trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TripParts", into = "TripParts")]
pub struct Trip {
    id_pairs: Vec<TripIdPair>,
    subfeed: Option<SubfeedId>,
    vetoed_calendars: BTreeSet<CalendarId>,
    line: LineId,
    route: RouteId,
    direction: DirectionId,
    times: Vec<Option<StopTime>>,
}

impl Trip {
    /// Creates a trip, checking that no two identity pairs collide.
    pub fn new(
        id_pairs: Vec<TripIdPair>,
        line: LineId,
        route: RouteId,
        direction: DirectionId,
        times: Vec<Option<StopTime>>,
    ) -> Result<Self, DomainError> {
        if id_pairs.is_empty() {
            return Err(DomainError::NoIdentity);
        }
        check_unique_pairs(&id_pairs)?;

        Ok(Self {
            id_pairs,
            subfeed: None,
            vetoed_calendars: BTreeSet::new(),
            line,
            route,
            direction,
            times,
        })
    }

    pub fn id_pairs(&self) -> &[TripIdPair] {
        &self.id_pairs
    }

    pub fn subfeed(&self) -> Option<&SubfeedId> {
        self.subfeed.as_ref()
    }

    pub fn vetoed_calendars(&self) -> &BTreeSet<CalendarId> {
        &self.vetoed_calendars
    }

    pub fn line(&self) -> &LineId {
        &self.line
    }

    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn direction(&self) -> &DirectionId {
        &self.direction
    }

    /// Per-stop scheduled times, indexed by canonical stop list position.
    pub fn times(&self) -> &[Option<StopTime>] {
        &self.times
    }

    /// Returns the scheduled time at a stop list index, if the trip calls there.
    pub fn time_at(&self, index: usize) -> Option<StopTime> {
        self.times.get(index).copied().flatten()
    }

    /// Index of the first stop this trip calls at.
    pub fn origin_index(&self) -> Option<usize> {
        self.times.iter().position(Option::is_some)
    }

    /// Index of the last stop this trip calls at.
    pub fn terminus_index(&self) -> Option<usize> {
        self.times.iter().rposition(Option::is_some)
    }

    /// Finds the stop list index carrying the given stop sequence number.
    pub fn index_of_sequence(&self, sequence: u32) -> Option<usize> {
        self.times
            .iter()
            .position(|t| t.is_some_and(|t| t.sequence == sequence))
    }

    /// Is this trip reachable through the given external trip ID?
    pub fn has_trip_id(&self, trip_id: &str) -> bool {
        self.id_pairs.iter().any(|p| p.trip_id == trip_id)
    }

    /// Returns a copy tagged with the subfeed it came from.
    pub fn with_subfeed(mut self, subfeed: SubfeedId) -> Self {
        self.subfeed = Some(subfeed);
        self
    }

    /// Returns a copy excluded from the given calendars.
    pub fn add_vetoed_calendars(mut self, calendars: impl IntoIterator<Item = CalendarId>) -> Self {
        self.vetoed_calendars.extend(calendars);
        self
    }

    /// Returns a copy reachable through one more identity pair.
    pub fn add_id_pair(mut self, pair: TripIdPair) -> Result<Self, DomainError> {
        self.id_pairs.push(pair);
        check_unique_pairs(&self.id_pairs)?;
        Ok(self)
    }

    /// Does this trip run on `date`?
    ///
    /// True when any identity pair's calendar runs on the date and that
    /// calendar is not vetoed. Calendars are matched within the trip's own
    /// subfeed, since calendar IDs are only unique per subfeed.
    pub fn runs_on(&self, date: NaiveDate, calendars: &[Calendar]) -> bool {
        self.id_pairs
            .iter()
            .filter(|p| !self.vetoed_calendars.contains(&p.calendar))
            .any(|p| {
                calendars
                    .iter()
                    .filter(|c| c.id == p.calendar && c.subfeed == self.subfeed)
                    .any(|c| c.runs_on(date))
            })
    }

    /// Digest of the trip's structure: line, route, direction and times.
    ///
    /// Identity pairs, subfeed and vetoes are excluded, so the same run
    /// published under two calendars hashes identically.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = SeaHasher::new();
        self.line.hash(&mut hasher);
        self.route.hash(&mut hasher);
        self.direction.hash(&mut hasher);
        self.times.hash(&mut hasher);
        hasher.finish()
    }
}

fn check_unique_pairs(pairs: &[TripIdPair]) -> Result<(), DomainError> {
    let mut seen = BTreeSet::new();
    for pair in pairs {
        let key = (&pair.calendar, &pair.trip_id, pair.continuation_index);
        if !seen.insert(key) {
            return Err(DomainError::DuplicateIdPair {
                trip_id: pair.trip_id.clone(),
                calendar: pair.calendar.clone(),
                continuation_index: pair.continuation_index,
            });
        }
    }
    Ok(())
}

/// Serialized form of a `Trip`, validated on the way back in.
#[derive(Serialize, Deserialize)]
struct TripParts {
    id_pairs: Vec<TripIdPair>,
    #[serde(default)]
    subfeed: Option<SubfeedId>,
    #[serde(default)]
    vetoed_calendars: BTreeSet<CalendarId>,
    line: LineId,
    route: RouteId,
    direction: DirectionId,
    times: Vec<Option<StopTime>>,
}

impl TryFrom<TripParts> for Trip {
    type Error = DomainError;

    fn try_from(parts: TripParts) -> Result<Self, Self::Error> {
        let trip = Trip::new(
            parts.id_pairs,
            parts.line,
            parts.route,
            parts.direction,
            parts.times,
        )?
        .add_vetoed_calendars(parts.vetoed_calendars);
        Ok(match parts.subfeed {
            Some(subfeed) => trip.with_subfeed(subfeed),
            None => trip,
        })
    }
}

impl From<Trip> for TripParts {
    fn from(trip: Trip) -> Self {
        Self {
            id_pairs: trip.id_pairs,
            subfeed: trip.subfeed,
            vetoed_calendars: trip.vetoed_calendars,
            line: trip.line,
            route: trip.route,
            direction: trip.direction,
            times: trip.times,
        }
    }
}
