//! Domain types for the schedule fusion engine.
//!
//! This module contains the schedule model: identifiers, timetable times,
//! calendars, trips (with and without realtime overlays) and the fused
//! schedule store. Types enforce their invariants at construction time, so
//! code that receives them can trust their validity.

mod calendar;
mod error;
mod fused;
mod ids;
mod schedule;
mod time;
mod trip;

pub use calendar::Calendar;
pub use error::{DomainError, MergeError};
pub use fused::{FusedTrip, RealtimeTrip};
pub use ids::{CalendarId, DirectionId, LineId, RouteId, StopId, SubfeedId};
pub use schedule::{ParsingReport, ScheduleStore};
pub use time::{ServiceTime, TimeError};
pub use trip::{StopTime, Trip, TripIdPair};

#[cfg(test)]
pub(crate) use trip::fixtures;
