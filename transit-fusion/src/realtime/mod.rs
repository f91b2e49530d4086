//! Realtime trip updates and their fusion onto the schedule.
//!
//! Realtime feeds report, per external trip ID, the live time at some of the
//! trip's stops as absolute instants. Fusion matches these records to
//! scheduled trips and converts the instants back into the trip's timetable
//! frame, producing a new `ScheduleStore` in which matched trips carry a
//! realtime overlay.
//!
//! Malformed records never fail the whole operation: each problem is handed
//! to the caller's error callback and fusion carries on with everything else.

mod error;
mod fusion;
mod record;

pub use error::FusionError;
pub use fusion::apply_realtime;
pub use record::{StopTimeUpdateRecord, TripUpdateRecord, records_from_feed};
