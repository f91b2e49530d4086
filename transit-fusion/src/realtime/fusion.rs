//! Realtime fusion: overlaying live times onto scheduled trips.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{FusedTrip, RealtimeTrip, ScheduleStore, ServiceTime, StopTime};
use crate::offset::DayOffsetCache;

use super::error::FusionError;
use super::record::{StopTimeUpdateRecord, TripUpdateRecord};

/// Fuse realtime trip updates onto a schedule.
///
/// Every trip that one of `updates` refers to (through any of its identity
/// pairs) becomes a realtime trip for the update's start date; all other
/// trips are carried over untouched. Each malformed record or stop time
/// update is reported to `on_error` and skipped. The input schedule is not
/// modified; the result keeps its calendars, config hash, report and age.
///
/// If a feed carries several records for the same trip ID, the first wins.
pub fn apply_realtime(
    schedule: &ScheduleStore,
    updates: &[TripUpdateRecord],
    offsets: &DayOffsetCache,
    mut on_error: impl FnMut(FusionError),
) -> ScheduleStore {
    let mut by_trip_id: HashMap<&str, &TripUpdateRecord> = HashMap::with_capacity(updates.len());
    for record in updates {
        by_trip_id.entry(record.trip_id.as_str()).or_insert(record);
    }

    let trips = schedule
        .trips()
        .iter()
        .map(|fused| {
            let record = fused
                .trip()
                .id_pairs()
                .iter()
                .find_map(|pair| by_trip_id.get(pair.trip_id.as_str()));
            match record {
                Some(record) => fuse_trip(fused, record, offsets, &mut on_error),
                None => fused.clone(),
            }
        })
        .collect();

    schedule.with_trips(trips)
}

fn fuse_trip(
    fused: &FusedTrip,
    record: &TripUpdateRecord,
    offsets: &DayOffsetCache,
    on_error: &mut impl FnMut(FusionError),
) -> FusedTrip {
    let trip_id = &record.trip_id;

    let live_date = match parse_start_date(record) {
        Ok(date) => date,
        Err(e) => {
            on_error(e);
            return fused.clone();
        }
    };

    let trip = fused.trip();
    let offset_hours = offsets.offset_hours(live_date);
    let mut live_times: Vec<Option<StopTime>> = vec![None; trip.times().len()];

    for update in &record.stop_time_updates {
        match resolve_update(trip_id, update, trip, live_date, offset_hours) {
            Ok((index, stop_time)) => live_times[index] = Some(stop_time),
            Err(e) => on_error(e),
        }
    }

    match RealtimeTrip::new(trip.clone(), live_date, live_times, record.cancelled) {
        Ok(rt) => rt.into(),
        // Unreachable: live_times was sized from the trip itself.
        Err(_) => fused.clone(),
    }
}

fn parse_start_date(record: &TripUpdateRecord) -> Result<NaiveDate, FusionError> {
    let value = record
        .start_date
        .as_deref()
        .ok_or_else(|| FusionError::MissingStartDate {
            trip_id: record.trip_id.clone(),
        })?;

    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| FusionError::InvalidStartDate {
        trip_id: record.trip_id.clone(),
        value: value.to_string(),
    })
}

/// Maps one stop time update onto the trip's stop list.
fn resolve_update(
    trip_id: &str,
    update: &StopTimeUpdateRecord,
    trip: &crate::domain::Trip,
    live_date: NaiveDate,
    offset_hours: f64,
) -> Result<(usize, StopTime), FusionError> {
    let stop_sequence = update
        .stop_sequence
        .ok_or_else(|| FusionError::MissingStopSequence {
            trip_id: trip_id.to_string(),
        })?;

    let epoch_secs = update
        .effective_time()
        .ok_or_else(|| FusionError::MissingTime {
            trip_id: trip_id.to_string(),
            stop_sequence,
        })?;

    let index =
        trip.index_of_sequence(stop_sequence)
            .ok_or_else(|| FusionError::UnknownStopSequence {
                trip_id: trip_id.to_string(),
                stop_sequence,
            })?;

    let time = ServiceTime::from_instant(epoch_secs, live_date, offset_hours).ok_or_else(|| {
        FusionError::TimeOutOfRange {
            trip_id: trip_id.to_string(),
            stop_sequence,
            epoch_secs,
        }
    })?;

    Ok((index, StopTime::new(time, stop_sequence)))
}
