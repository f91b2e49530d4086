//! Decoded realtime trip updates.
//!
//! These are the feed-agnostic records that fusion consumes. GTFS-RT feed
//! messages are converted with [`records_from_feed`]; other sources can build
//! records directly.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// GTFS-RT `TripDescriptor.ScheduleRelationship.CANCELED`.
const TRIP_CANCELED: i32 = 3;

/// Live timing for one stop of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTimeUpdateRecord {
    pub stop_sequence: Option<u32>,
    /// Absolute arrival instant, seconds since the Unix epoch
    pub arrival: Option<i64>,
    /// Absolute departure instant, seconds since the Unix epoch
    pub departure: Option<i64>,
}

impl StopTimeUpdateRecord {
    /// The instant to use for this stop: departure if known, else arrival.
    pub fn effective_time(&self) -> Option<i64> {
        self.departure.or(self.arrival)
    }
}

/// Live data for one trip, keyed by its external trip ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripUpdateRecord {
    pub trip_id: String,
    /// Service date as published, normally `YYYYMMDD`
    pub start_date: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub stop_time_updates: Vec<StopTimeUpdateRecord>,
}

impl TripUpdateRecord {
    pub fn new(trip_id: impl Into<String>, start_date: Option<&str>) -> Self {
        Self {
            trip_id: trip_id.into(),
            start_date: start_date.map(str::to_string),
            cancelled: false,
            stop_time_updates: Vec::new(),
        }
    }

    pub fn with_update(mut self, update: StopTimeUpdateRecord) -> Self {
        self.stop_time_updates.push(update);
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }
}

/// Extract trip update records from a decoded GTFS-RT feed message.
///
/// Entities that are deleted, carry no trip update, or whose trip descriptor
/// has no trip ID are skipped. Stop time events that only carry a delay (no
/// absolute time) are treated as absent.
pub fn records_from_feed(feed: &gtfs_realtime::FeedMessage) -> Vec<TripUpdateRecord> {
    let mut records = Vec::new();

    for entity in &feed.entity {
        if entity.is_deleted == Some(true) {
            continue;
        }
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };
        let Some(trip_id) = &trip_update.trip.trip_id else {
            debug!(entity = %entity.id, "skipping trip update without trip ID");
            continue;
        };

        let stop_time_updates = trip_update
            .stop_time_update
            .iter()
            .map(|stu| StopTimeUpdateRecord {
                stop_sequence: stu.stop_sequence,
                arrival: stu.arrival.as_ref().and_then(|e| e.time),
                departure: stu.departure.as_ref().and_then(|e| e.time),
            })
            .collect();

        records.push(TripUpdateRecord {
            trip_id: trip_id.clone(),
            start_date: trip_update.trip.start_date.clone(),
            cancelled: trip_update.trip.schedule_relationship == Some(TRIP_CANCELED),
            stop_time_updates,
        });
    }

    debug!(
        entities = feed.entity.len(),
        records = records.len(),
        "decoded realtime feed"
    );
    records
}
