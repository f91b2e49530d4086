//! Realtime fusion error types.

/// A problem with one realtime record. Always recoverable: the offending
/// update (or the whole trip update) is skipped and fusion continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FusionError {
    #[error("trip {trip_id}: update has no start date")]
    MissingStartDate { trip_id: String },

    #[error("trip {trip_id}: start date {value:?} is not YYYYMMDD")]
    InvalidStartDate { trip_id: String, value: String },

    #[error("trip {trip_id}: stop sequence {stop_sequence} has neither arrival nor departure time")]
    MissingTime { trip_id: String, stop_sequence: u32 },

    #[error("trip {trip_id}: stop time update has no stop sequence")]
    MissingStopSequence { trip_id: String },

    #[error("trip {trip_id}: no scheduled stop with sequence {stop_sequence}")]
    UnknownStopSequence { trip_id: String, stop_sequence: u32 },

    #[error("trip {trip_id}: time {epoch_secs} at sequence {stop_sequence} is out of range")]
    TimeOutOfRange {
        trip_id: String,
        stop_sequence: u32,
        epoch_secs: i64,
    },
}
