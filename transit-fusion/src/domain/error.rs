//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the schedule model. They are distinct from network/IO errors.

use super::{CalendarId, SubfeedId};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A trip must be reachable through at least one identity pair
    #[error("trip has no identity pairs")]
    NoIdentity,

    /// Two identity pairs collide under the same calendar
    #[error(
        "duplicate identity pair: trip {trip_id} occurrence {continuation_index} under calendar {calendar}"
    )]
    DuplicateIdPair {
        trip_id: String,
        calendar: CalendarId,
        continuation_index: u32,
    },

    /// Live times must line up with scheduled times
    #[error("live times have {found} entries, scheduled times have {expected}")]
    LiveTimesLength { expected: usize, found: usize },
}

/// Reasons a subfeed merge is rejected.
///
/// All of these are configuration mismatches: the caller must not publish a
/// partial result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("no feeds to merge")]
    NoFeeds,

    #[error("{feeds} feeds but {subfeeds} subfeed IDs")]
    CountMismatch { feeds: usize, subfeeds: usize },

    #[error("subfeed {0} listed more than once")]
    DuplicateSubfeed(SubfeedId),

    #[error("config hash mismatch: subfeed {subfeed} has {found}, expected {expected}")]
    ConfigHashMismatch {
        subfeed: SubfeedId,
        expected: String,
        found: String,
    },
}
