//! HTTP clients for schedule and realtime feeds.
//!
//! Each subfeed's static schedule is parsed elsewhere and published as a
//! JSON snapshot of a `ScheduleStore`; [`SnapshotClient`] downloads one.
//! Realtime data comes as GTFS-RT protobuf; [`RealtimeClient`] downloads,
//! decodes and converts it to trip update records.

mod client;
mod error;

pub use client::{FeedClientConfig, RealtimeClient, SnapshotClient};
pub use error::FeedError;
