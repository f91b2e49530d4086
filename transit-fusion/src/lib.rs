//! Transit schedule fusion and stopping-pattern resolution.
//!
//! Static schedules from several subfeeds are merged into one immutable
//! [`domain::ScheduleStore`], realtime trip updates are fused onto it, and
//! the stops a vehicle will call at are resolved for a passenger standing at
//! a particular stop, following the vehicle through any trips it continues
//! as.

pub mod config;
pub mod continuation;
pub mod domain;
pub mod feeds;
pub mod offset;
pub mod pattern;
pub mod persist;
pub mod realtime;
pub mod refresh;
