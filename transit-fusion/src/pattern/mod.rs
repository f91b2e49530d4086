//! Stopping patterns and their resolution against canonical stop lists.
//!
//! A stopping pattern says which stops of its (line, route, direction) stop
//! list a trip calls at. Sometimes we know this completely, from a full
//! timetable. Sometimes we only know the terminus and a handful of stops, and
//! the rest has to be inferred. Resolution turns either kind into a concrete
//! per-stop sequence, classifying every stop as served, express or unknown.

mod error;
mod resolve;
mod service;
mod stopping;

pub use error::PatternError;
pub use resolve::{ResolvedStop, StopListKey, StopLists, resolve};
pub use service::{Service, ServiceKey};
pub use stopping::{
    CompletePattern, PartialPattern, PatternStop, ServedDetail, StopStatus, StoppingPattern,
};
