//! Complete and partial stopping patterns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::ServiceTime;

use super::PatternError;

/// Timing for a stop the trip is known to call at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedDetail {
    pub sequence: u32,
    pub scheduled: ServiceTime,
    /// Live time, if a realtime overlay covers this stop on the service date
    pub live: Option<ServiceTime>,
}

impl ServedDetail {
    /// The best known time: live if available, else scheduled.
    pub fn expected(&self) -> ServiceTime {
        self.live.unwrap_or(self.scheduled)
    }
}

/// How a trip treats one stop of its stop list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StopStatus {
    /// The trip calls here. Detail is present when timing is known.
    Served(Option<ServedDetail>),
    /// The trip passes through without calling.
    Express,
    /// The trip's behaviour here isn't known.
    Unknown,
}

impl StopStatus {
    pub fn is_served(&self) -> bool {
        matches!(self, StopStatus::Served(_))
    }

    pub fn is_express(&self) -> bool {
        matches!(self, StopStatus::Express)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, StopStatus::Unknown)
    }
}

/// One entry of a complete pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternStop {
    Served {
        index: usize,
        detail: Option<ServedDetail>,
    },
    Express {
        index: usize,
    },
}

impl PatternStop {
    /// Position in the canonical stop list.
    pub fn index(&self) -> usize {
        match self {
            PatternStop::Served { index, .. } | PatternStop::Express { index } => *index,
        }
    }

    pub fn status(&self) -> StopStatus {
        match self {
            PatternStop::Served { detail, .. } => StopStatus::Served(*detail),
            PatternStop::Express { .. } => StopStatus::Express,
        }
    }
}

/// Every stop from origin to terminus, each served or express.
///
/// Invariants, checked at construction: at least one stop, strictly
/// increasing stop list indices, and served stops at both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PatternStop>", into = "Vec<PatternStop>")]
pub struct CompletePattern {
    stops: Vec<PatternStop>,
}

impl CompletePattern {
    pub fn new(stops: Vec<PatternStop>) -> Result<Self, PatternError> {
        let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
            return Err(PatternError::Empty);
        };
        for end in [first, last] {
            if let PatternStop::Express { index } = end {
                return Err(PatternError::ExpressEnd { index: *index });
            }
        }
        for pair in stops.windows(2) {
            if pair[1].index() <= pair[0].index() {
                return Err(PatternError::NotIncreasing {
                    index: pair[1].index(),
                });
            }
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[PatternStop] {
        &self.stops
    }

    pub fn origin(&self) -> usize {
        self.stops.first().map_or(0, PatternStop::index)
    }

    pub fn terminus(&self) -> usize {
        self.stops.last().map_or(0, PatternStop::index)
    }
}

impl TryFrom<Vec<PatternStop>> for CompletePattern {
    type Error = PatternError;

    fn try_from(stops: Vec<PatternStop>) -> Result<Self, Self::Error> {
        Self::new(stops)
    }
}

impl From<CompletePattern> for Vec<PatternStop> {
    fn from(pattern: CompletePattern) -> Self {
        pattern.stops
    }
}

/// A pattern known only in part: the terminus, maybe the origin, and some
/// stops known to be served or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialPattern {
    origin: Option<usize>,
    terminus: usize,
    served: BTreeSet<usize>,
    express: BTreeSet<usize>,
}

impl PartialPattern {
    /// Creates a pattern with no stops known beyond its ends.
    pub fn new(origin: Option<usize>, terminus: usize) -> Result<Self, PatternError> {
        if let Some(origin) = origin.filter(|&o| o > terminus) {
            return Err(PatternError::OriginAfterTerminus { origin, terminus });
        }
        Ok(Self {
            origin,
            terminus,
            served: BTreeSet::new(),
            express: BTreeSet::new(),
        })
    }

    /// Marks stops as known to be served.
    pub fn with_served(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.served.extend(indices);
        self
    }

    /// Marks stops as known to be skipped.
    pub fn with_express(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.express.extend(indices);
        self
    }

    pub fn origin(&self) -> Option<usize> {
        self.origin
    }

    pub fn terminus(&self) -> usize {
        self.terminus
    }

    pub fn served(&self) -> &BTreeSet<usize> {
        &self.served
    }

    pub fn express(&self) -> &BTreeSet<usize> {
        &self.express
    }
}

/// What is known about which stops a trip calls at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoppingPattern {
    Complete(CompletePattern),
    Partial(PartialPattern),
}

impl StoppingPattern {
    /// Stop list index of the terminus.
    pub fn terminus(&self) -> usize {
        match self {
            StoppingPattern::Complete(p) => p.terminus(),
            StoppingPattern::Partial(p) => p.terminus(),
        }
    }
}

impl From<CompletePattern> for StoppingPattern {
    fn from(pattern: CompletePattern) -> Self {
        StoppingPattern::Complete(pattern)
    }
}

impl From<PartialPattern> for StoppingPattern {
    fn from(pattern: PartialPattern) -> Self {
        StoppingPattern::Partial(pattern)
    }
}
