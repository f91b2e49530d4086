//! Resolving stopping patterns into concrete stop sequences.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{DirectionId, LineId, RouteId, StopId};

use super::{PartialPattern, PatternError, StopStatus, StoppingPattern};

/// One stop of a resolved pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStop {
    pub stop: StopId,
    /// Position in the canonical stop list
    pub index: usize,
    pub status: StopStatus,
}

/// Identifies a canonical stop list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopListKey {
    pub line: LineId,
    pub route: RouteId,
    pub direction: DirectionId,
}

impl StopListKey {
    pub fn new(line: LineId, route: RouteId, direction: DirectionId) -> Self {
        Self {
            line,
            route,
            direction,
        }
    }
}

/// Source of canonical stop lists.
pub trait StopLists {
    /// The ordered stops of a (line, route, direction), if known.
    fn stop_list(&self, line: &LineId, route: &RouteId, direction: &DirectionId)
    -> Option<&[StopId]>;
}

impl StopLists for HashMap<StopListKey, Vec<StopId>> {
    fn stop_list(
        &self,
        line: &LineId,
        route: &RouteId,
        direction: &DirectionId,
    ) -> Option<&[StopId]> {
        let key = StopListKey::new(line.clone(), route.clone(), direction.clone());
        self.get(&key).map(Vec::as_slice)
    }
}

/// Resolve a stopping pattern against its canonical stop list.
///
/// Complete patterns map directly. Partial patterns run from an inferred
/// origin to their terminus, and every stop strictly between the two is
/// served, express or unknown according to what the pattern knows.
/// `previous_terminus` is the last stop of the preceding stint when this
/// trip continues another one, and only matters for partial patterns.
///
/// Fails only when the pattern refers to stops beyond the end of the list.
///
/// # Examples
///
/// ```
/// use transit_fusion::domain::StopId;
/// use transit_fusion::pattern::{PartialPattern, StopStatus, resolve};
///
/// let stops: Vec<StopId> = ["A", "B", "C"].into_iter().map(StopId::from).collect();
/// let pattern = PartialPattern::new(None, 2).unwrap().with_express([1]);
///
/// let resolved = resolve(&pattern.into(), &stops, None).unwrap();
/// let statuses: Vec<_> = resolved.iter().map(|s| s.status).collect();
/// assert_eq!(statuses, [StopStatus::Served(None), StopStatus::Express, StopStatus::Served(None)]);
/// ```
pub fn resolve(
    pattern: &StoppingPattern,
    stop_list: &[StopId],
    previous_terminus: Option<&StopId>,
) -> Result<Vec<ResolvedStop>, PatternError> {
    let terminus = pattern.terminus();
    if terminus >= stop_list.len() {
        return Err(PatternError::IndexOutOfRange {
            index: terminus,
            len: stop_list.len(),
        });
    }

    let resolved = match pattern {
        StoppingPattern::Complete(complete) => complete
            .stops()
            .iter()
            .map(|entry| ResolvedStop {
                stop: stop_list[entry.index()].clone(),
                index: entry.index(),
                status: entry.status(),
            })
            .collect(),
        StoppingPattern::Partial(partial) => {
            let origin = infer_origin(partial, stop_list, previous_terminus);
            (origin..=terminus)
                .map(|index| ResolvedStop {
                    stop: stop_list[index].clone(),
                    index,
                    status: classify(partial, origin, index),
                })
                .collect()
        }
    };
    Ok(resolved)
}

/// Picks the origin index of a partial pattern.
///
/// 1. An explicitly known origin wins.
/// 2. Otherwise the lowest known served stop is a candidate.
/// 3. If the previous stint's terminus appears before our terminus, its
///    latest such occurrence is a candidate. The latest is chosen so that a
///    looped route is not extended backwards further than necessary.
/// 4. The earliest candidate wins, or the start of the list if there is none.
fn infer_origin(
    pattern: &PartialPattern,
    stop_list: &[StopId],
    previous_terminus: Option<&StopId>,
) -> usize {
    if let Some(origin) = pattern.origin() {
        return origin;
    }

    let terminus = pattern.terminus();
    let lowest_served = pattern.served().iter().copied().find(|&i| i <= terminus);
    let from_previous = previous_terminus
        .and_then(|prev| stop_list[..terminus].iter().rposition(|stop| stop == prev));

    match (lowest_served, from_previous) {
        (Some(served), Some(previous)) => served.min(previous),
        (served, previous) => served.or(previous).unwrap_or(0),
    }
}

fn classify(pattern: &PartialPattern, origin: usize, index: usize) -> StopStatus {
    if index == origin || index == pattern.terminus() || pattern.served().contains(&index) {
        StopStatus::Served(None)
    } else if pattern.express().contains(&index) {
        StopStatus::Express
    } else {
        StopStatus::Unknown
    }
}
