//! Stitching continuation chains into one stop sequence.
//!
//! A vehicle often runs as several separately scheduled trips back to back:
//! it reaches a terminus and continues as a new trip, possibly on another
//! line. A passenger on the platform only cares about where the vehicle goes
//! from here. [`Continuified`] walks the chain of services, resolves each
//! stint's stopping pattern, joins them at their handover stops and trims the
//! result to the part that is relevant from the passenger's stop.
//!
//! Three views are kept:
//!
//! - `raw`: every stint's resolved stops concatenated.
//! - `all`: `raw` with the duplicated handover stop between stints removed.
//! - `relevant`: `all` from the perspective stop onwards, cut where the
//!   vehicle first comes back to a stop it has already called at.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{DirectionId, LineId, RouteId, StopId};
use crate::pattern::{PatternError, Service, StopLists, StopStatus, resolve};

/// Errors from building or querying a continuified stop sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContinuationError {
    #[error("no stop list for line {line}, route {route}, direction {direction}")]
    MissingStopList {
        line: LineId,
        route: RouteId,
        direction: DirectionId,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("stop sequence is empty")]
    Empty,

    /// A stop that must be served isn't. Indicates a bug upstream.
    #[error("{role} stop {stop} is not served")]
    NotServed { role: &'static str, stop: StopId },
}

/// One stop of a continuified sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinuifiedStop {
    pub stop: StopId,
    /// Position in the stint's canonical stop list
    pub index: usize,
    /// Position of the stint in the continuation chain, 0 for the initial service
    pub stint: usize,
    pub status: StopStatus,
}

/// A service and its continuations, resolved into stop sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Continuified {
    raw: Vec<ContinuifiedStop>,
    all: Vec<ContinuifiedStop>,
    relevant: Vec<ContinuifiedStop>,
}

impl Continuified {
    /// Resolve `service` and, if `continuations_enabled`, every service it
    /// continues as.
    ///
    /// A chain that revisits a service it has already walked through is cut
    /// there. Fails if a stint's stop list is unknown or its pattern doesn't
    /// fit the list.
    pub fn build(
        service: &Service,
        stop_lists: &impl StopLists,
        continuations_enabled: bool,
    ) -> Result<Self, ContinuationError> {
        let stints = walk_chain(service, continuations_enabled);

        let mut raw: Vec<ContinuifiedStop> = Vec::new();
        for (stint, s) in stints.iter().enumerate() {
            let stop_list = stop_lists
                .stop_list(&s.line, &s.route, &s.direction)
                .ok_or_else(|| ContinuationError::MissingStopList {
                    line: s.line.clone(),
                    route: s.route.clone(),
                    direction: s.direction.clone(),
                })?;

            // Only the previous stint's stops are candidates; `raw` may end in
            // an older stint if the previous one resolved to nothing.
            let previous_terminus = raw
                .last()
                .filter(|last| last.stint + 1 == stint)
                .map(|last| last.stop.clone());

            let resolved = resolve(&s.pattern, stop_list, previous_terminus.as_ref())?;
            raw.extend(resolved.into_iter().map(|r| ContinuifiedStop {
                stop: r.stop,
                index: r.index,
                stint,
                status: r.status,
            }));
        }

        let all = dedupe_handovers(&raw);
        let relevant = trim_relevant(&all, service.perspective_index);

        debug!(
            trip_id = %service.key.trip_id,
            stints = stints.len(),
            raw = raw.len(),
            relevant = relevant.len(),
            "continuified service"
        );

        Ok(Self { raw, all, relevant })
    }

    /// Every stint's stops, concatenated.
    pub fn raw(&self) -> &[ContinuifiedStop] {
        &self.raw
    }

    /// `raw` without duplicated handover stops.
    pub fn all(&self) -> &[ContinuifiedStop] {
        &self.all
    }

    /// The stops that matter from the perspective stop onwards.
    pub fn relevant(&self) -> &[ContinuifiedStop] {
        &self.relevant
    }

    /// The first stop of the initial service.
    pub fn origin(&self) -> Result<&ContinuifiedStop, ContinuationError> {
        self.raw.first().ok_or(ContinuationError::Empty)
    }

    /// The stop the passenger is viewing from. Must be served.
    pub fn perspective(&self) -> Result<&ContinuifiedStop, ContinuationError> {
        served("perspective", self.relevant.first())
    }

    /// Where the vehicle stops being relevant. Must be served.
    pub fn terminus(&self) -> Result<&ContinuifiedStop, ContinuationError> {
        served("terminus", self.relevant.last())
    }

    /// Does any stop come from a continuation of the initial service?
    pub fn has_continuation(&self) -> bool {
        self.raw.iter().any(|s| s.stint > 0)
    }
}

fn served<'a>(
    role: &'static str,
    entry: Option<&'a ContinuifiedStop>,
) -> Result<&'a ContinuifiedStop, ContinuationError> {
    let entry = entry.ok_or(ContinuationError::Empty)?;
    if entry.status.is_served() {
        Ok(entry)
    } else {
        Err(ContinuationError::NotServed {
            role,
            stop: entry.stop.clone(),
        })
    }
}

/// Collects the chain of services, stopping at the first repeated service.
fn walk_chain(service: &Service, continuations_enabled: bool) -> Vec<&Service> {
    let mut seen = HashSet::new();
    let mut stints = Vec::new();
    let mut current = Some(service);

    while let Some(s) = current {
        if !seen.insert(&s.key) {
            warn!(
                trip_id = %s.key.trip_id,
                date = %s.key.date,
                "continuation chain revisits a service, stopping"
            );
            break;
        }
        stints.push(s);
        if !continuations_enabled {
            break;
        }
        current = s.continuation.as_deref();
    }
    stints
}

/// Drops the second of two adjacent entries from different stints that name
/// the same stop.
fn dedupe_handovers(raw: &[ContinuifiedStop]) -> Vec<ContinuifiedStop> {
    let mut all: Vec<ContinuifiedStop> = Vec::with_capacity(raw.len());
    for entry in raw {
        let handover = all
            .last()
            .is_some_and(|prev| prev.stint != entry.stint && prev.stop == entry.stop);
        if !handover {
            all.push(entry.clone());
        }
    }
    all
}

/// Cuts `all` down to what a passenger at the perspective stop cares about.
///
/// Starts at the perspective index in stint 0, or the first stop of a later
/// stint if stint 0 doesn't reach it. Ends just before the first stop the
/// vehicle has already visited, dropping express stops immediately before
/// that point. Unknown stops count as visited but never end the sequence.
fn trim_relevant(all: &[ContinuifiedStop], perspective_index: usize) -> Vec<ContinuifiedStop> {
    let Some(start) = all
        .iter()
        .position(|s| (s.stint == 0 && s.index == perspective_index) || s.stint > 0)
    else {
        return Vec::new();
    };

    let mut seen: HashSet<&StopId> = HashSet::new();
    let mut cut = None;
    for (offset, entry) in all[start..].iter().enumerate() {
        let fresh = seen.insert(&entry.stop);
        if !fresh && !entry.status.is_unknown() {
            cut = Some(start + offset);
            break;
        }
    }

    let Some(end) = cut else {
        return all[start..].to_vec();
    };
    let mut relevant = all[start..end].to_vec();
    while relevant.last().is_some_and(|s| s.status.is_express()) {
        relevant.pop();
    }
    relevant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{
        CompletePattern, PartialPattern, PatternStop, ServiceKey, StopListKey, StoppingPattern,
    };
    use chrono::NaiveDate;
    use std::collections::HashMap;

    type Lists = HashMap<StopListKey, Vec<StopId>>;

    fn key(line: &str) -> StopListKey {
        StopListKey::new(LineId::new(line), RouteId::new("R1"), DirectionId::new("up"))
    }

    fn lists(entries: &[(&str, &[&str])]) -> Lists {
        entries
            .iter()
            .map(|(line, stops)| (key(line), stops.iter().map(|s| StopId::new(*s)).collect()))
            .collect()
    }

    /// A complete pattern; `true` entries are served, `false` express.
    fn complete(entries: &[(usize, bool)]) -> StoppingPattern {
        let stops = entries
            .iter()
            .map(|&(index, served)| {
                if served {
                    PatternStop::Served {
                        index,
                        detail: None,
                    }
                } else {
                    PatternStop::Express { index }
                }
            })
            .collect();
        CompletePattern::new(stops).unwrap().into()
    }

    fn service(trip_id: &str, line: &str, pattern: StoppingPattern, perspective: usize) -> Service {
        let k = key(line);
        Service::new(
            ServiceKey::new(trip_id, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()),
            k.line,
            k.route,
            k.direction,
            pattern,
            perspective,
        )
    }

    fn names(stops: &[ContinuifiedStop]) -> Vec<&str> {
        stops.iter().map(|s| s.stop.as_str()).collect()
    }

    #[test]
    fn handover_stop_appears_once() {
        let lists = lists(&[("L1", &["A", "B", "X"]), ("L2", &["X", "C", "D"])]);
        let second = service("T2", "L2", complete(&[(0, true), (1, true), (2, true)]), 0);
        let first = service("T1", "L1", complete(&[(0, true), (1, true), (2, true)]), 0)
            .with_continuation(second);

        let c = Continuified::build(&first, &lists, true).unwrap();

        assert_eq!(names(c.raw()), ["A", "B", "X", "X", "C", "D"]);
        assert_eq!(names(c.all()), ["A", "B", "X", "C", "D"]);
        assert_eq!(c.all().iter().filter(|s| s.stop.as_str() == "X").count(), 1);
        // The kept handover entry belongs to the ending stint.
        assert_eq!(c.all()[2].stint, 0);
        assert_eq!(names(c.relevant()), ["A", "B", "X", "C", "D"]);
        assert!(c.has_continuation());
        assert_eq!(c.terminus().unwrap().stop.as_str(), "D");
    }

    #[test]
    fn loop_back_is_cut_and_trailing_express_dropped() {
        let lists = lists(&[("L1", &["A", "B", "Y", "C"]), ("L2", &["C", "D", "E", "Y", "F"])]);
        let second = service(
            "T2",
            "L2",
            complete(&[(0, true), (1, true), (2, false), (3, true), (4, true)]),
            0,
        );
        let first = service("T1", "L1", complete(&[(0, true), (1, true), (2, true), (3, true)]), 0)
            .with_continuation(second);

        let c = Continuified::build(&first, &lists, true).unwrap();

        assert_eq!(names(c.all()), ["A", "B", "Y", "C", "D", "E", "Y", "F"]);
        assert_eq!(names(c.relevant()), ["A", "B", "Y", "C", "D"]);
        assert_eq!(c.perspective().unwrap().stop.as_str(), "A");
        assert_eq!(c.terminus().unwrap().stop.as_str(), "D");
    }

    #[test]
    fn relevant_starts_at_perspective() {
        let lists = lists(&[("L1", &["A", "B", "C", "D"])]);
        let s = service("T1", "L1", complete(&[(0, true), (1, true), (2, true), (3, true)]), 2);

        let c = Continuified::build(&s, &lists, true).unwrap();
        assert_eq!(names(c.relevant()), ["C", "D"]);
        assert_eq!(c.origin().unwrap().stop.as_str(), "A");
        assert_eq!(c.perspective().unwrap().stop.as_str(), "C");
        assert!(!c.has_continuation());
    }

    #[test]
    fn perspective_outside_first_stint_starts_at_continuation() {
        let lists = lists(&[("L1", &["A", "B", "C"]), ("L2", &["C", "D"])]);
        let second = service("T2", "L2", complete(&[(0, true), (1, true)]), 0);
        // Perspective at index 0, but stint 0 only runs from B.
        let first = service("T1", "L1", complete(&[(1, true), (2, true)]), 0).with_continuation(second);

        let c = Continuified::build(&first, &lists, true).unwrap();
        assert_eq!(names(c.relevant()), ["D"]);
    }

    #[test]
    fn unknown_stops_do_not_cut() {
        // Partial pattern: B is unknown and appears twice.
        let lists = lists(&[("L1", &["A", "B", "C", "B", "D"])]);
        let pattern = PartialPattern::new(Some(0), 4).unwrap().with_served([2]);
        let s = service("T1", "L1", pattern.into(), 0);

        let c = Continuified::build(&s, &lists, true).unwrap();
        assert_eq!(names(c.relevant()), ["A", "B", "C", "B", "D"]);
    }

    #[test]
    fn served_stop_after_unknown_visit_cuts() {
        let lists = lists(&[("L1", &["A", "B", "C", "B", "D"])]);
        let pattern = PartialPattern::new(Some(0), 4).unwrap().with_served([2, 3]);
        let s = service("T1", "L1", pattern.into(), 0);

        let c = Continuified::build(&s, &lists, true).unwrap();
        assert_eq!(names(c.relevant()), ["A", "B", "C"]);
    }

    #[test]
    fn partial_continuation_uses_previous_terminus() {
        let lists = lists(&[("L1", &["A", "B"]), ("L2", &["P", "Q", "B", "R", "S"])]);
        let second = service("T2", "L2", PartialPattern::new(None, 4).unwrap().into(), 0);
        let first = service("T1", "L1", complete(&[(0, true), (1, true)]), 0).with_continuation(second);

        let c = Continuified::build(&first, &lists, true).unwrap();
        assert_eq!(names(c.raw()), ["A", "B", "B", "R", "S"]);
        assert_eq!(names(c.all()), ["A", "B", "R", "S"]);
    }

    #[test]
    fn continuations_can_be_disabled() {
        let lists = lists(&[("L1", &["A", "X"]), ("L2", &["X", "C"])]);
        let second = service("T2", "L2", complete(&[(0, true), (1, true)]), 0);
        let first = service("T1", "L1", complete(&[(0, true), (1, true)]), 0).with_continuation(second);

        let c = Continuified::build(&first, &lists, false).unwrap();
        assert_eq!(names(c.all()), ["A", "X"]);
        assert!(!c.has_continuation());
    }

    #[test]
    fn repeated_service_stops_the_walk() {
        let lists = lists(&[("L1", &["A", "X"]), ("L2", &["X", "A"])]);
        let again = service("T1", "L1", complete(&[(0, true), (1, true)]), 0);
        let second = service("T2", "L2", complete(&[(0, true), (1, true)]), 0).with_continuation(again);
        let first = service("T1", "L1", complete(&[(0, true), (1, true)]), 0).with_continuation(second);

        let c = Continuified::build(&first, &lists, true).unwrap();
        assert_eq!(c.raw().iter().map(|s| s.stint).max(), Some(1));
        assert_eq!(names(c.all()), ["A", "X", "A"]);
        assert_eq!(names(c.relevant()), ["A", "X"]);
    }

    #[test]
    fn unserved_perspective_is_an_error() {
        let lists = lists(&[("L1", &["A", "B", "C"])]);
        let s = service("T1", "L1", complete(&[(0, true), (1, false), (2, true)]), 1);

        let c = Continuified::build(&s, &lists, true).unwrap();
        assert_eq!(
            c.perspective().unwrap_err(),
            ContinuationError::NotServed {
                role: "perspective",
                stop: StopId::new("B"),
            }
        );
        assert!(c.terminus().is_ok());
    }

    #[test]
    fn missing_stop_list_is_an_error() {
        let lists = lists(&[]);
        let s = service("T1", "L9", complete(&[(0, true)]), 0);
        let err = Continuified::build(&s, &lists, true).unwrap_err();
        assert!(matches!(err, ContinuationError::MissingStopList { .. }));
    }

    #[test]
    fn empty_relevant_when_perspective_unreachable() {
        let lists = lists(&[("L1", &["A", "B", "C"])]);
        let s = service("T1", "L1", complete(&[(1, true), (2, true)]), 0);

        let c = Continuified::build(&s, &lists, true).unwrap();
        assert!(c.relevant().is_empty());
        assert_eq!(c.perspective().unwrap_err(), ContinuationError::Empty);
    }

    #[test]
    fn error_display() {
        let err = ContinuationError::NotServed {
            role: "terminus",
            stop: StopId::new("S1"),
        };
        assert_eq!(err.to_string(), "terminus stop S1 is not served");
    }
}
