//! The fused schedule store and subfeed merge.
//!
//! A `ScheduleStore` is an immutable snapshot: refreshes and realtime updates
//! build a new store rather than editing one that readers may be holding.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Calendar, CalendarId, FusedTrip, MergeError, SubfeedId};

/// Diagnostics collected while parsing feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingReport {
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ParsingReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every message with the subfeed it came from.
    pub fn tagged(self, subfeed: &SubfeedId) -> Self {
        let tag = |m: String| format!("[{subfeed}] {m}");
        Self {
            warnings: self.warnings.into_iter().map(tag).collect(),
            errors: self.errors.into_iter().map(tag).collect(),
        }
    }

    /// Appends another report's messages.
    pub fn merge(&mut self, other: ParsingReport) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

/// All trips and calendars of one logical schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStore {
    calendars: Vec<Calendar>,
    trips: Vec<FusedTrip>,
    config_hash: String,
    report: ParsingReport,
    /// Fetch time of the stalest contributing feed.
    age: DateTime<Utc>,
}

impl ScheduleStore {
    pub fn new(
        calendars: Vec<Calendar>,
        trips: Vec<FusedTrip>,
        config_hash: impl Into<String>,
        report: ParsingReport,
        age: DateTime<Utc>,
    ) -> Self {
        Self {
            calendars,
            trips,
            config_hash: config_hash.into(),
            report,
            age,
        }
    }

    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    pub fn trips(&self) -> &[FusedTrip] {
        &self.trips
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn report(&self) -> &ParsingReport {
        &self.report
    }

    pub fn age(&self) -> DateTime<Utc> {
        self.age
    }

    /// Returns a new store with the same provenance but different trips.
    pub fn with_trips(&self, trips: Vec<FusedTrip>) -> Self {
        Self {
            calendars: self.calendars.clone(),
            trips,
            config_hash: self.config_hash.clone(),
            report: self.report.clone(),
            age: self.age,
        }
    }

    /// Looks up a calendar by ID within a subfeed.
    pub fn calendar(&self, subfeed: Option<&SubfeedId>, id: &CalendarId) -> Option<&Calendar> {
        self.calendars
            .iter()
            .find(|c| &c.id == id && c.subfeed.as_ref() == subfeed)
    }

    /// Trips reachable through the given external trip ID.
    pub fn find_by_trip_id<'a>(&'a self, trip_id: &'a str) -> impl Iterator<Item = &'a FusedTrip> {
        self.trips.iter().filter(move |t| t.trip().has_trip_id(trip_id))
    }

    /// Trips operating on `date`.
    pub fn trips_running_on(&self, date: NaiveDate) -> impl Iterator<Item = &FusedTrip> {
        self.trips
            .iter()
            .filter(move |t| t.trip().runs_on(date, &self.calendars))
    }

    /// Is the schedule at least `threshold` old at `now`?
    ///
    /// A threshold reaching past the representable range is never met when
    /// positive and always met when negative.
    pub fn is_old_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match now.checked_sub_signed(threshold) {
            Some(cutoff) => self.age <= cutoff,
            None => threshold < Duration::zero(),
        }
    }

    /// Is the schedule at least `threshold_secs` seconds old?
    pub fn is_old(&self, threshold_secs: i64) -> bool {
        match Duration::try_seconds(threshold_secs) {
            Some(threshold) => self.is_old_at(Utc::now(), threshold),
            None => threshold_secs < 0,
        }
    }

    /// Merges independently parsed subfeeds into one schedule.
    ///
    /// Every calendar and trip is tagged with its subfeed. The merged age is
    /// the oldest input age, because the merged schedule is only as fresh as
    /// its stalest part. Fails without producing anything if the inputs are
    /// empty, the ID count differs, an ID repeats, or config hashes differ.
    pub fn merge(
        feeds: Vec<ScheduleStore>,
        subfeed_ids: &[SubfeedId],
    ) -> Result<ScheduleStore, MergeError> {
        let first = feeds.first().ok_or(MergeError::NoFeeds)?;
        if feeds.len() != subfeed_ids.len() {
            return Err(MergeError::CountMismatch {
                feeds: feeds.len(),
                subfeeds: subfeed_ids.len(),
            });
        }

        let mut seen = HashSet::new();
        for id in subfeed_ids {
            if !seen.insert(id) {
                return Err(MergeError::DuplicateSubfeed(id.clone()));
            }
        }

        let config_hash = first.config_hash.clone();
        for (feed, id) in feeds.iter().zip(subfeed_ids) {
            if feed.config_hash != config_hash {
                return Err(MergeError::ConfigHashMismatch {
                    subfeed: id.clone(),
                    expected: config_hash,
                    found: feed.config_hash.clone(),
                });
            }
        }

        let mut age = first.age;
        let mut calendars = Vec::new();
        let mut trips = Vec::new();
        let mut report = ParsingReport::new();

        for (feed, id) in feeds.into_iter().zip(subfeed_ids) {
            age = age.min(feed.age);
            calendars.extend(
                feed.calendars
                    .into_iter()
                    .map(|c| c.with_subfeed(id.clone())),
            );
            trips.extend(feed.trips.into_iter().map(|t| tag_trip(t, id)));
            report.merge(feed.report.tagged(id));
        }

        Ok(ScheduleStore {
            calendars,
            trips,
            config_hash,
            report,
            age,
        })
    }
}

fn tag_trip(trip: FusedTrip, subfeed: &SubfeedId) -> FusedTrip {
    match trip {
        FusedTrip::Scheduled(trip) => FusedTrip::Scheduled(trip.with_subfeed(subfeed.clone())),
        FusedTrip::Realtime(rt) => {
            // Realtime overlays never survive a re-merge; the next realtime
            // cycle fuses against the fresh schedule.
            FusedTrip::Scheduled(rt.trip().clone().with_subfeed(subfeed.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn store(hash: &str, age_secs: i64, trip_count: usize) -> ScheduleStore {
        let trips: Vec<FusedTrip> = (0..trip_count)
            .map(|i| {
                make_trip(&format!("T{i}"), "weekday", &[Some("08:00:00"), Some("08:05:00")])
                    .into()
            })
            .collect();
        let calendar = Calendar::new(
            CalendarId::new("weekday"),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            [true; 7],
        );
        ScheduleStore::new(vec![calendar], trips, hash, ParsingReport::new(), at(age_secs))
    }

    fn ids(names: &[&str]) -> Vec<SubfeedId> {
        names.iter().map(|n| SubfeedId::new(*n)).collect()
    }

    #[test]
    fn merge_concatenates_and_tags() {
        let merged =
            ScheduleStore::merge(vec![store("h", 100, 2), store("h", 200, 3)], &ids(&["a", "b"]))
                .unwrap();

        assert_eq!(merged.trips().len(), 5);
        assert_eq!(merged.calendars().len(), 2);
        assert_eq!(merged.config_hash(), "h");

        let subfeeds: Vec<_> = merged
            .trips()
            .iter()
            .map(|t| t.trip().subfeed().unwrap().as_str())
            .collect();
        assert_eq!(subfeeds, ["a", "a", "b", "b", "b"]);
        assert_eq!(merged.calendars()[1].subfeed, Some(SubfeedId::new("b")));
    }

    #[test]
    fn merge_takes_oldest_age_regardless_of_order() {
        let forward =
            ScheduleStore::merge(vec![store("h", 100, 1), store("h", 50, 1)], &ids(&["a", "b"]))
                .unwrap();
        let backward =
            ScheduleStore::merge(vec![store("h", 50, 1), store("h", 100, 1)], &ids(&["a", "b"]))
                .unwrap();
        assert_eq!(forward.age(), at(50));
        assert_eq!(backward.age(), at(50));
    }

    #[test]
    fn merge_rejects_empty() {
        assert_eq!(
            ScheduleStore::merge(vec![], &[]).unwrap_err(),
            MergeError::NoFeeds
        );
    }

    #[test]
    fn merge_rejects_count_mismatch() {
        let err = ScheduleStore::merge(vec![store("h", 0, 1)], &ids(&["a", "b"])).unwrap_err();
        assert_eq!(
            err,
            MergeError::CountMismatch {
                feeds: 1,
                subfeeds: 2
            }
        );
    }

    #[test]
    fn merge_rejects_duplicate_subfeed() {
        let err = ScheduleStore::merge(vec![store("h", 0, 1), store("h", 0, 1)], &ids(&["a", "a"]))
            .unwrap_err();
        assert_eq!(err, MergeError::DuplicateSubfeed(SubfeedId::new("a")));
    }

    #[test]
    fn merge_rejects_config_hash_mismatch() {
        let err = ScheduleStore::merge(
            vec![store("h", 0, 1), store("h", 0, 1), store("other", 0, 1)],
            &ids(&["a", "b", "c"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MergeError::ConfigHashMismatch { ref subfeed, .. } if subfeed.as_str() == "c"
        ));
    }

    #[test]
    fn merge_tags_reports() {
        let mut a = store("h", 0, 0);
        a.report.warnings.push("stop S9 has no name".into());
        let mut b = store("h", 0, 0);
        b.report.errors.push("bad row 12".into());

        let merged = ScheduleStore::merge(vec![a, b], &ids(&["metro", "regional"])).unwrap();
        assert_eq!(merged.report().warnings, ["[metro] stop S9 has no name"]);
        assert_eq!(merged.report().errors, ["[regional] bad row 12"]);
    }

    #[test]
    fn is_old_boundary() {
        let s = store("h", 1_000, 0);
        let threshold = Duration::seconds(60);
        assert!(!s.is_old_at(at(1_059), threshold));
        assert!(s.is_old_at(at(1_060), threshold));
        assert!(s.is_old_at(at(2_000), threshold));
    }

    #[test]
    fn is_old_extreme_thresholds() {
        let s = store("h", 1_000, 0);
        assert!(!s.is_old(i64::MAX));
        assert!(s.is_old(i64::MIN));
        assert!(s.is_old(0));

        let huge = Duration::seconds(i64::MAX / 1_000);
        assert!(!s.is_old_at(at(2_000), huge));
        assert!(s.is_old_at(at(2_000), -huge));
    }

    #[test]
    fn lookups() {
        let merged = ScheduleStore::merge(vec![store("h", 0, 2)], &ids(&["metro"])).unwrap();

        assert_eq!(merged.find_by_trip_id("T1").count(), 1);
        assert_eq!(merged.find_by_trip_id("nope").count(), 0);

        let friday = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(merged.trips_running_on(friday).count(), 2);
        let next_year = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(merged.trips_running_on(next_year).count(), 0);

        let metro = SubfeedId::new("metro");
        assert!(merged.calendar(Some(&metro), &CalendarId::new("weekday")).is_some());
        assert!(merged.calendar(None, &CalendarId::new("weekday")).is_none());
    }
}
