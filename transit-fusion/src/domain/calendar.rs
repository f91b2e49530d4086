//! Service calendars.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{CalendarId, SubfeedId};

/// The set of dates on which trips referencing this calendar operate.
///
/// A date is in service when it falls within `start..=end` on one of the
/// flagged weekdays, or when it is listed as an addition. Exceptions always
/// win, so a date that is both added and excepted is not in service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    /// Subfeed this calendar came from, set during subfeed merge.
    #[serde(default)]
    pub subfeed: Option<SubfeedId>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Monday first.
    pub weekdays: [bool; 7],
    #[serde(default)]
    pub additions: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub exceptions: BTreeSet<NaiveDate>,
}

impl Calendar {
    /// Creates a calendar running on the given weekdays between two dates.
    pub fn new(id: CalendarId, start: NaiveDate, end: NaiveDate, weekdays: [bool; 7]) -> Self {
        Self {
            id,
            subfeed: None,
            start,
            end,
            weekdays,
            additions: BTreeSet::new(),
            exceptions: BTreeSet::new(),
        }
    }

    /// Adds a date on which the calendar runs regardless of the weekday rule.
    pub fn with_addition(mut self, date: NaiveDate) -> Self {
        self.additions.insert(date);
        self
    }

    /// Adds a date on which the calendar does not run.
    pub fn with_exception(mut self, date: NaiveDate) -> Self {
        self.exceptions.insert(date);
        self
    }

    /// Returns a copy tagged with the subfeed it came from.
    pub fn with_subfeed(mut self, subfeed: SubfeedId) -> Self {
        self.subfeed = Some(subfeed);
        self
    }

    /// Does this calendar operate on the given date?
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        if self.exceptions.contains(&date) {
            return false;
        }
        if self.additions.contains(&date) {
            return true;
        }
        let weekday = date.weekday().num_days_from_monday() as usize;
        date >= self.start && date <= self.end && self.weekdays[weekday]
    }
}
