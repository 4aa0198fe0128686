//! ISO week partition keys.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// An ISO-8601 year/week pair. Ordering is chronological.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IsoWeekKey {
    /// ISO week-numbering year.
    pub year: i32,
    /// ISO week number (1..=53).
    pub week: u32,
}

impl IsoWeekKey {
    /// Build a key without validation.
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Build a key, rejecting weeks the year does not have.
    pub fn checked(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|_| Self { year, week })
    }

    /// Week containing `ts` (UTC).
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        let iso = ts.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Week containing the current instant.
    pub fn current() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Monday of this week.
    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }

    /// Sunday of this week.
    pub fn sunday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Sun)
    }

    /// The preceding week, crossing year boundaries.
    pub fn previous(&self) -> Self {
        match self.monday() {
            Some(monday) => {
                let iso = (monday - Duration::days(7)).iso_week();
                Self::new(iso.year(), iso.week())
            }
            None => Self::new(self.year, self.week.saturating_sub(1)),
        }
    }

    /// Partition file name, e.g. `events-2024-W05.jsonl`.
    pub fn file_name(&self) -> String {
        format!("events-{}-W{:02}.jsonl", self.year, self.week)
    }

    /// Parse a partition file name produced by [`Self::file_name`].
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("events-")?.strip_suffix(".jsonl")?;
        let (year, week) = stem.split_once("-W")?;
        Some(Self::new(year.parse().ok()?, week.parse().ok()?))
    }

    /// `"Mar 04–Mar 10, 2024"`.
    pub fn date_range(&self) -> String {
        match (self.monday(), self.sunday()) {
            (Some(start), Some(end)) => format!(
                "{}–{}",
                start.format("%b %d"),
                end.format("%b %d, %Y")
            ),
            _ => String::from("?"),
        }
    }
}

impl fmt::Display for IsoWeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}
