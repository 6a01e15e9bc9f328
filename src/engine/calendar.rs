//! Exclusion calendars
//!
//! A trigger that names a calendar never fires on a moment the calendar
//! excludes. Calendars are registered with the engine by name.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Calendar excluding whole days, by date or by weekday (UTC)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Specific excluded days
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_dates: BTreeSet<NaiveDate>,

    /// Excluded days of the week
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub excluded_weekdays: HashSet<Weekday>,
}

impl Calendar {
    /// A calendar that excludes nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Exclude a single date
    pub fn exclude_date(mut self, date: NaiveDate) -> Self {
        self.excluded_dates.insert(date);
        self
    }

    /// Exclude every occurrence of a weekday
    pub fn exclude_weekday(mut self, weekday: Weekday) -> Self {
        self.excluded_weekdays.insert(weekday);
        self
    }

    /// Whether a trigger may fire at `time`
    pub fn is_time_included(&self, time: DateTime<Utc>) -> bool {
        let date = time.date_naive();
        !self.excluded_dates.contains(&date) && !self.excluded_weekdays.contains(&date.weekday())
    }

    /// Whether every day is excluded
    pub fn excludes_everything(&self) -> bool {
        self.excluded_weekdays.len() == 7
    }
}
