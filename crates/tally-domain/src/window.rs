//! Half-open time windows and calendar month keys used for aggregation.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::common::shift_months;

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// The month `count` months before this one.
    pub fn back(self, count: u32) -> Self {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 - i64::from(count);
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Half-open interval `[start, end)` over instants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// The calendar month containing `instant`.
    pub fn month_containing(instant: DateTime<Utc>) -> Option<Self> {
        Self::months(MonthKey::of(instant), 1)
    }

    /// The `count` calendar months immediately before the month containing
    /// `instant`, excluding that month itself.
    pub fn trailing_months(instant: DateTime<Utc>, count: u32) -> Option<Self> {
        if count == 0 {
            return None;
        }
        Self::months(MonthKey::of(instant).back(count), count)
    }

    /// `count` whole months starting at `first`.
    pub fn months(first: MonthKey, count: u32) -> Option<Self> {
        let start = first.first_day()?;
        let end = shift_months(start, count)?;
        Some(Self {
            start: midnight(start)?,
            end: midnight(end)?,
        })
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}
