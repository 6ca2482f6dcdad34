//! Shared identifiers, the recurrence cadence enum and calendar arithmetic.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a ledger entry. Assigned by the ledger store, never reused.
pub type TransactionId = u64;

/// Identifier of a recurring template. Assigned by the template store.
pub type TemplateId = u64;

/// Owner of a ledger and its templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of money for a ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
        };
        f.write_str(label)
    }
}

/// Cadence of a recurring template.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Moves `from` forward by `steps` periods, keeping the time of day.
    ///
    /// Month and year steps clamp the day of month to the last valid day of the
    /// target month (Jan 31 + 1 month is Feb 28 or Feb 29, never early March).
    /// Returns `None` once the result leaves chrono's representable range.
    pub fn advance(self, from: DateTime<Utc>, steps: u32) -> Option<DateTime<Utc>> {
        let date = from.date_naive();
        let shifted = match self {
            Frequency::Daily => date.checked_add_signed(Duration::days(i64::from(steps)))?,
            Frequency::Weekly => date.checked_add_signed(Duration::weeks(i64::from(steps)))?,
            Frequency::Monthly => shift_months(date, steps)?,
            Frequency::Yearly => shift_months(date, steps.checked_mul(12)?)?,
        };
        Some(DateTime::from_naive_utc_and_offset(
            shifted.and_time(from.time()),
            Utc,
        ))
    }

    /// Number of whole periods between the calendar positions of `anchor` and
    /// `reference`. The result may overshoot by one for clamped month ends, so
    /// callers treat it as a lower-bound hint after subtracting one.
    pub fn periods_between(self, anchor: DateTime<Utc>, reference: DateTime<Utc>) -> u32 {
        if reference <= anchor {
            return 0;
        }
        let (anchor, reference) = (anchor.date_naive(), reference.date_naive());
        let periods = match self {
            Frequency::Daily => (reference - anchor).num_days(),
            Frequency::Weekly => (reference - anchor).num_days() / 7,
            Frequency::Monthly => i64::from(month_index(reference) - month_index(anchor)),
            Frequency::Yearly => i64::from(reference.year() - anchor.year()),
        };
        u32::try_from(periods.max(0)).unwrap_or(u32::MAX)
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the number of days in the given month, or `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    u32::try_from((first_next - first).num_days()).ok()
}

/// Shifts a date forward by whole months, clamping the day of month.
pub fn shift_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let target = i64::from(month_index(date)) + i64::from(months);
    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = u32::try_from(target.rem_euclid(12)).ok()? + 1;
    let day = date.day().min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}
