//! Next-month spend projection from trailing expense history.

use chrono::{DateTime, Utc};
use tracing::debug;

use tally_domain::{monthly_totals_by_category, DateWindow, Transaction};

/// Default number of whole months of history behind a forecast.
pub const DEFAULT_TRAILING_MONTHS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryForecast {
    pub category: String,
    pub predicted: u64,
    /// Distinct months in the window with at least one entry for the category.
    pub active_months: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForecastReport {
    /// History window the forecast was built from.
    pub window: Option<DateWindow>,
    /// Sorted by predicted amount descending, then category name.
    pub per_category: Vec<CategoryForecast>,
    pub total: u64,
}

impl ForecastReport {
    /// True when there was no expense history to project from.
    pub fn is_empty(&self) -> bool {
        self.per_category.is_empty()
    }

    pub fn predicted_for(&self, category: &str) -> Option<u64> {
        self.per_category
            .iter()
            .find(|entry| entry.category == category)
            .map(|entry| entry.predicted)
    }
}

pub struct ForecastService;

impl ForecastService {
    /// Projects next month's expenses per category.
    ///
    /// Uses the `trailing_months` whole calendar months before the month of
    /// `now`. Each category's total is divided by the number of months in which
    /// it actually appeared and rounded half up.
    pub fn forecast(
        entries: &[Transaction],
        now: DateTime<Utc>,
        trailing_months: u32,
    ) -> ForecastReport {
        let Some(window) = DateWindow::trailing_months(now, trailing_months) else {
            return ForecastReport::default();
        };
        let totals =
            monthly_totals_by_category(entries.iter().filter(|txn| txn.is_expense()), window);

        let mut per_category: Vec<_> = totals
            .into_iter()
            .map(|(category, months)| {
                let total: u64 = months.values().fold(0, |sum, v| sum.saturating_add(*v));
                CategoryForecast {
                    predicted: rounded_average(total, months.len()),
                    active_months: months.len(),
                    category,
                }
            })
            .collect();
        per_category.sort_by(|a, b| {
            b.predicted
                .cmp(&a.predicted)
                .then_with(|| a.category.cmp(&b.category))
        });
        let total = per_category
            .iter()
            .fold(0u64, |sum, entry| sum.saturating_add(entry.predicted));
        debug!(categories = per_category.len(), total, "forecast computed");

        ForecastReport {
            window: Some(window),
            per_category,
            total,
        }
    }
}

fn rounded_average(total: u64, months: usize) -> u64 {
    if months == 0 {
        return 0;
    }
    let months = months as u128;
    ((u128::from(total) * 2 + months) / (months * 2)) as u64
}
