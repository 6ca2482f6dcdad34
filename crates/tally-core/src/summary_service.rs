//! Whole-ledger income/expense totals.

use std::fmt;

use tally_domain::Transaction;

/// Coarse rating derived from the savings rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthRating {
    pub fn from_savings_rate(rate: Option<f64>) -> Self {
        match rate {
            Some(rate) if rate > 30.0 => HealthRating::Excellent,
            Some(rate) if rate > 15.0 => HealthRating::Good,
            Some(rate) if rate > 0.0 => HealthRating::Fair,
            _ => HealthRating::Poor,
        }
    }
}

impl fmt::Display for HealthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthRating::Excellent => "Excellent",
            HealthRating::Good => "Good",
            HealthRating::Fair => "Fair",
            HealthRating::Poor => "Poor",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialSummary {
    pub total_income: u64,
    pub total_expenses: u64,
    pub balance: i64,
    /// Percent of income kept; `None` without income.
    pub savings_rate: Option<f64>,
    pub health: HealthRating,
}

pub struct SummaryService;

impl SummaryService {
    pub fn summarize(entries: &[Transaction]) -> FinancialSummary {
        let (income, expenses) = entries.iter().fold((0u64, 0u64), |(inc, exp), txn| {
            if txn.is_income() {
                (inc.saturating_add(txn.amount), exp)
            } else {
                (inc, exp.saturating_add(txn.amount))
            }
        });
        let balance = i128::from(income) - i128::from(expenses);
        let savings_rate = if income == 0 {
            None
        } else {
            Some(balance as f64 / income as f64 * 100.0)
        };
        FinancialSummary {
            total_income: income,
            total_expenses: expenses,
            balance: balance.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
            savings_rate,
            health: HealthRating::from_savings_rate(savings_rate),
        }
    }
}
