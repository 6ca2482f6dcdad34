//! Monthly category budget limits and the alerts they produce.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default share of the limit, in percent, above which spending is a warning.
pub const DEFAULT_WARNING_PERCENT: u8 = 90;

/// Monthly spending cap for one category. At most one per category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetLimit {
    pub category: String,
    pub limit: u64,
}

impl BudgetLimit {
    pub fn new(category: impl Into<String>, limit: u64) -> Self {
        Self {
            category: category.into(),
            limit,
        }
    }

    /// Classifies `spent` against this limit.
    ///
    /// Exceeded requires `spent > limit`; a warning requires
    /// `spent > limit * warning_percent / 100`. Both comparisons are strict.
    pub fn classify(&self, spent: u64, warning_percent: u8) -> Option<Alert> {
        if spent > self.limit {
            return Some(Alert {
                category: self.category.clone(),
                severity: Severity::Exceeded,
                delta: spent - self.limit,
            });
        }
        let scaled_spent = u128::from(spent) * 100;
        let threshold = u128::from(self.limit) * u128::from(warning_percent);
        if scaled_spent > threshold {
            return Some(Alert {
                category: self.category.clone(),
                severity: Severity::Warning,
                delta: self.limit - spent,
            });
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Exceeded,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Warning => "Warning",
            Severity::Exceeded => "Exceeded",
        };
        f.write_str(label)
    }
}

/// Transient result of a budget evaluation. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub category: String,
    pub severity: Severity,
    /// Amount over the limit when exceeded, amount remaining when a warning.
    pub delta: u64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Exceeded => write!(f, "{}: {} over budget", self.category, self.delta),
            Severity::Warning => write!(f, "{}: only {} remaining", self.category, self.delta),
        }
    }
}

/// Spending against a limit for the current month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetProgress {
    pub category: String,
    pub limit: u64,
    pub spent: u64,
    /// Negative when over budget.
    pub remaining: i64,
    pub percent_used: Option<f64>,
}

impl BudgetProgress {
    pub fn new(limit: &BudgetLimit, spent: u64) -> Self {
        let remaining = i128::from(limit.limit) - i128::from(spent);
        let percent_used = if limit.limit == 0 {
            None
        } else {
            Some(spent as f64 / limit.limit as f64 * 100.0)
        };
        Self {
            category: limit.category.clone(),
            limit: limit.limit,
            spent,
            remaining: remaining.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
            percent_used,
        }
    }
}
