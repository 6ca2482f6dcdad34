//! Budget limits, monthly progress and threshold alerts.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tracing::warn;

use tally_domain::{
    sum_by_category, Alert, BudgetLimit, BudgetProgress, DateWindow, MonthKey, Severity,
    Transaction, DEFAULT_WARNING_PERCENT,
};

use crate::{
    storage::{BudgetStore, LedgerStore},
    transaction_service::normalize_category,
    CoreError,
};

/// Stateless helpers for managing limits and reading spend.
pub struct BudgetService;

impl BudgetService {
    /// Sets the limit for a category, replacing any existing one.
    pub fn set_limit(
        store: &dyn BudgetStore,
        category: &str,
        limit: u64,
    ) -> Result<BudgetLimit, CoreError> {
        let limit = BudgetLimit::new(normalize_category(category)?, limit);
        store.set(limit.clone())?;
        Ok(limit)
    }

    pub fn remove_limit(store: &dyn BudgetStore, category: &str) -> Result<bool, CoreError> {
        store.remove(category.trim())
    }

    /// All limits, sorted by category.
    pub fn limits(store: &dyn BudgetStore) -> Result<Vec<BudgetLimit>, CoreError> {
        let mut limits = store.list()?;
        limits.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(limits)
    }

    /// Expense total for `category` in the calendar month containing `now`.
    pub fn spent_in_month(entries: &[Transaction], category: &str, now: DateTime<Utc>) -> u64 {
        match DateWindow::month_containing(now) {
            Some(window) => {
                sum_by_category(entries.iter().filter(|txn| txn.is_expense()), category, window)
            }
            None => 0,
        }
    }

    /// Current-month progress for every configured limit.
    pub fn progress(
        store: &dyn BudgetStore,
        entries: &[Transaction],
        now: DateTime<Utc>,
    ) -> Result<Vec<BudgetProgress>, CoreError> {
        Ok(Self::limits(store)?
            .iter()
            .map(|limit| {
                BudgetProgress::new(limit, Self::spent_in_month(entries, &limit.category, now))
            })
            .collect())
    }
}

#[derive(Debug, Default)]
struct ExceededLog {
    month: Option<MonthKey>,
    categories: HashSet<String>,
}

impl ExceededLog {
    /// Records `category` for `month`; returns false if it was already recorded.
    fn first_in_month(&mut self, month: MonthKey, category: &str) -> bool {
        if self.month != Some(month) {
            self.month = Some(month);
            self.categories.clear();
        }
        self.categories.insert(category.to_string())
    }
}

/// Compares current-month spend with configured limits.
///
/// Holds process-local state so that [`BudgetEvaluator::evaluate_all`] reports an
/// exceeded category at most once per calendar month.
#[derive(Debug)]
pub struct BudgetEvaluator {
    warning_percent: u8,
    exceeded: Mutex<ExceededLog>,
}

impl Default for BudgetEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_PERCENT)
    }
}

impl BudgetEvaluator {
    pub fn new(warning_percent: u8) -> Self {
        Self {
            warning_percent,
            exceeded: Mutex::new(ExceededLog::default()),
        }
    }

    /// Evaluates `category` as if `candidate` more were spent this month.
    ///
    /// Pass zero to evaluate the ledger as it stands. No limit means no alert.
    pub fn evaluate(
        &self,
        budgets: &dyn BudgetStore,
        ledger: &dyn LedgerStore,
        category: &str,
        candidate: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, CoreError> {
        let category = category.trim();
        let Some(limit) = budgets.get(category)? else {
            return Ok(None);
        };
        let entries = ledger.list()?;
        let spent = BudgetService::spent_in_month(&entries, category, now).saturating_add(candidate);
        Ok(limit.classify(spent, self.warning_percent))
    }

    /// Evaluates every configured limit.
    ///
    /// Warnings are reported on every call; an exceeded category is reported
    /// only the first time in a given calendar month.
    pub fn evaluate_all(
        &self,
        budgets: &dyn BudgetStore,
        ledger: &dyn LedgerStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, CoreError> {
        let limits = BudgetService::limits(budgets)?;
        if limits.is_empty() {
            return Ok(Vec::new());
        }
        let entries = ledger.list()?;
        let month = MonthKey::of(now);
        let mut log = self.exceeded.lock().unwrap_or_else(PoisonError::into_inner);

        let mut alerts = Vec::new();
        for limit in &limits {
            let spent = BudgetService::spent_in_month(&entries, &limit.category, now);
            let Some(alert) = limit.classify(spent, self.warning_percent) else {
                continue;
            };
            if alert.severity == Severity::Exceeded {
                if !log.first_in_month(month, &alert.category) {
                    continue;
                }
                warn!(category = %alert.category, over = alert.delta, "budget exceeded");
            }
            alerts.push(alert);
        }
        Ok(alerts)
    }
}
