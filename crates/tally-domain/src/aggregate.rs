//! Ledger aggregation over half-open windows.

use std::collections::BTreeMap;

use crate::transaction::Transaction;
use crate::window::{DateWindow, MonthKey};

/// Per-category amounts, split by the calendar month of each entry.
pub type MonthlyTotals = BTreeMap<String, BTreeMap<MonthKey, u64>>;

/// Total amount of entries in `category` whose timestamp falls in `window`.
pub fn sum_by_category<'a, I>(entries: I, category: &str, window: DateWindow) -> u64
where
    I: IntoIterator<Item = &'a Transaction>,
{
    entries
        .into_iter()
        .filter(|txn| txn.category == category && window.contains(txn.timestamp))
        .fold(0u64, |total, txn| total.saturating_add(txn.amount))
}

/// Accumulates entries inside `window` by category and month.
pub fn monthly_totals_by_category<'a, I>(entries: I, window: DateWindow) -> MonthlyTotals
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut totals = MonthlyTotals::new();
    for txn in entries
        .into_iter()
        .filter(|txn| window.contains(txn.timestamp))
    {
        let slot = totals
            .entry(txn.category.clone())
            .or_default()
            .entry(MonthKey::of(txn.timestamp))
            .or_default();
        *slot = slot.saturating_add(txn.amount);
    }
    totals
}
