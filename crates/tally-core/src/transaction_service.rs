//! Business logic helpers for managing ledger entries.

use std::collections::BTreeSet;

use tally_domain::{
    Transaction, TransactionDraft, TransactionFilter, TransactionId, TransactionKind,
    TransactionPatch,
};

use crate::{storage::LedgerStore, CoreError};

/// Provides validated CRUD helpers for ledger transactions.
pub struct TransactionService;

impl TransactionService {
    /// Adds a new transaction and returns its identifier.
    pub fn add(
        ledger: &dyn LedgerStore,
        mut draft: TransactionDraft,
    ) -> Result<TransactionId, CoreError> {
        draft.category = normalize_category(&draft.category)?;
        ledger.append(draft)
    }

    /// Applies `patch` to the amount, category and description of `id`.
    pub fn update(
        ledger: &dyn LedgerStore,
        id: TransactionId,
        mut patch: TransactionPatch,
    ) -> Result<(), CoreError> {
        if let Some(category) = patch.category.as_deref() {
            patch.category = Some(normalize_category(category)?);
        }
        ledger.update(id, &patch)
    }

    pub fn delete(ledger: &dyn LedgerStore, id: TransactionId) -> Result<(), CoreError> {
        ledger.delete(id)
    }

    /// Returns matching transactions, newest first.
    pub fn list(
        ledger: &dyn LedgerStore,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, CoreError> {
        let mut rows: Vec<_> = ledger
            .list()?
            .into_iter()
            .filter(|txn| filter.matches(txn))
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    /// Distinct categories used by entries of `kind`, sorted.
    pub fn categories(entries: &[Transaction], kind: TransactionKind) -> Vec<String> {
        entries
            .iter()
            .filter(|txn| txn.kind == kind)
            .map(|txn| txn.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub(crate) fn normalize_category(category: &str) -> Result<String, CoreError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("category must not be empty".into()));
    }
    Ok(trimmed.to_string())
}
