//! Ledger entries and the user-editable subset of their fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{TemplateId, TransactionId, TransactionKind};

/// A single income or expense entry in the ledger.
///
/// `kind` and `timestamp` are fixed at creation; only amount, category and
/// description change through [`TransactionPatch`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub category: String,
    /// Minor currency units.
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Template that generated this entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
}

impl Transaction {
    pub fn from_draft(id: TransactionId, draft: TransactionDraft) -> Self {
        Self {
            id,
            kind: draft.kind,
            category: draft.category,
            amount: draft.amount,
            description: draft.description,
            timestamp: draft.timestamp,
            template_id: draft.template_id,
        }
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }

    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }
}

/// A transaction that has not been assigned an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: u64,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub template_id: Option<TemplateId>,
}

impl TransactionDraft {
    pub fn new(
        kind: TransactionKind,
        category: impl Into<String>,
        amount: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            amount,
            description: None,
            timestamp,
            template_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of the mutable transaction fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub amount: Option<u64>,
    pub category: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

impl TransactionPatch {
    pub fn apply(&self, transaction: &mut Transaction) {
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }
        if let Some(category) = &self.category {
            transaction.category = category.clone();
        }
        if let Some(description) = &self.description {
            transaction.description = description.clone();
        }
    }
}

/// Criteria for narrowing a transaction listing. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to: Option<DateTime<Utc>>,
    pub amount: Option<u64>,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        self.kind.map_or(true, |kind| txn.kind == kind)
            && self
                .category
                .as_deref()
                .map_or(true, |category| txn.category == category)
            && self.from.map_or(true, |from| txn.timestamp >= from)
            && self.to.map_or(true, |to| txn.timestamp <= to)
            && self.amount.map_or(true, |amount| txn.amount == amount)
    }
}
