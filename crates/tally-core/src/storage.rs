//! Store contracts the services are written against.
//!
//! Implementations own id assignment and durability. Every failure to read or
//! write surfaces as [`CoreError::StoreUnavailable`]; retries belong to the
//! implementation, never to the services.

use tally_domain::{
    BudgetLimit, RecurringTemplate, TemplateDraft, TemplateId, Transaction, TransactionDraft,
    TransactionId, TransactionPatch,
};

use crate::CoreError;

/// Durable collection of ledger entries.
pub trait LedgerStore: Send + Sync {
    /// Persists a new entry and returns its freshly assigned id.
    fn append(&self, draft: TransactionDraft) -> Result<TransactionId, CoreError>;
    fn list(&self) -> Result<Vec<Transaction>, CoreError>;
    fn update(&self, id: TransactionId, patch: &TransactionPatch) -> Result<(), CoreError>;
    fn delete(&self, id: TransactionId) -> Result<(), CoreError>;

    fn get(&self, id: TransactionId) -> Result<Transaction, CoreError> {
        self.list()?
            .into_iter()
            .find(|txn| txn.id == id)
            .ok_or(CoreError::TransactionNotFound(id))
    }
}

/// Durable collection of recurring templates.
pub trait TemplateStore: Send + Sync {
    fn list(&self) -> Result<Vec<RecurringTemplate>, CoreError>;
    /// Stores a new active, never-executed template built from `draft`.
    fn insert(&self, draft: TemplateDraft) -> Result<TemplateId, CoreError>;
    /// Overwrites an existing template.
    fn save(&self, template: &RecurringTemplate) -> Result<(), CoreError>;
    fn delete(&self, id: TemplateId) -> Result<(), CoreError>;

    fn get(&self, id: TemplateId) -> Result<RecurringTemplate, CoreError> {
        self.list()?
            .into_iter()
            .find(|template| template.id == id)
            .ok_or(CoreError::TemplateNotFound(id))
    }
}

/// Durable mapping of category to monthly limit.
pub trait BudgetStore: Send + Sync {
    fn list(&self) -> Result<Vec<BudgetLimit>, CoreError>;
    /// Inserts or replaces the limit for `limit.category`.
    fn set(&self, limit: BudgetLimit) -> Result<(), CoreError>;
    /// Returns whether a limit existed.
    fn remove(&self, category: &str) -> Result<bool, CoreError>;

    fn get(&self, category: &str) -> Result<Option<BudgetLimit>, CoreError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|limit| limit.category == category))
    }
}
