//! In-process store implementations, used for embedding and tests.

use std::sync::{Mutex, MutexGuard};

use tally_domain::{
    BudgetLimit, RecurringTemplate, TemplateDraft, TemplateId, Transaction, TransactionDraft,
    TransactionId, TransactionPatch,
};

use crate::{
    storage::{BudgetStore, LedgerStore, TemplateStore},
    CoreError,
};

#[derive(Debug)]
struct Table<T> {
    next_id: u64,
    records: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, CoreError> {
    mutex
        .lock()
        .map_err(|_| CoreError::StoreUnavailable(format!("{name} lock poisoned")))
}

#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    table: Mutex<Table<Transaction>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn append(&self, draft: TransactionDraft) -> Result<TransactionId, CoreError> {
        let mut table = lock(&self.table, "ledger")?;
        let id = table.allocate_id();
        table.records.push(Transaction::from_draft(id, draft));
        Ok(id)
    }

    fn list(&self) -> Result<Vec<Transaction>, CoreError> {
        Ok(lock(&self.table, "ledger")?.records.clone())
    }

    fn update(&self, id: TransactionId, patch: &TransactionPatch) -> Result<(), CoreError> {
        let mut table = lock(&self.table, "ledger")?;
        let txn = table
            .records
            .iter_mut()
            .find(|txn| txn.id == id)
            .ok_or(CoreError::TransactionNotFound(id))?;
        patch.apply(txn);
        Ok(())
    }

    fn delete(&self, id: TransactionId) -> Result<(), CoreError> {
        let mut table = lock(&self.table, "ledger")?;
        let before = table.records.len();
        table.records.retain(|txn| txn.id != id);
        if table.records.len() == before {
            return Err(CoreError::TransactionNotFound(id));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    table: Mutex<Table<RecurringTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn list(&self) -> Result<Vec<RecurringTemplate>, CoreError> {
        Ok(lock(&self.table, "template")?.records.clone())
    }

    fn insert(&self, draft: TemplateDraft) -> Result<TemplateId, CoreError> {
        let mut table = lock(&self.table, "template")?;
        let id = table.allocate_id();
        table.records.push(RecurringTemplate::from_draft(id, draft));
        Ok(id)
    }

    fn save(&self, template: &RecurringTemplate) -> Result<(), CoreError> {
        let mut table = lock(&self.table, "template")?;
        let slot = table
            .records
            .iter_mut()
            .find(|existing| existing.id == template.id)
            .ok_or(CoreError::TemplateNotFound(template.id))?;
        *slot = template.clone();
        Ok(())
    }

    fn delete(&self, id: TemplateId) -> Result<(), CoreError> {
        let mut table = lock(&self.table, "template")?;
        let before = table.records.len();
        table.records.retain(|template| template.id != id);
        if table.records.len() == before {
            return Err(CoreError::TemplateNotFound(id));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBudgetStore {
    limits: Mutex<Vec<BudgetLimit>>,
}

impl MemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BudgetStore for MemoryBudgetStore {
    fn list(&self) -> Result<Vec<BudgetLimit>, CoreError> {
        Ok(lock(&self.limits, "budget")?.clone())
    }

    fn set(&self, limit: BudgetLimit) -> Result<(), CoreError> {
        let mut limits = lock(&self.limits, "budget")?;
        match limits
            .iter_mut()
            .find(|existing| existing.category == limit.category)
        {
            Some(existing) => existing.limit = limit.limit,
            None => limits.push(limit),
        }
        Ok(())
    }

    fn remove(&self, category: &str) -> Result<bool, CoreError> {
        let mut limits = lock(&self.limits, "budget")?;
        let before = limits.len();
        limits.retain(|limit| limit.category != category);
        Ok(limits.len() != before)
    }
}
