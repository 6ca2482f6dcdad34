//! Per-user facade over the services and stores.

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use tally_config::Config;
use tally_core::{
    BudgetEvaluator, BudgetService, BudgetStore, Clock, CoreError, FinancialSummary,
    ForecastReport, ForecastService, LedgerStore, MemoryBudgetStore, MemoryLedgerStore,
    MemoryTemplateStore, ProcessGuards, ProcessReport, RecurrenceService, RecurrenceSnapshot,
    RecurringEngine, SummaryService, TemplateStore, TransactionService,
};
use tally_domain::{
    Alert, BudgetLimit, BudgetProgress, RecurringTemplate, TemplateDraft, TemplateId,
    Transaction, TransactionDraft, TransactionFilter, TransactionId, TransactionKind,
    TransactionPatch, UserId,
};
use tally_storage_json::JsonStore;

use crate::{SystemClock, TallyError};

/// The three stores a tracker reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub budgets: Arc<dyn BudgetStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            ledger: Arc::new(MemoryLedgerStore::new()),
            templates: Arc::new(MemoryTemplateStore::new()),
            budgets: Arc::new(MemoryBudgetStore::new()),
        }
    }

    /// JSON files under `dir`, created if missing.
    pub fn json(dir: &Path) -> Result<Self, CoreError> {
        let store = JsonStore::open(dir)?;
        Ok(Self {
            ledger: Arc::new(store.ledger),
            templates: Arc::new(store.templates),
            budgets: Arc::new(store.budgets),
        })
    }
}

/// Result of [`Tracker::add_transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub id: TransactionId,
    /// Budget state the entry pushed its category into, checked before it was written.
    pub alert: Option<Alert>,
}

/// Everything one user does against their ledger, templates and budgets.
pub struct Tracker {
    user: UserId,
    stores: Stores,
    clock: Arc<dyn Clock>,
    engine: RecurringEngine,
    evaluator: BudgetEvaluator,
    forecast_months: u32,
}

impl Tracker {
    /// Builds a tracker. Every tracker for the same user must share `guards`.
    pub fn new(
        user: UserId,
        stores: Stores,
        clock: Arc<dyn Clock>,
        guards: Arc<ProcessGuards>,
        config: &Config,
    ) -> Self {
        Self {
            user,
            stores,
            clock,
            engine: RecurringEngine::new(guards),
            evaluator: BudgetEvaluator::new(config.warning_threshold_percent),
            forecast_months: config.forecast_trailing_months,
        }
    }

    /// Opens the user's JSON stores under the configured data directory,
    /// using the system clock.
    pub fn open(
        config: &Config,
        user: UserId,
        guards: Arc<ProcessGuards>,
    ) -> Result<Self, TallyError> {
        config.validate()?;
        let dir = config.resolve_data_dir().join(user_dir_name(&user));
        let stores = Stores::json(&dir)?;
        info!(user = %user, dir = %dir.display(), "tracker opened");
        Ok(Self::new(user, stores, Arc::new(SystemClock), guards, config))
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // Recurring execution

    /// Writes every due recurring occurrence up to `now` (the clock when `None`).
    ///
    /// Safe to call redundantly. Templates that failed part way are listed in the
    /// report and resume from their last written occurrence next time.
    pub fn process_recurring(
        &self,
        now: Option<DateTime<Utc>>,
    ) -> Result<ProcessReport, CoreError> {
        let now = now.unwrap_or_else(|| self.clock.now());
        let report = self.engine.process(
            &self.user,
            self.stores.ledger.as_ref(),
            self.stores.templates.as_ref(),
            now,
        )?;
        for failure in &report.failures {
            warn!(
                user = %self.user,
                template = failure.template_id,
                error = %failure.error,
                "recurring template left behind"
            );
        }
        Ok(report)
    }

    // Budgets

    /// Alert state of `category` if `candidate` more were spent this month.
    pub fn evaluate_budget(&self, category: &str, candidate: u64) -> Result<Option<Alert>, CoreError> {
        self.evaluator.evaluate(
            self.stores.budgets.as_ref(),
            self.stores.ledger.as_ref(),
            category,
            candidate,
            self.clock.now(),
        )
    }

    /// Alerts for every limit; an exceeded category is reported once per month.
    pub fn evaluate_all_budgets(&self) -> Result<Vec<Alert>, CoreError> {
        self.evaluator.evaluate_all(
            self.stores.budgets.as_ref(),
            self.stores.ledger.as_ref(),
            self.clock.now(),
        )
    }

    pub fn set_budget(&self, category: &str, limit: u64) -> Result<BudgetLimit, CoreError> {
        BudgetService::set_limit(self.stores.budgets.as_ref(), category, limit)
    }

    pub fn remove_budget(&self, category: &str) -> Result<bool, CoreError> {
        BudgetService::remove_limit(self.stores.budgets.as_ref(), category)
    }

    pub fn budgets(&self) -> Result<Vec<BudgetLimit>, CoreError> {
        BudgetService::limits(self.stores.budgets.as_ref())
    }

    pub fn budget_progress(&self) -> Result<Vec<BudgetProgress>, CoreError> {
        let entries = self.stores.ledger.list()?;
        BudgetService::progress(self.stores.budgets.as_ref(), &entries, self.clock.now())
    }

    // Forecast and summary

    pub fn forecast_next_month(
        &self,
        now: Option<DateTime<Utc>>,
    ) -> Result<ForecastReport, CoreError> {
        let now = now.unwrap_or_else(|| self.clock.now());
        let entries = self.stores.ledger.list()?;
        Ok(ForecastService::forecast(&entries, now, self.forecast_months))
    }

    pub fn summary(&self) -> Result<FinancialSummary, CoreError> {
        Ok(SummaryService::summarize(&self.stores.ledger.list()?))
    }

    // Transactions

    /// Records an entry stamped with the current time.
    ///
    /// Expenses are checked against their category's budget before the write.
    pub fn add_transaction(
        &self,
        kind: TransactionKind,
        category: &str,
        amount: u64,
        description: Option<String>,
    ) -> Result<AddOutcome, CoreError> {
        let mut draft = TransactionDraft::new(kind, category, amount, self.clock.now());
        draft.description = description;
        let alert = match kind {
            TransactionKind::Expense => self.evaluate_budget(category, amount)?,
            TransactionKind::Income => None,
        };
        let id = TransactionService::add(self.stores.ledger.as_ref(), draft)?;
        if let Some(alert) = &alert {
            warn!(user = %self.user, transaction = id, alert = %alert, "entry pushed budget");
        }
        Ok(AddOutcome { id, alert })
    }

    pub fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<(), CoreError> {
        TransactionService::update(self.stores.ledger.as_ref(), id, patch)
    }

    pub fn delete_transaction(&self, id: TransactionId) -> Result<(), CoreError> {
        TransactionService::delete(self.stores.ledger.as_ref(), id)
    }

    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, CoreError> {
        TransactionService::list(self.stores.ledger.as_ref(), filter)
    }

    pub fn categories(&self, kind: TransactionKind) -> Result<Vec<String>, CoreError> {
        Ok(TransactionService::categories(&self.stores.ledger.list()?, kind))
    }

    // Templates. Edits hold the user's guard so they never interleave with processing.

    pub fn create_template(&self, draft: TemplateDraft) -> Result<TemplateId, CoreError> {
        self.with_guard(|templates| RecurrenceService::create(templates, draft))
    }

    pub fn update_template(
        &self,
        id: TemplateId,
        draft: TemplateDraft,
    ) -> Result<RecurringTemplate, CoreError> {
        self.with_guard(|templates| RecurrenceService::update(templates, id, draft))
    }

    /// Flips the active flag and returns the new value.
    pub fn toggle_template(&self, id: TemplateId) -> Result<bool, CoreError> {
        self.with_guard(|templates| RecurrenceService::toggle_active(templates, id))
    }

    pub fn delete_template(&self, id: TemplateId) -> Result<(), CoreError> {
        self.with_guard(|templates| RecurrenceService::delete(templates, id))
    }

    /// Templates with their next due instant, soonest first.
    pub fn recurring_schedule(&self) -> Result<Vec<RecurrenceSnapshot>, CoreError> {
        RecurrenceService::snapshots(self.stores.templates.as_ref(), self.clock.now())
    }

    fn with_guard<T>(&self, f: impl FnOnce(&dyn TemplateStore) -> T) -> T {
        let templates = self.stores.templates.as_ref();
        self.engine.guards().with_guard(&self.user, || f(templates))
    }
}

/// Directory name for a user's store files.
fn user_dir_name(user: &UserId) -> String {
    let sanitized: String = user
        .as_str()
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "default".into()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_dir_names_are_path_safe() {
        assert_eq!(user_dir_name(&UserId::new("Ana Lopez")), "ana_lopez");
        assert_eq!(user_dir_name(&UserId::new("../etc")), "___etc");
        assert_eq!(user_dir_name(&UserId::new("  ")), "default");
    }
}
