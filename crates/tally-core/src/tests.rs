use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{DateTime, TimeZone, Utc};

use crate::{
    BudgetEvaluator, BudgetService, CoreError, ForecastService, LedgerStore, MemoryBudgetStore,
    MemoryLedgerStore, MemoryTemplateStore, ProcessGuards, RecurrenceService, RecurringEngine,
    TemplateStore, DEFAULT_TRAILING_MONTHS,
};
use tally_domain::{
    Frequency, Severity, TemplateDraft, Transaction, TransactionDraft, TransactionId,
    TransactionKind, TransactionPatch, UserId,
};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 6, 0, 0).unwrap()
}

fn user() -> UserId {
    UserId::new("tester")
}

/// Ledger that starts failing after a fixed number of successful appends.
struct FlakyLedger {
    inner: MemoryLedgerStore,
    remaining: AtomicUsize,
}

impl FlakyLedger {
    fn failing_after(successes: usize) -> Self {
        Self {
            inner: MemoryLedgerStore::new(),
            remaining: AtomicUsize::new(successes),
        }
    }

    fn heal(&self) {
        self.remaining.store(usize::MAX, Ordering::SeqCst);
    }
}

impl LedgerStore for FlakyLedger {
    fn append(&self, draft: TransactionDraft) -> Result<TransactionId, CoreError> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(CoreError::StoreUnavailable("disk full".into()));
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        self.inner.append(draft)
    }

    fn list(&self) -> Result<Vec<Transaction>, CoreError> {
        self.inner.list()
    }

    fn update(&self, id: TransactionId, patch: &TransactionPatch) -> Result<(), CoreError> {
        self.inner.update(id, patch)
    }

    fn delete(&self, id: TransactionId) -> Result<(), CoreError> {
        self.inner.delete(id)
    }
}

fn monthly_rent(start: DateTime<Utc>) -> TemplateDraft {
    let mut draft =
        TemplateDraft::new(TransactionKind::Expense, "Rent", 95_000, Frequency::Monthly, start);
    draft.description = Some("flat".into());
    draft
}

#[test]
fn process_is_idempotent_at_fixed_now() {
    let ledger = MemoryLedgerStore::new();
    let templates = MemoryTemplateStore::new();
    RecurrenceService::create(&templates, monthly_rent(at(2025, 1, 1))).unwrap();
    let engine = RecurringEngine::default();
    let now = at(2025, 4, 10);

    let first = engine.process(&user(), &ledger, &templates, now).unwrap();
    let second = engine.process(&user(), &ledger, &templates, now).unwrap();

    assert_eq!(first.created_count, 4);
    assert_eq!(second.created_count, 0);
    assert_eq!(ledger.list().unwrap().len(), 4);
}

#[test]
fn generated_entries_copy_template_fields() {
    let ledger = MemoryLedgerStore::new();
    let templates = MemoryTemplateStore::new();
    let id = RecurrenceService::create(&templates, monthly_rent(at(2025, 1, 1))).unwrap();
    RecurringEngine::default()
        .process(&user(), &ledger, &templates, at(2025, 1, 1))
        .unwrap();

    let entries = ledger.list().unwrap();
    assert_eq!(entries.len(), 1);
    let txn = &entries[0];
    assert_eq!(txn.kind, TransactionKind::Expense);
    assert_eq!(txn.category, "Rent");
    assert_eq!(txn.amount, 95_000);
    assert_eq!(txn.description.as_deref(), Some("flat"));
    assert_eq!(txn.timestamp, at(2025, 1, 1));
    assert_eq!(txn.template_id, Some(id));
    assert_eq!(templates.get(id).unwrap().last_execution, Some(at(2025, 1, 1)));
}

#[test]
fn last_execution_never_moves_backwards() {
    let ledger = MemoryLedgerStore::new();
    let templates = MemoryTemplateStore::new();
    let id = RecurrenceService::create(
        &templates,
        TemplateDraft::new(TransactionKind::Income, "Salary", 1, Frequency::Weekly, at(2025, 1, 1)),
    )
    .unwrap();
    let engine = RecurringEngine::default();

    let mut previous = None;
    for now in [at(2025, 1, 20), at(2025, 1, 10), at(2025, 2, 3), at(2025, 2, 3)] {
        engine.process(&user(), &ledger, &templates, now).unwrap();
        let current = templates.get(id).unwrap().last_execution;
        assert!(current >= previous, "{current:?} < {previous:?}");
        previous = current;
    }
    assert_eq!(previous, Some(at(2025, 1, 29)));
}

#[test]
fn write_failure_keeps_partial_progress_and_retries_missed_occurrence() {
    let ledger = FlakyLedger::failing_after(2);
    let templates = MemoryTemplateStore::new();
    let id = RecurrenceService::create(&templates, monthly_rent(at(2025, 1, 1))).unwrap();
    let engine = RecurringEngine::default();
    let now = at(2025, 5, 1);

    let report = engine.process(&user(), &ledger, &templates, now).unwrap();
    assert_eq!(report.created_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].template_id, id);
    assert!(matches!(report.failures[0].error, CoreError::StoreUnavailable(_)));
    assert_eq!(templates.get(id).unwrap().last_execution, Some(at(2025, 2, 1)));

    ledger.heal();
    let retry = engine.process(&user(), &ledger, &templates, now).unwrap();
    assert!(retry.is_clean());
    assert_eq!(retry.created_count, 3);

    let mut stamps: Vec<_> = ledger.list().unwrap().iter().map(|txn| txn.timestamp).collect();
    stamps.sort();
    assert_eq!(
        stamps,
        vec![at(2025, 1, 1), at(2025, 2, 1), at(2025, 3, 1), at(2025, 4, 1), at(2025, 5, 1)]
    );
}

#[test]
fn failing_template_does_not_stop_others() {
    let ledger = FlakyLedger::failing_after(1);
    let templates = MemoryTemplateStore::new();
    let first = RecurrenceService::create(
        &templates,
        TemplateDraft::new(TransactionKind::Expense, "Gym", 3_000, Frequency::Daily, at(2025, 3, 1)),
    )
    .unwrap();
    RecurrenceService::create(&templates, monthly_rent(at(2025, 3, 1))).unwrap();

    let report = RecurringEngine::default()
        .process(&user(), &ledger, &templates, at(2025, 3, 2))
        .unwrap();

    // Gym writes one entry then fails; rent then fails immediately but is still attempted.
    assert_eq!(report.created_count, 1);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].template_id, first);
    assert_eq!(report.failures[0].created, 1);
}

#[test]
fn generated_entries_respect_start_and_end() {
    let ledger = MemoryLedgerStore::new();
    let templates = MemoryTemplateStore::new();
    let start = at(2025, 1, 10);
    let end = at(2025, 1, 13);
    RecurrenceService::create(
        &templates,
        TemplateDraft::new(TransactionKind::Expense, "Coffee", 400, Frequency::Daily, start)
            .with_end(end),
    )
    .unwrap();

    RecurringEngine::default()
        .process(&user(), &ledger, &templates, at(2025, 3, 1))
        .unwrap();

    let entries = ledger.list().unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|txn| txn.timestamp >= start && txn.timestamp <= end));
}

#[test]
fn reactivation_resumes_instead_of_restarting() {
    let ledger = MemoryLedgerStore::new();
    let templates = MemoryTemplateStore::new();
    let id = RecurrenceService::create(&templates, monthly_rent(at(2025, 1, 1))).unwrap();
    let engine = RecurringEngine::default();

    engine.process(&user(), &ledger, &templates, at(2025, 2, 1)).unwrap();
    assert!(!RecurrenceService::toggle_active(&templates, id).unwrap());
    let paused = engine.process(&user(), &ledger, &templates, at(2025, 4, 1)).unwrap();
    assert_eq!(paused.created_count, 0);

    assert!(RecurrenceService::toggle_active(&templates, id).unwrap());
    let resumed = engine.process(&user(), &ledger, &templates, at(2025, 4, 1)).unwrap();
    assert_eq!(resumed.created_count, 2);
    assert_eq!(ledger.list().unwrap().len(), 4);
}

#[test]
fn editing_template_preserves_execution_state() {
    let templates = MemoryTemplateStore::new();
    let ledger = MemoryLedgerStore::new();
    let id = RecurrenceService::create(&templates, monthly_rent(at(2025, 1, 1))).unwrap();
    RecurringEngine::default()
        .process(&user(), &ledger, &templates, at(2025, 2, 15))
        .unwrap();

    let updated = RecurrenceService::update(
        &templates,
        id,
        TemplateDraft::new(TransactionKind::Expense, "Rent", 99_000, Frequency::Monthly, at(2025, 1, 20)),
    )
    .unwrap();
    assert_eq!(updated.last_execution, Some(at(2025, 2, 1)));
    assert!(updated.active);
    assert_eq!(ledger.list().unwrap().len(), 2);

    let snapshot = RecurrenceService::snapshots(&templates, at(2025, 2, 15)).unwrap();
    assert_eq!(snapshot[0].next_due, Some(at(2025, 3, 20)));
    assert_eq!(snapshot[0].overdue, 0);
}

#[test]
fn moving_start_date_never_charges_a_period_twice() {
    let templates = MemoryTemplateStore::new();
    let ledger = MemoryLedgerStore::new();
    let engine = RecurringEngine::default();
    let id = RecurrenceService::create(&templates, monthly_rent(at(2025, 1, 10))).unwrap();
    engine.process(&user(), &ledger, &templates, at(2025, 3, 12)).unwrap();

    RecurrenceService::update(&templates, id, monthly_rent(at(2025, 1, 20))).unwrap();
    let same_month = engine.process(&user(), &ledger, &templates, at(2025, 3, 25)).unwrap();
    assert_eq!(same_month.created_count, 0);

    let next_month = engine.process(&user(), &ledger, &templates, at(2025, 4, 25)).unwrap();
    assert_eq!(next_month.created_count, 1);

    let mut stamps: Vec<_> = ledger.list().unwrap().iter().map(|txn| txn.timestamp).collect();
    stamps.sort();
    assert_eq!(
        stamps,
        vec![at(2025, 1, 10), at(2025, 2, 10), at(2025, 3, 10), at(2025, 4, 20)]
    );
}

#[test]
fn invalid_template_never_reaches_the_store() {
    let templates = MemoryTemplateStore::new();
    let err = RecurrenceService::create(
        &templates,
        monthly_rent(at(2025, 3, 1)).with_end(at(2025, 2, 1)),
    )
    .expect_err("end before start must be rejected");
    assert!(matches!(err, CoreError::InvalidTemplate(_)));
    assert!(templates.list().unwrap().is_empty());

    let missing = RecurrenceService::toggle_active(&templates, 9).expect_err("unknown id");
    assert!(matches!(missing, CoreError::TemplateNotFound(9)));
}

#[test]
fn concurrent_process_calls_do_not_double_emit() {
    let ledger = Arc::new(MemoryLedgerStore::new());
    let templates = Arc::new(MemoryTemplateStore::new());
    RecurrenceService::create(
        templates.as_ref(),
        TemplateDraft::new(TransactionKind::Expense, "Snacks", 100, Frequency::Daily, at(2025, 1, 1)),
    )
    .unwrap();
    let engine = RecurringEngine::new(Arc::new(ProcessGuards::new()));
    let now = at(2025, 3, 1);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (engine, ledger, templates) =
                (engine.clone(), Arc::clone(&ledger), Arc::clone(&templates));
            std::thread::spawn(move || {
                engine
                    .process(&user(), ledger.as_ref(), templates.as_ref(), now)
                    .unwrap()
                    .created_count
            })
        })
        .collect();
    let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(created, 60);
    assert_eq!(ledger.list().unwrap().len(), 60);
}

#[test]
fn budget_boundaries_follow_strict_comparisons() {
    let budgets = MemoryBudgetStore::new();
    let ledger = MemoryLedgerStore::new();
    let evaluator = BudgetEvaluator::default();
    let now = at(2025, 6, 20);
    BudgetService::set_limit(&budgets, "Food", 1000).unwrap();
    ledger
        .append(TransactionDraft::new(TransactionKind::Expense, "Food", 899, at(2025, 6, 2)))
        .unwrap();

    let at_999 = evaluator.evaluate(&budgets, &ledger, "Food", 100, now).unwrap().unwrap();
    assert_eq!(at_999.severity, Severity::Warning);
    assert_eq!(at_999.delta, 1);

    let at_1000 = evaluator.evaluate(&budgets, &ledger, "Food", 101, now).unwrap().unwrap();
    assert_eq!(at_1000.severity, Severity::Warning);
    assert_eq!(at_1000.delta, 0);

    let at_1001 = evaluator.evaluate(&budgets, &ledger, "Food", 102, now).unwrap().unwrap();
    assert_eq!(at_1001.severity, Severity::Exceeded);
    assert_eq!(at_1001.delta, 1);

    let as_is = evaluator.evaluate(&budgets, &ledger, "Food", 0, now).unwrap();
    assert_eq!(as_is, None);
}

#[test]
fn evaluate_all_reports_exceeded_once_per_month() {
    let budgets = MemoryBudgetStore::new();
    let ledger = MemoryLedgerStore::new();
    let evaluator = BudgetEvaluator::default();
    BudgetService::set_limit(&budgets, "Food", 1000).unwrap();
    BudgetService::set_limit(&budgets, "Fuel", 100).unwrap();
    ledger
        .append(TransactionDraft::new(TransactionKind::Expense, "Food", 1001, at(2025, 6, 2)))
        .unwrap();
    ledger
        .append(TransactionDraft::new(TransactionKind::Expense, "Fuel", 95, at(2025, 6, 2)))
        .unwrap();

    let first = evaluator.evaluate_all(&budgets, &ledger, at(2025, 6, 3)).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].severity, Severity::Exceeded);
    assert_eq!(first[1].severity, Severity::Warning);

    let second = evaluator.evaluate_all(&budgets, &ledger, at(2025, 6, 4)).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].category, "Fuel");

    ledger
        .append(TransactionDraft::new(TransactionKind::Expense, "Food", 2000, at(2025, 7, 1)))
        .unwrap();
    let next_month = evaluator.evaluate_all(&budgets, &ledger, at(2025, 7, 2)).unwrap();
    assert!(next_month
        .iter()
        .any(|alert| alert.category == "Food" && alert.severity == Severity::Exceeded));
}

#[test]
fn forecast_divides_by_active_months_only() {
    let ledger = MemoryLedgerStore::new();
    for (amount, month) in [(300, 3), (600, 5)] {
        ledger
            .append(TransactionDraft::new(TransactionKind::Expense, "Travel", amount, at(2025, month, 12)))
            .unwrap();
    }
    for month in [3, 4, 5] {
        ledger
            .append(TransactionDraft::new(TransactionKind::Expense, "Food", 100, at(2025, month, 1)))
            .unwrap();
    }
    // Current month and income never count.
    ledger
        .append(TransactionDraft::new(TransactionKind::Expense, "Travel", 10_000, at(2025, 6, 1)))
        .unwrap();
    ledger
        .append(TransactionDraft::new(TransactionKind::Income, "Salary", 50_000, at(2025, 4, 1)))
        .unwrap();

    let report =
        ForecastService::forecast(&ledger.list().unwrap(), at(2025, 6, 15), DEFAULT_TRAILING_MONTHS);

    assert_eq!(report.predicted_for("Travel"), Some(450));
    assert_eq!(report.predicted_for("Food"), Some(100));
    assert_eq!(report.predicted_for("Salary"), None);
    assert_eq!(report.total, 550);
    assert_eq!(report.per_category[0].category, "Travel");
    assert_eq!(report.per_category[0].active_months, 2);
}

#[test]
fn forecast_orders_ties_by_name_and_handles_no_history() {
    let ledger = MemoryLedgerStore::new();
    for category in ["Zoo", "Art"] {
        ledger
            .append(TransactionDraft::new(TransactionKind::Expense, category, 70, at(2025, 5, 3)))
            .unwrap();
    }
    let report = ForecastService::forecast(&ledger.list().unwrap(), at(2025, 6, 1), 3);
    let names: Vec<_> = report.per_category.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(names, vec!["Art", "Zoo"]);

    let empty = ForecastService::forecast(&[], at(2025, 6, 1), 3);
    assert!(empty.is_empty());
    assert_eq!(empty.total, 0);
}
