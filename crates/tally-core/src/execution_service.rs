//! Materializes due recurring occurrences into the ledger.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tally_domain::{due_occurrences, RecurringTemplate, TemplateId, UserId};

use crate::{
    storage::{LedgerStore, TemplateStore},
    CoreError,
};

/// Registry of per-user guards serializing recurring processing.
///
/// Share one registry (behind an `Arc`) between every tracker that can touch the
/// same user's templates. Different users get different guards and never block
/// each other.
#[derive(Debug, Default)]
pub struct ProcessGuards {
    guards: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl ProcessGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the guard for `user`, creating it on first use.
    pub fn guard_for(&self, user: &UserId) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guards.entry(user.clone()).or_default())
    }

    /// Runs `f` while holding the guard for `user`.
    pub fn with_guard<T>(&self, user: &UserId, f: impl FnOnce() -> T) -> T {
        let guard = self.guard_for(user);
        // Guards carry no data; poisoning is ignored.
        let _held = guard.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

/// A template whose batch stopped early.
#[derive(Debug)]
pub struct TemplateFailure {
    pub template_id: TemplateId,
    /// Entries written for this template before the failure.
    pub created: usize,
    pub error: CoreError,
}

/// Outcome of one [`RecurringEngine::process`] run.
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub created_count: usize,
    pub failures: Vec<TemplateFailure>,
}

impl ProcessReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Executes recurring templates against a ledger.
#[derive(Debug, Clone, Default)]
pub struct RecurringEngine {
    guards: Arc<ProcessGuards>,
}

impl RecurringEngine {
    pub fn new(guards: Arc<ProcessGuards>) -> Self {
        Self { guards }
    }

    pub fn guards(&self) -> &Arc<ProcessGuards> {
        &self.guards
    }

    /// Writes one ledger entry per due occurrence of every template owned by
    /// `user`, then advances each template's `last_execution`.
    ///
    /// Calling again with the same `now` creates nothing. A failed write stops
    /// that template only; `last_execution` then points at the last entry that
    /// was actually written so the missed occurrence is retried next run.
    pub fn process(
        &self,
        user: &UserId,
        ledger: &dyn LedgerStore,
        templates: &dyn TemplateStore,
        now: DateTime<Utc>,
    ) -> Result<ProcessReport, CoreError> {
        self.guards.with_guard(user, || {
            let mut report = ProcessReport::default();
            for template in templates.list()? {
                let run = execute_template(&template, ledger, templates, now);
                report.created_count += run.created;
                if let Some(error) = run.error {
                    report.failures.push(TemplateFailure {
                        template_id: template.id,
                        created: run.created,
                        error,
                    });
                }
            }
            info!(
                user = %user,
                created = report.created_count,
                failed = report.failures.len(),
                "processed recurring templates"
            );
            Ok(report)
        })
    }
}

struct TemplateRun {
    created: usize,
    error: Option<CoreError>,
}

fn execute_template(
    template: &RecurringTemplate,
    ledger: &dyn LedgerStore,
    templates: &dyn TemplateStore,
    now: DateTime<Utc>,
) -> TemplateRun {
    let mut run = TemplateRun {
        created: 0,
        error: None,
    };
    let mut last_written = None;

    for instant in due_occurrences(template, now) {
        match ledger.append(template.draft_for(instant)) {
            Ok(id) => {
                debug!(template = template.id, transaction = id, at = %instant, "recurring entry written");
                run.created += 1;
                last_written = Some(instant);
            }
            Err(err) => {
                warn!(template = template.id, at = %instant, error = %err, "recurring entry write failed");
                run.error = Some(err);
                break;
            }
        }
    }

    if let Some(last) = last_written {
        let mut advanced = template.clone();
        advanced.last_execution = Some(last);
        if let Err(err) = templates.save(&advanced) {
            warn!(template = template.id, error = %err, "failed to advance last execution");
            run.error.get_or_insert(err);
        }
    }
    run
}
