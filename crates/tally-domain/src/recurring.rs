//! Recurring templates and the recurrence calculator.
//!
//! Occurrence `n` of a template is always computed from `start_date` shifted by
//! `n` periods, so clamped month ends do not drift (Jan 31, Feb 28, Mar 31, ...).
//! Both execution and "next due" display go through [`due_occurrences`] and
//! [`next_occurrence`]; there is no other schedule arithmetic in the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Frequency, TemplateId, TransactionKind};
use crate::transaction::TransactionDraft;

/// Blueprint for periodic generation of ledger entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurringTemplate {
    pub id: TemplateId,
    pub kind: TransactionKind,
    pub category: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frequency: Frequency,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    /// Most recently generated occurrence; `None` means never executed.
    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,
}

impl RecurringTemplate {
    /// Builds a fresh, active, never-executed template from a validated draft.
    pub fn from_draft(id: TemplateId, draft: TemplateDraft) -> Self {
        Self {
            id,
            kind: draft.kind,
            category: draft.category,
            amount: draft.amount,
            description: draft.description,
            frequency: draft.frequency,
            start_date: draft.start_date,
            end_date: draft.end_date,
            active: true,
            last_execution: None,
        }
    }

    /// Replaces the user-editable fields. `active` and `last_execution` survive.
    pub fn apply_draft(&mut self, draft: TemplateDraft) {
        self.kind = draft.kind;
        self.category = draft.category;
        self.amount = draft.amount;
        self.description = draft.description;
        self.frequency = draft.frequency;
        self.start_date = draft.start_date;
        self.end_date = draft.end_date;
    }

    /// Occurrence number `index`, counting `start_date` as zero.
    pub fn occurrence(&self, index: u32) -> Option<DateTime<Utc>> {
        self.frequency.advance(self.start_date, index)
    }

    fn within_end(&self, instant: DateTime<Utc>) -> bool {
        self.end_date.map_or(true, |end| instant <= end)
    }

    /// Ledger entry for the occurrence at `instant`.
    pub fn draft_for(&self, instant: DateTime<Utc>) -> TransactionDraft {
        TransactionDraft {
            kind: self.kind,
            category: self.category.clone(),
            amount: self.amount,
            description: self.description.clone(),
            timestamp: instant,
            template_id: Some(self.id),
        }
    }

    /// Iterates occurrences not yet covered by the last execution, bounded only
    /// by `end_date`.
    ///
    /// Occurrences stay anchored to `start_date`, but none may land less than
    /// one period after `last_execution`, so moving the start never charges a
    /// period twice.
    fn pending(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        let (first_index, floor) = match self.last_execution {
            Some(last) => (
                self.frequency
                    .periods_between(self.start_date, last)
                    .saturating_sub(1),
                Some(
                    self.frequency
                        .advance(last, 1)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                ),
            ),
            None => (0, None),
        };
        (first_index..=u32::MAX)
            .map_while(move |index| self.occurrence(index))
            .skip_while(move |instant| floor.map_or(false, |floor| *instant < floor))
            .take_while(move |instant| self.within_end(*instant))
    }
}

/// Returns every occurrence of `template` that is due at `now` and has not been
/// executed yet, in strictly increasing order.
///
/// Inactive templates and templates whose `start_date` is after `now` yield
/// nothing. An empty result is the normal steady state.
pub fn due_occurrences(template: &RecurringTemplate, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    if !template.active || now < template.start_date {
        return Vec::new();
    }
    template
        .pending()
        .take_while(|instant| *instant <= now)
        .collect()
}

/// The next occurrence that has not been executed, regardless of `now` or the
/// `active` flag. `None` once the schedule has passed `end_date`.
pub fn next_occurrence(template: &RecurringTemplate) -> Option<DateTime<Utc>> {
    template.pending().next()
}

/// User-supplied template fields, validated before they reach the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateDraft {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: u64,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TemplateDraft {
    pub fn new(
        kind: TransactionKind,
        category: impl Into<String>,
        amount: u64,
        frequency: Frequency,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            amount,
            description: None,
            frequency,
            start_date,
            end_date: None,
        }
    }

    pub fn with_end(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Trims the category and checks date ordering.
    pub fn validate(mut self) -> Result<Self, TemplateValidationError> {
        let category = self.category.trim();
        if category.is_empty() {
            return Err(TemplateValidationError::EmptyCategory);
        }
        self.category = category.to_string();
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(TemplateValidationError::EndBeforeStart);
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateValidationError {
    EmptyCategory,
    EndBeforeStart,
}

impl fmt::Display for TemplateValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValidationError::EmptyCategory => f.write_str("category must not be empty"),
            TemplateValidationError::EndBeforeStart => {
                f.write_str("end date must not be before start date")
            }
        }
    }
}

impl std::error::Error for TemplateValidationError {}
