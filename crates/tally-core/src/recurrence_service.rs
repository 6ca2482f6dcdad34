//! Services related to recurring template maintenance.

use chrono::{DateTime, Utc};
use tracing::info;

use tally_domain::{due_occurrences, next_occurrence, RecurringTemplate, TemplateDraft, TemplateId};

use crate::{storage::TemplateStore, CoreError};

/// Provides validated helpers for creating and editing recurring templates.
pub struct RecurrenceService;

impl RecurrenceService {
    /// Validates and stores a new template. It starts active and never executed.
    pub fn create(store: &dyn TemplateStore, draft: TemplateDraft) -> Result<TemplateId, CoreError> {
        let draft = draft.validate()?;
        let id = store.insert(draft)?;
        info!(template = id, "recurring template created");
        Ok(id)
    }

    /// Replaces the editable fields of a template.
    ///
    /// `active` and `last_execution` are preserved, so moving the start date
    /// only changes which future occurrences are computed.
    pub fn update(
        store: &dyn TemplateStore,
        id: TemplateId,
        draft: TemplateDraft,
    ) -> Result<RecurringTemplate, CoreError> {
        let draft = draft.validate()?;
        let mut template = store.get(id)?;
        template.apply_draft(draft);
        store.save(&template)?;
        Ok(template)
    }

    /// Flips the `active` flag and returns the new value.
    pub fn toggle_active(store: &dyn TemplateStore, id: TemplateId) -> Result<bool, CoreError> {
        let mut template = store.get(id)?;
        template.active = !template.active;
        store.save(&template)?;
        info!(template = id, active = template.active, "recurring template toggled");
        Ok(template.active)
    }

    pub fn delete(store: &dyn TemplateStore, id: TemplateId) -> Result<(), CoreError> {
        store.delete(id)
    }

    /// Lists every template with its schedule position at `now`, ordered by the
    /// next due instant (finished schedules last).
    pub fn snapshots(
        store: &dyn TemplateStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecurrenceSnapshot>, CoreError> {
        let mut snapshots: Vec<_> = store
            .list()?
            .into_iter()
            .map(|template| RecurrenceSnapshot::at(template, now))
            .collect();
        snapshots.sort_by_key(|snap| (snap.next_due.is_none(), snap.next_due, snap.template.id));
        Ok(snapshots)
    }
}

/// Schedule view of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceSnapshot {
    pub template: RecurringTemplate,
    /// Next occurrence not yet executed, `None` once past the end date.
    pub next_due: Option<DateTime<Utc>>,
    /// Occurrences that would be written if processing ran at `now`.
    pub overdue: usize,
}

impl RecurrenceSnapshot {
    pub fn at(template: RecurringTemplate, now: DateTime<Utc>) -> Self {
        let next_due = next_occurrence(&template);
        let overdue = due_occurrences(&template, now).len();
        Self {
            template,
            next_due,
            overdue,
        }
    }
}
