//! Pure reducers over the reminder collection.
//!
//! Each function takes the current collection and returns a brand-new one; the
//! store swaps it in as a whole. None of them touch the clock, the store or the
//! dispatcher.

use chrono::{Duration, NaiveDateTime};
use nudge_core::error::{NudgeError, Result};

use crate::reminder::{Reminder, ReminderDraft};

/// Result of one detector pass.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// Collection with `notified` set on every reminder in `due`.
    pub reminders: Vec<Reminder>,
    /// Reminders that became due in this pass, already flagged.
    pub due: Vec<Reminder>,
}

/// Result of toggling a reminder's completion.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub reminders: Vec<Reminder>,
    /// Completion state after the toggle.
    pub completed: bool,
    /// Follow-up instance appended for recurring reminders.
    pub spawned: Option<Reminder>,
}

/// Flag every due, unnotified reminder as notified.
pub fn apply_tick(reminders: &[Reminder], now: NaiveDateTime) -> TickOutcome {
    let mut due = Vec::new();
    let reminders = reminders
        .iter()
        .map(|r| {
            let mut next = r.clone();
            if r.is_due(now) {
                next.notified = true;
                due.push(next.clone());
            }
            next
        })
        .collect();
    TickOutcome { reminders, due }
}

/// Push the effective due time `minutes` into the future and re-arm notification.
pub fn apply_snooze(
    reminders: &[Reminder],
    id: &str,
    minutes: u32,
    now: NaiveDateTime,
) -> Result<Vec<Reminder>> {
    if minutes == 0 {
        return Err(NudgeError::validation("snooze must be at least one minute"));
    }
    let target = find(reminders, id)?;
    if target.completed {
        return Err(NudgeError::validation(format!(
            "reminder '{id}' is completed and cannot be snoozed"
        )));
    }
    let until = now + Duration::minutes(i64::from(minutes));
    Ok(map_one(reminders, id, |r| {
        r.snooze_until = Some(until);
        r.notified = false;
    }))
}

/// Toggle completion. Completing a recurring reminder appends its next instance;
/// un-completing never removes an instance spawned earlier.
pub fn apply_completion(
    reminders: &[Reminder],
    id: &str,
    now: NaiveDateTime,
) -> Result<CompletionOutcome> {
    let target = find(reminders, id)?;
    let completed = !target.completed;
    let spawned = if completed {
        target.next_instance(now)
    } else {
        None
    };

    let mut next = map_one(reminders, id, |r| r.completed = completed);
    if let Some(instance) = &spawned {
        next.push(instance.clone());
    }
    Ok(CompletionOutcome {
        reminders: next,
        completed,
        spawned,
    })
}

/// Append a new reminder built from `draft`.
pub fn apply_add(
    reminders: &[Reminder],
    draft: ReminderDraft,
    now: NaiveDateTime,
) -> Result<(Vec<Reminder>, Reminder)> {
    let reminder = Reminder::from_draft(draft, now)?;
    let mut next = reminders.to_vec();
    next.push(reminder.clone());
    Ok((next, reminder))
}

/// Replace the editable fields of one reminder.
pub fn apply_update(
    reminders: &[Reminder],
    id: &str,
    draft: ReminderDraft,
) -> Result<(Vec<Reminder>, Reminder)> {
    let mut updated = find(reminders, id)?.clone();
    updated.apply_draft(draft)?;
    let next = reminders
        .iter()
        .map(|r| if r.id == id { updated.clone() } else { r.clone() })
        .collect();
    Ok((next, updated))
}

/// Remove one reminder.
pub fn apply_delete(reminders: &[Reminder], id: &str) -> Result<Vec<Reminder>> {
    find(reminders, id)?;
    Ok(reminders.iter().filter(|r| r.id != id).cloned().collect())
}

/// Remove every completed reminder. Returns the new collection and how many were dropped.
pub fn apply_clear_completed(reminders: &[Reminder]) -> (Vec<Reminder>, usize) {
    let kept: Vec<Reminder> = reminders.iter().filter(|r| !r.completed).cloned().collect();
    let removed = reminders.len() - kept.len();
    (kept, removed)
}

fn find<'a>(reminders: &'a [Reminder], id: &str) -> Result<&'a Reminder> {
    reminders
        .iter()
        .find(|r| r.id == id)
        .ok_or_else(|| NudgeError::not_found(id))
}

fn map_one<F>(reminders: &[Reminder], id: &str, mut edit: F) -> Vec<Reminder>
where
    F: FnMut(&mut Reminder),
{
    reminders
        .iter()
        .map(|r| {
            let mut next = r.clone();
            if r.id == id {
                edit(&mut next);
            }
            next
        })
        .collect()
}
