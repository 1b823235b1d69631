//! Reminder Engine: owns the store, the clock and the dispatcher, and runs the due detector.
//! Uses tokio::interval for zero-overhead polling (sleeps between checks).
//!
//! User actions go through [`ReminderStore::update`] and detector ticks through the
//! versioned [`ReminderStore::replace`], so each one is a single whole-collection
//! replacement computed from the latest committed snapshot.

use std::sync::Arc;
use std::time::Duration;

use nudge_core::config::{NudgeConfig, StorageBackend};
use nudge_core::error::{NudgeError, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock};
use crate::dispatch::AlertDispatcher;
use crate::notify::{NotificationDispatcher, NotifyAction};
use crate::persistence::SqliteBackend;
use crate::reducer::{self, CompletionOutcome};
use crate::reminder::{Reminder, ReminderDraft, Summary};
use crate::store::{JsonFileBackend, ReminderBackend, ReminderStore};

/// What a single detector pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// IDs flagged notified in this pass.
    pub notified: Vec<String>,
    /// How many of those the dispatcher reported as failed.
    pub failed: usize,
}

/// The reminder engine.
pub struct ReminderEngine {
    store: Arc<ReminderStore>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    default_snooze_minutes: u32,
}

impl ReminderEngine {
    pub fn new(
        store: Arc<ReminderStore>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            clock,
            dispatcher,
            default_snooze_minutes: 10,
        }
    }

    /// Build an engine from config: storage backend, dispatcher, system clock.
    pub fn from_config(config: &NudgeConfig) -> Result<Self> {
        let dir = config.storage.resolved_path();
        let backend: Box<dyn ReminderBackend> = match config.storage.backend {
            StorageBackend::Json => Box::new(JsonFileBackend::new(&dir)),
            StorageBackend::Sqlite => Box::new(SqliteBackend::open_dir(&dir)?),
        };
        let engine = Self::new(
            Arc::new(ReminderStore::open(backend)),
            Arc::new(SystemClock),
            Arc::new(AlertDispatcher::from_config(&config.notify)),
        )
        .with_default_snooze(config.scheduler.default_snooze_minutes);
        Ok(engine)
    }

    /// Snooze length used by [`NotifyAction::Snooze`].
    pub fn with_default_snooze(mut self, minutes: u32) -> Self {
        self.default_snooze_minutes = minutes;
        self
    }

    pub fn store(&self) -> &Arc<ReminderStore> {
        &self.store
    }

    /// All reminders, in insertion order.
    pub fn list(&self) -> Arc<Vec<Reminder>> {
        self.store.reminders()
    }

    pub fn get(&self, id: &str) -> Option<Reminder> {
        self.store.reminders().iter().find(|r| r.id == id).cloned()
    }

    pub fn summary(&self) -> Summary {
        Summary::from_reminders(&self.store.reminders(), self.clock.now())
    }

    /// Add a reminder from a form submission.
    pub fn add(&self, draft: ReminderDraft) -> Result<Reminder> {
        let now = self.clock.now();
        let added = self.store.update(|current| reducer::apply_add(current, draft, now))?;
        tracing::info!("📅 Reminder added: '{}' due {} ({})", added.title, added.due_at, added.id);
        Ok(added)
    }

    /// Edit a reminder's user fields. Notification and snooze state are kept.
    pub fn update(&self, id: &str, draft: ReminderDraft) -> Result<Reminder> {
        let updated = self
            .store
            .update(|current| reducer::apply_update(current, id, draft))?;
        tracing::info!("✏️ Reminder updated: '{}' ({})", updated.title, updated.id);
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store
            .update(|current| Ok((reducer::apply_delete(current, id)?, ())))?;
        tracing::info!("🗑️ Reminder deleted: {id}");
        Ok(())
    }

    /// Remove every completed reminder. Returns how many were removed.
    pub fn clear_completed(&self) -> Result<usize> {
        let removed = self
            .store
            .update(|current| Ok(reducer::apply_clear_completed(current)))?;
        tracing::info!("🧹 Cleared {removed} completed reminders");
        Ok(removed)
    }

    /// Snooze a reminder for `minutes` from now.
    pub fn snooze(&self, id: &str, minutes: u32) -> Result<Reminder> {
        let now = self.clock.now();
        let snoozed = self.store.update(|current| {
            let next = reducer::apply_snooze(current, id, minutes, now)?;
            let snoozed = next.iter().find(|r| r.id == id).cloned();
            Ok((next, snoozed))
        })?;
        let snoozed = snoozed.ok_or_else(|| NudgeError::not_found(id))?;
        tracing::info!(
            "😴 Reminder snoozed: '{}' until {}",
            snoozed.title,
            snoozed.effective_due_at()
        );
        Ok(snoozed)
    }

    /// Toggle completion; completing a recurring reminder spawns its next instance.
    pub fn toggle_complete(&self, id: &str) -> Result<CompletionOutcome> {
        let now = self.clock.now();
        let outcome = self.store.update(|current| {
            let outcome = reducer::apply_completion(current, id, now)?;
            Ok((outcome.reminders.clone(), outcome))
        })?;
        if outcome.completed {
            tracing::info!("✅ Reminder completed: {id}");
        } else {
            tracing::info!("↩️ Reminder reopened: {id}");
        }
        if let Some(next) = &outcome.spawned {
            tracing::info!(
                "🔁 Next '{}' ({}) scheduled for {}",
                next.title,
                next.recurrence_rule,
                next.due_at
            );
        }
        Ok(outcome)
    }

    /// Route a clicked notification button back into the engine.
    pub fn handle_action(&self, id: &str, action: NotifyAction) -> Result<()> {
        match action {
            NotifyAction::Complete => {
                let reminder = self.get(id).ok_or_else(|| NudgeError::not_found(id))?;
                // A second click on "Complete" must not reopen the reminder.
                if !reminder.completed {
                    self.toggle_complete(id)?;
                }
                Ok(())
            }
            NotifyAction::Snooze => self.snooze(id, self.default_snooze_minutes).map(|_| ()),
        }
    }

    /// One detector pass: flag every due reminder in one replacement, then dispatch.
    ///
    /// The collection is committed before dispatching so a slow or failing
    /// dispatcher can never cause a second notification for the same due instant.
    /// If a user action lands between the snapshot and the write, the pass is
    /// recomputed from the newer snapshot.
    pub fn tick(&self) -> TickReport {
        let (due, now) = loop {
            let snapshot = self.store.snapshot();
            let now = self.clock.now();
            let outcome = reducer::apply_tick(&snapshot.reminders, now);
            if outcome.due.is_empty() {
                return TickReport::default();
            }
            match self.store.replace(snapshot.version, outcome.reminders) {
                Ok(_) => break (outcome.due, now),
                Err(e) => tracing::debug!("🔄 Tick snapshot outdated, recomputing: {e}"),
            }
        };

        let mut report = TickReport::default();
        for reminder in &due {
            tracing::info!("🔔 Reminder due: '{}' ({})", reminder.title, reminder.id);
            if let Err(e) = self.dispatcher.dispatch(reminder) {
                tracing::warn!("⚠️ Dispatch failed for '{}': {e}", reminder.title);
                report.failed += 1;
            }
            report.notified.push(reminder.id.clone());
        }
        tracing::debug!("⏱️ Tick at {now}: {} due", report.notified.len());
        report
    }

    /// Wait for background deliveries (webhook sends) started by earlier ticks.
    /// Hosts call this before their runtime shuts down.
    pub async fn flush(&self) {
        for task in self.dispatcher.take_pending() {
            if let Err(e) = task.await {
                tracing::warn!("⚠️ Background delivery ended abnormally: {e}");
            }
        }
    }
}

/// Handle to a running detector loop.
pub struct DetectorHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DetectorHandle {
    /// Stop the loop and wait for it to exit. An in-flight tick runs to completion.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::warn!("⚠️ Detector task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Shortest period the detector accepts; shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn the due detector as a background tokio task, ticking every `every`.
/// The first tick fires immediately.
pub fn spawn_detector(engine: Arc<ReminderEngine>, every: Duration) -> DetectorHandle {
    let every = every.max(MIN_POLL_INTERVAL);
    let (shutdown, mut stop) = watch::channel(false);
    tracing::info!("⏰ Due detector started (check every {:?})", every);

    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    engine.tick();
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("⏹️ Due detector stopped");
    });

    DetectorHandle { shutdown, join }
}
