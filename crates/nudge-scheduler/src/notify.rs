//! Notification contracts: what the detector hands off and what delivery adapters implement.
//! Lightweight: no queues. A dispatcher is called once per due reminder and returns immediately.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::task::JoinHandle;

use crate::reminder::{Priority, Reminder};

/// Consumed by the due detector. Called once per due reminder per tick.
///
/// Implementations must not block: anything slow is spawned. An `Err` is logged
/// by the detector and never affects other reminders or the `notified` flag.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, reminder: &Reminder) -> Result<(), String>;

    /// Hand over deliveries still running in the background, so a host can
    /// await them before its runtime shuts down.
    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        Vec::new()
    }
}

/// Visual/system notification surface.
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Current permission state.
    fn permission(&self) -> Permission;

    /// Ask for permission. Returns the resulting state.
    fn request_permission(&self) -> Permission;

    /// Show a notification. Must return quickly.
    fn show(&self, notification: &Notification) -> Result<(), String>;

    /// Background sends started by `show` that have not been collected yet.
    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        Vec::new()
    }
}

/// Audible cue.
pub trait AudioCue: Send + Sync {
    fn play_tone(&self, frequency_hz: u32, duration_ms: u32) -> Result<(), String>;
}

/// Permission state of a notification surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; the dispatcher asks on first use.
    Prompt,
}

/// Buttons offered on a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyAction {
    Complete,
    Snooze,
}

impl NotifyAction {
    pub fn label(&self) -> &'static str {
        match self {
            NotifyAction::Complete => "Complete",
            NotifyAction::Snooze => "Snooze",
        }
    }
}

/// A notification to show to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Reminder this notification is about; action clicks route back by this ID.
    pub reminder_id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// Effective due time that fired.
    pub due_at: NaiveDateTime,
    pub actions: Vec<NotifyAction>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Build the standard notification for a due reminder.
    pub fn for_reminder(reminder: &Reminder) -> Self {
        let due_at = reminder.effective_due_at();
        let body = match &reminder.description {
            Some(description) => description.clone(),
            None => format!("Due {} · {}", due_at.format("%a %d %b %H:%M"), reminder.category),
        };
        Self {
            reminder_id: reminder.id.clone(),
            title: reminder.title.clone(),
            body,
            priority: reminder.priority,
            due_at,
            actions: vec![NotifyAction::Complete, NotifyAction::Snooze],
            timestamp: Utc::now(),
        }
    }
}

/// Bounded history of shown notifications (ring buffer).
#[derive(Debug)]
pub struct NotifyRouter {
    history: VecDeque<Notification>,
    limit: usize,
}

impl NotifyRouter {
    pub fn new(limit: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(limit.min(128)),
            limit: limit.max(1),
        }
    }

    /// Record a sent notification, evicting the oldest past the limit.
    pub fn record(&mut self, notification: Notification) {
        self.history.push_back(notification);
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Notification> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for NotifyRouter {
    fn default() -> Self {
        Self::new(100)
    }
}
