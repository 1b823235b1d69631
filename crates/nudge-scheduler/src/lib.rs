//! # Nudge Scheduler
//!
//! Recurring reminder and notification engine for the dashboard's reminder widget.
//!
//! ## Design Principles
//! - One shared collection, replaced as a whole on every mutation
//! - Pure reducers (`apply_tick`, `apply_snooze`, `apply_completion`) with no hidden state
//! - Tokio interval for polling, injectable clock for tests
//! - Delivery behind traits; failures never change logical due state
//!
//! ## Architecture
//! ```text
//! DueDetector (tokio interval, default 30s)
//!   └── tick → apply_tick → ReminderStore::replace (one write)
//!                └── NotificationDispatcher per due reminder
//!                      ├── AudioCue   (terminal bell)
//!                      ├── Console    (stdout, [Complete] [Snooze])
//!                      └── Webhook    (HTTP POST, spawned)
//!
//! User actions
//!   ├── snooze    → apply_snooze     (snoozeUntil = now + N min, notified = false)
//!   ├── complete  → apply_completion (recurring → next instance appended)
//!   └── add / edit / delete / clear completed
//!
//! ReminderStore → JSON file | SQLite | memory
//! ```

pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod notify;
pub mod persistence;
pub mod recurrence;
pub mod reducer;
pub mod reminder;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{AlertDispatcher, ConsoleNotifier, SilentAudio, TerminalBell, WebhookNotifier};
pub use engine::{DetectorHandle, ReminderEngine, TickReport, spawn_detector};
pub use notify::{
    AudioCue, Notification, NotificationDispatcher, Notifier, NotifyAction, NotifyRouter,
    Permission,
};
pub use persistence::SqliteBackend;
pub use recurrence::next_occurrence;
pub use reducer::{CompletionOutcome, TickOutcome};
pub use reminder::{Priority, RecurrenceRule, Reminder, ReminderDraft, ReminderStatus, Summary};
pub use store::{JsonFileBackend, MemoryBackend, ReminderBackend, ReminderStore, Snapshot};
