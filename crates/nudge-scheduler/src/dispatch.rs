//! Notification dispatch: turns a due reminder into an audible cue plus notifications.
//! Supports: console, HTTP webhook, terminal bell. Delivery failures are swallowed here;
//! they never change a reminder's logical state.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use nudge_core::config::NotifyConfig;

use crate::notify::{
    AudioCue, Notification, NotificationDispatcher, Notifier, NotifyAction, NotifyRouter,
    Permission,
};
use crate::reminder::{Priority, Reminder};
use tokio::task::JoinHandle;

/// Default dispatcher: one audio cue, any number of notifiers, bounded history.
pub struct AlertDispatcher {
    audio: Option<Box<dyn AudioCue>>,
    tone_frequency_hz: u32,
    tone_duration_ms: u32,
    notifiers: Vec<Box<dyn Notifier>>,
    history: Mutex<NotifyRouter>,
}

impl AlertDispatcher {
    pub fn new(history_limit: usize) -> Self {
        Self {
            audio: None,
            tone_frequency_hz: 880,
            tone_duration_ms: 200,
            notifiers: Vec::new(),
            history: Mutex::new(NotifyRouter::new(history_limit)),
        }
    }

    /// Build from the `[notify]` config section.
    pub fn from_config(config: &NotifyConfig) -> Self {
        let mut dispatcher = Self::new(config.history_limit);
        if config.audio_enabled {
            dispatcher = dispatcher.with_audio(
                Box::new(TerminalBell),
                config.tone_frequency_hz,
                config.tone_duration_ms,
            );
        }
        if config.console_enabled {
            dispatcher = dispatcher.with_notifier(Box::new(ConsoleNotifier));
        }
        if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
            dispatcher = dispatcher.with_notifier(Box::new(WebhookNotifier::new(url)));
        }
        dispatcher
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioCue>, frequency_hz: u32, duration_ms: u32) -> Self {
        self.audio = Some(audio);
        self.tone_frequency_hz = frequency_hz;
        self.tone_duration_ms = duration_ms;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Snapshot of recently shown notifications, oldest first.
    pub fn history(&self) -> Vec<Notification> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history()
            .cloned()
            .collect()
    }

    /// Names of the configured notifiers.
    pub fn notifier_names(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.name().to_string()).collect()
    }

    fn tone_for(&self, priority: Priority) -> u32 {
        match priority {
            Priority::High => self.tone_frequency_hz.saturating_mul(3) / 2,
            Priority::Normal => self.tone_frequency_hz,
            Priority::Low => self.tone_frequency_hz.saturating_mul(3) / 4,
        }
    }
}

impl NotificationDispatcher for AlertDispatcher {
    fn dispatch(&self, reminder: &Reminder) -> Result<(), String> {
        let notification = Notification::for_reminder(reminder);

        if let Some(audio) = &self.audio {
            let hz = self.tone_for(reminder.priority);
            if let Err(e) = audio.play_tone(hz, self.tone_duration_ms) {
                tracing::debug!("🔇 Audio cue failed for '{}': {e}", reminder.title);
            }
        }

        for notifier in &self.notifiers {
            let permission = match notifier.permission() {
                Permission::Prompt => notifier.request_permission(),
                other => other,
            };
            if permission != Permission::Granted {
                tracing::debug!(
                    "🚫 {} notifications not permitted, skipping '{}'",
                    notifier.name(),
                    reminder.title
                );
                continue;
            }
            if let Err(e) = notifier.show(&notification) {
                tracing::warn!("⚠️ {} notification failed for '{}': {e}", notifier.name(), reminder.title);
            }
        }

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(notification);
        Ok(())
    }

    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        self.notifiers.iter().flat_map(|n| n.take_pending()).collect()
    }
}

/// Prints notifications to stdout with their action buttons.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, notification: &Notification) -> Result<(), String> {
        let marker = match notification.priority {
            Priority::High => "⚠️",
            Priority::Normal => "🔔",
            Priority::Low => "ℹ️",
        };
        let actions: Vec<String> = notification
            .actions
            .iter()
            .map(|a| format!("[{}]", a.label()))
            .collect();
        let mut out = std::io::stdout().lock();
        writeln!(
            out,
            "{marker} {} — {}  {}  (id: {})",
            notification.title,
            notification.body,
            actions.join(" "),
            notification.reminder_id
        )
        .map_err(|e| format!("stdout: {e}"))
    }
}

/// Generic HTTP webhook. POSTs each notification as JSON.
/// The request is spawned on the current tokio runtime; its handle is kept
/// until collected through [`Notifier::take_pending`].
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            in_flight: Mutex::new(Vec::new()),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, notification: &Notification) -> Result<(), String> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| "no async runtime to send webhook".to_string())?;
        let payload = serde_json::json!({
            "reminderId": notification.reminder_id,
            "title": notification.title,
            "body": notification.body,
            "priority": notification.priority,
            "dueAt": crate::reminder::wall_clock::format(&notification.due_at),
            "actions": notification.actions.iter().map(NotifyAction::label).collect::<Vec<_>>(),
            "timestamp": notification.timestamp.to_rfc3339(),
        });
        let request = self
            .client
            .post(&self.url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(10));
        let url = self.url.clone();
        let title = notification.title.clone();

        let task = handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("✅ Webhook notification sent to {url}: {title}");
                }
                Ok(resp) => {
                    tracing::warn!("⚠️ Webhook error {} from {url}", resp.status());
                }
                Err(e) => {
                    tracing::warn!("⚠️ Webhook send failed: {e}");
                }
            }
        });
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|t| !t.is_finished());
        in_flight.push(task);
        Ok(())
    }

    fn take_pending(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Rings the terminal bell. The frequency and duration are only logged;
/// a terminal cannot synthesize a tone.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play_tone(&self, frequency_hz: u32, duration_ms: u32) -> Result<(), String> {
        tracing::debug!("🔊 Tone {frequency_hz}Hz for {duration_ms}ms");
        let mut err = std::io::stderr().lock();
        err.write_all(b"\x07")
            .and_then(|_| err.flush())
            .map_err(|e| format!("stderr: {e}"))
    }
}

/// No sound at all.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioCue for SilentAudio {
    fn play_tone(&self, _frequency_hz: u32, _duration_ms: u32) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderDraft;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn reminder(priority: Priority) -> Reminder {
        let due = NaiveDate::from_ymd_opt(2024, 2, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Reminder::from_draft(ReminderDraft::new("Standup", due).with_priority(priority), due)
            .unwrap()
    }

    /// Notifier that records what it was asked to show.
    struct Recorder {
        permission: Permission,
        after_request: Permission,
        fail: bool,
        shown: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn permission(&self) -> Permission {
            self.permission
        }
        fn request_permission(&self) -> Permission {
            self.after_request
        }
        fn show(&self, n: &Notification) -> Result<(), String> {
            if self.fail {
                return Err("unsupported".into());
            }
            self.shown.lock().unwrap().push(n.title.clone());
            Ok(())
        }
    }

    struct Tones(Arc<Mutex<Vec<(u32, u32)>>>);

    impl AudioCue for Tones {
        fn play_tone(&self, hz: u32, ms: u32) -> Result<(), String> {
            self.0.lock().unwrap().push((hz, ms));
            Err("no audio device".into())
        }
    }

    fn recorder(permission: Permission, after_request: Permission, fail: bool) -> (Recorder, Arc<Mutex<Vec<String>>>) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                permission,
                after_request,
                fail,
                shown: shown.clone(),
            },
            shown,
        )
    }

    #[test]
    fn test_dispatch_plays_tone_and_shows() {
        let tones = Arc::new(Mutex::new(Vec::new()));
        let (rec, shown) = recorder(Permission::Granted, Permission::Granted, false);
        let dispatcher = AlertDispatcher::new(10)
            .with_audio(Box::new(Tones(tones.clone())), 880, 200)
            .with_notifier(Box::new(rec));

        // Audio failure is swallowed.
        assert!(dispatcher.dispatch(&reminder(Priority::High)).is_ok());
        assert_eq!(*tones.lock().unwrap(), vec![(1320, 200)]);
        assert_eq!(*shown.lock().unwrap(), vec!["Standup".to_string()]);
        assert_eq!(dispatcher.history().len(), 1);
    }

    #[test]
    fn test_denied_permission_skips_notifier() {
        let (denied, denied_shown) = recorder(Permission::Denied, Permission::Denied, false);
        let (prompt, prompt_shown) = recorder(Permission::Prompt, Permission::Granted, false);
        let dispatcher = AlertDispatcher::new(10)
            .with_notifier(Box::new(denied))
            .with_notifier(Box::new(prompt));

        assert!(dispatcher.dispatch(&reminder(Priority::Normal)).is_ok());
        assert!(denied_shown.lock().unwrap().is_empty());
        assert_eq!(prompt_shown.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failing_notifier_does_not_block_others() {
        let (broken, _) = recorder(Permission::Granted, Permission::Granted, true);
        let (ok, shown) = recorder(Permission::Granted, Permission::Granted, false);
        let dispatcher = AlertDispatcher::new(10)
            .with_notifier(Box::new(broken))
            .with_notifier(Box::new(ok));
        assert!(dispatcher.dispatch(&reminder(Priority::Low)).is_ok());
        assert_eq!(shown.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_from_config() {
        let mut config = NotifyConfig::default();
        config.webhook_url = Some("http://127.0.0.1:9/hook".into());
        let dispatcher = AlertDispatcher::from_config(&config);
        assert_eq!(dispatcher.notifier_names(), vec!["console", "webhook"]);
        assert!(dispatcher.audio.is_some());

        config.console_enabled = false;
        config.audio_enabled = false;
        config.webhook_url = None;
        let dispatcher = AlertDispatcher::from_config(&config);
        assert!(dispatcher.notifier_names().is_empty());
        assert!(dispatcher.audio.is_none());
    }

    #[test]
    fn test_webhook_without_runtime_reports_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook");
        let n = Notification::for_reminder(&reminder(Priority::Normal));
        assert!(notifier.show(&n).is_err());
    }

    #[test]
    fn test_silent_audio() {
        assert!(SilentAudio.play_tone(440, 100).is_ok());
    }
}
