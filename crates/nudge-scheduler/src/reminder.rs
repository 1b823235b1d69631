//! Reminder definitions: the core data model for the engine.
//!
//! Timestamps are local wall-clock (`NaiveDateTime`); the engine never
//! converts between zones once a value has been loaded.

use chrono::NaiveDateTime;
use nudge_core::error::{NudgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::recurrence;

/// A single reminder row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Opaque unique ID, never changes after creation.
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base schedule anchor.
    #[serde(with = "wall_clock")]
    pub due_at: NaiveDateTime,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub recurrence_rule: RecurrenceRule,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    /// Set once a notification fired for the current due instant.
    #[serde(default)]
    pub notified: bool,
    /// Overrides `due_at` as the effective due time while present.
    #[serde(
        default,
        with = "wall_clock::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub snooze_until: Option<NaiveDateTime>,
    #[serde(with = "wall_clock")]
    pub created_at: NaiveDateTime,
}

fn default_category() -> String {
    "general".into()
}

/// Recurrence schedule attached to a reminder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceRule {
    #[default]
    None,
    Daily,
    Weekdays,
    Weekends,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl RecurrenceRule {
    pub const ALL: [RecurrenceRule; 8] = [
        RecurrenceRule::None,
        RecurrenceRule::Daily,
        RecurrenceRule::Weekdays,
        RecurrenceRule::Weekends,
        RecurrenceRule::Weekly,
        RecurrenceRule::Biweekly,
        RecurrenceRule::Monthly,
        RecurrenceRule::Yearly,
    ];

    pub fn is_recurring(&self) -> bool {
        *self != RecurrenceRule::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceRule::None => "none",
            RecurrenceRule::Daily => "daily",
            RecurrenceRule::Weekdays => "weekdays",
            RecurrenceRule::Weekends => "weekends",
            RecurrenceRule::Weekly => "weekly",
            RecurrenceRule::Biweekly => "biweekly",
            RecurrenceRule::Monthly => "monthly",
            RecurrenceRule::Yearly => "yearly",
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceRule {
    type Err = NudgeError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        RecurrenceRule::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| NudgeError::validation(format!("unknown recurrence rule '{s}'")))
    }
}

/// Display priority. Has no effect on scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = NudgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(NudgeError::validation(format!("unknown priority '{s}'"))),
        }
    }
}

/// Derived status. Never stored; computed from the flags and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    Pending,
    Notified,
    Snoozed,
    Completed,
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Notified => write!(f, "notified"),
            ReminderStatus::Snoozed => write!(f, "snoozed"),
            ReminderStatus::Completed => write!(f, "completed"),
        }
    }
}

/// User-editable fields, as submitted from the add/edit form.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_at: NaiveDateTime,
    pub category: String,
    pub recurrence_rule: RecurrenceRule,
    pub priority: Priority,
}

impl ReminderDraft {
    pub fn new(title: &str, due_at: NaiveDateTime) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            due_at,
            category: default_category(),
            recurrence_rule: RecurrenceRule::None,
            priority: Priority::Normal,
        }
    }

    pub fn recurring(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence_rule = rule;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Trim text fields and reject an empty title.
    pub fn validate(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(NudgeError::validation("title must not be empty"));
        }
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let category = self.category.trim();
        self.category = if category.is_empty() {
            default_category()
        } else {
            category.to_string()
        };
        Ok(self)
    }
}

impl Reminder {
    /// Create a fresh reminder from a validated draft.
    pub fn from_draft(draft: ReminderDraft, now: NaiveDateTime) -> Result<Self> {
        let draft = draft.validate()?;
        Ok(Self {
            id: new_id(),
            title: draft.title,
            description: draft.description,
            due_at: draft.due_at,
            category: draft.category,
            recurrence_rule: draft.recurrence_rule,
            priority: draft.priority,
            completed: false,
            notified: false,
            snooze_until: None,
            created_at: now,
        })
    }

    /// `snooze_until` when set, otherwise `due_at`.
    pub fn effective_due_at(&self) -> NaiveDateTime {
        self.snooze_until.unwrap_or(self.due_at)
    }

    /// Due and not yet notified for the current due instant.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        !self.completed && !self.notified && self.effective_due_at() <= now
    }

    pub fn status(&self, now: NaiveDateTime) -> ReminderStatus {
        if self.completed {
            ReminderStatus::Completed
        } else if self.snooze_until.is_some_and(|until| until > now) {
            ReminderStatus::Snoozed
        } else if self.notified {
            ReminderStatus::Notified
        } else {
            ReminderStatus::Pending
        }
    }

    /// Build the next independent instance of a recurring reminder.
    /// Returns `None` for non-recurring reminders.
    pub fn next_instance(&self, now: NaiveDateTime) -> Option<Reminder> {
        let due_at = recurrence::next_occurrence(self.due_at, self.recurrence_rule)?;
        Some(Reminder {
            id: new_id(),
            title: self.title.clone(),
            description: self.description.clone(),
            due_at,
            category: self.category.clone(),
            recurrence_rule: self.recurrence_rule,
            priority: self.priority,
            completed: false,
            notified: false,
            snooze_until: None,
            created_at: now,
        })
    }

    /// Copy the editable fields of `draft` onto this reminder.
    /// Flags and snooze state are left untouched.
    pub fn apply_draft(&mut self, draft: ReminderDraft) -> Result<()> {
        let draft = draft.validate()?;
        self.title = draft.title;
        self.description = draft.description;
        self.due_at = draft.due_at;
        self.category = draft.category;
        self.recurrence_rule = draft.recurrence_rule;
        self.priority = draft.priority;
        Ok(())
    }
}

fn new_id() -> String {
    format!("rem-{}", uuid::Uuid::new_v4())
}

/// Counts per derived status, plus how many open reminders are past due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub pending: usize,
    pub notified: usize,
    pub snoozed: usize,
    pub completed: usize,
    pub overdue: usize,
}

impl Summary {
    pub fn from_reminders(reminders: &[Reminder], now: NaiveDateTime) -> Self {
        let mut summary = Summary::default();
        for reminder in reminders {
            match reminder.status(now) {
                ReminderStatus::Pending => summary.pending += 1,
                ReminderStatus::Notified => summary.notified += 1,
                ReminderStatus::Snoozed => summary.snoozed += 1,
                ReminderStatus::Completed => summary.completed += 1,
            }
            if !reminder.completed && reminder.effective_due_at() <= now {
                summary.overdue += 1;
            }
        }
        summary
    }
}

/// Serde adapter for local wall-clock timestamps.
///
/// Writes `YYYY-MM-DDTHH:MM:SS`. Reads that form (with or without seconds and
/// fractions) as well as RFC 3339 values carrying an offset, which are
/// converted to local time.
pub mod wall_clock {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn format(t: &NaiveDateTime) -> String {
        t.format(FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Local).naive_local());
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
            .ok()
    }

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer, de};

        pub fn serialize<S: Serializer>(
            t: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => s.serialize_some(&super::format(t)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn reminder(due: NaiveDateTime) -> Reminder {
        Reminder::from_draft(ReminderDraft::new("Water plants", due), at(2024, 1, 1, 8, 0)).unwrap()
    }

    #[test]
    fn test_new_reminder_defaults() {
        let r = reminder(at(2024, 1, 2, 9, 0));
        assert!(r.id.starts_with("rem-"));
        assert!(!r.completed);
        assert!(!r.notified);
        assert!(r.snooze_until.is_none());
        assert_eq!(r.category, "general");
        assert_eq!(r.recurrence_rule, RecurrenceRule::None);
        assert_eq!(r.priority, Priority::Normal);
    }

    #[test]
    fn test_empty_title_rejected() {
        let draft = ReminderDraft::new("   ", at(2024, 1, 2, 9, 0));
        let err = Reminder::from_draft(draft, at(2024, 1, 1, 8, 0)).unwrap_err();
        assert!(matches!(err, NudgeError::Validation(_)));
    }

    #[test]
    fn test_draft_trims_fields() {
        let draft = ReminderDraft::new("  Call mom ", at(2024, 1, 2, 9, 0))
            .with_description("   ")
            .with_category("  ");
        let draft = draft.validate().unwrap();
        assert_eq!(draft.title, "Call mom");
        assert!(draft.description.is_none());
        assert_eq!(draft.category, "general");
    }

    #[test]
    fn test_effective_due_prefers_snooze() {
        let mut r = reminder(at(2024, 1, 2, 9, 0));
        assert_eq!(r.effective_due_at(), at(2024, 1, 2, 9, 0));
        r.snooze_until = Some(at(2024, 1, 2, 9, 10));
        assert_eq!(r.effective_due_at(), at(2024, 1, 2, 9, 10));
    }

    #[test]
    fn test_status_is_exclusive() {
        let now = at(2024, 1, 2, 9, 5);
        let mut r = reminder(at(2024, 1, 2, 9, 0));
        assert_eq!(r.status(now), ReminderStatus::Pending);
        assert!(r.is_due(now));

        r.notified = true;
        assert_eq!(r.status(now), ReminderStatus::Notified);
        assert!(!r.is_due(now));

        r.notified = false;
        r.snooze_until = Some(at(2024, 1, 2, 9, 10));
        assert_eq!(r.status(now), ReminderStatus::Snoozed);
        assert!(!r.is_due(now));

        // Elapsed snooze falls back to Pending until the next tick.
        assert_eq!(r.status(at(2024, 1, 2, 9, 10)), ReminderStatus::Pending);

        r.completed = true;
        assert_eq!(r.status(now), ReminderStatus::Completed);
        assert!(!r.is_due(at(2024, 2, 1, 0, 0)));
    }

    #[test]
    fn test_parse_rules_and_priorities() {
        assert_eq!("Weekly".parse::<RecurrenceRule>().unwrap(), RecurrenceRule::Weekly);
        assert_eq!("none".parse::<RecurrenceRule>().unwrap(), RecurrenceRule::None);
        assert!("fortnightly".parse::<RecurrenceRule>().is_err());
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_record_schema() {
        let mut r = reminder(at(2024, 3, 1, 9, 0));
        r.recurrence_rule = RecurrenceRule::Biweekly;
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["dueAt"], "2024-03-01T09:00:00");
        assert_eq!(json["recurrenceRule"], "biweekly");
        assert_eq!(json["priority"], "normal");
        assert_eq!(json["createdAt"], "2024-01-01T08:00:00");
        assert!(json.get("snoozeUntil").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_reads_minimal_record() {
        let json = r#"{
            "id": "abc",
            "title": "Standup",
            "dueAt": "2024-02-02T09:00",
            "createdAt": "2024-02-01T08:00:00.123",
            "snoozeUntil": null
        }"#;
        let r: Reminder = serde_json::from_str(json).unwrap();
        assert_eq!(r.due_at, at(2024, 2, 2, 9, 0));
        assert_eq!(r.category, "general");
        assert_eq!(r.recurrence_rule, RecurrenceRule::None);
        assert!(r.snooze_until.is_none());
    }

    #[test]
    fn test_reads_offset_timestamps_as_local() {
        let parsed = wall_clock::parse("2024-02-02T09:00:00Z").unwrap();
        let expected = chrono::DateTime::parse_from_rfc3339("2024-02-02T09:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Local)
            .naive_local();
        assert_eq!(parsed, expected);
        assert!(wall_clock::parse("yesterday").is_none());
    }

    #[test]
    fn test_summary_counts() {
        let now = at(2024, 1, 2, 12, 0);
        let mut overdue = reminder(at(2024, 1, 2, 9, 0));
        overdue.notified = true;
        let future = reminder(at(2024, 1, 3, 9, 0));
        let mut done = reminder(at(2024, 1, 1, 9, 0));
        done.completed = true;

        let summary = Summary::from_reminders(&[overdue, future, done], now);
        assert_eq!(summary.notified, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.overdue, 1);
    }
}
