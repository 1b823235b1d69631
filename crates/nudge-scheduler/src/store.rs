//! Reminder store: the single shared collection.
//!
//! Every mutation replaces the whole collection. Writes go through either
//! [`ReminderStore::update`] (read-modify-write under one lock) or
//! [`ReminderStore::replace`] (rejects snapshots older than the latest commit),
//! so a write is never based on a stale read.
//!
//! Persistence is pluggable: a JSON file (this module), SQLite
//! ([`crate::persistence`]) or memory for tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nudge_core::error::{NudgeError, Result};

use crate::reminder::Reminder;

/// Load/save contract for the reminder collection.
pub trait ReminderBackend: Send + Sync {
    /// Load every parsable record. Malformed records are skipped and logged.
    fn load(&self) -> Vec<Reminder>;

    /// Persist the full collection, replacing what was stored.
    fn save(&self, reminders: &[Reminder]) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// An immutable view of the collection at a given version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub reminders: Arc<Vec<Reminder>>,
}

/// Versioned in-memory collection backed by a [`ReminderBackend`].
pub struct ReminderStore {
    backend: Box<dyn ReminderBackend>,
    current: Mutex<Snapshot>,
}

impl ReminderStore {
    /// Open a store, loading whatever the backend holds.
    pub fn open(backend: Box<dyn ReminderBackend>) -> Self {
        let reminders = backend.load();
        tracing::info!(
            "📂 Loaded {} reminders from {}",
            reminders.len(),
            backend.describe()
        );
        Self {
            backend,
            current: Mutex::new(Snapshot {
                version: 0,
                reminders: Arc::new(reminders),
            }),
        }
    }

    /// Store with no persistence, for tests and dry runs.
    pub fn in_memory(reminders: Vec<Reminder>) -> Self {
        Self::open(Box::new(MemoryBackend::with_reminders(reminders)))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Current collection.
    pub fn reminders(&self) -> Arc<Vec<Reminder>> {
        self.lock().reminders.clone()
    }

    /// Swap in a new collection computed from the snapshot at `expected_version`.
    /// Fails with [`NudgeError::StaleSnapshot`] if another write landed since.
    pub fn replace(&self, expected_version: u64, reminders: Vec<Reminder>) -> Result<u64> {
        let mut current = self.lock();
        if current.version != expected_version {
            return Err(NudgeError::StaleSnapshot {
                expected: expected_version,
                actual: current.version,
            });
        }
        Ok(self.commit(&mut current, reminders))
    }

    /// Read-modify-write under a single lock. `f` receives the latest collection
    /// and returns the new one plus a value handed back to the caller.
    /// If `f` fails nothing is written.
    pub fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&[Reminder]) -> Result<(Vec<Reminder>, R)>,
    {
        let mut current = self.lock();
        let (next, out) = f(current.reminders.as_slice())?;
        self.commit(&mut current, next);
        Ok(out)
    }

    /// Append one reminder.
    pub fn append(&self, reminder: Reminder) -> u64 {
        let mut current = self.lock();
        let mut next = current.reminders.as_ref().clone();
        next.push(reminder);
        self.commit(&mut current, next)
    }

    /// The in-memory collection is authoritative; a failed save is logged and
    /// retried implicitly by the next commit.
    fn commit(&self, current: &mut MutexGuard<'_, Snapshot>, reminders: Vec<Reminder>) -> u64 {
        if let Err(e) = self.backend.save(&reminders) {
            tracing::warn!("⚠️ Failed to save reminders to {}: {e}", self.backend.describe());
        }
        current.version += 1;
        current.reminders = Arc::new(reminders);
        current.version
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// File-based store backed by a human-readable `reminders.json`.
pub struct JsonFileBackend {
    file: PathBuf,
}

impl JsonFileBackend {
    pub const FILE_NAME: &'static str = "reminders.json";

    /// Create a backend rooted at `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!("⚠️ Cannot create reminder directory {}: {e}", dir.display());
        }
        Self {
            file: dir.join(Self::FILE_NAME),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Where an unreadable file is moved so the next save cannot overwrite it.
    pub fn quarantine_file(&self) -> PathBuf {
        self.file.with_extension("json.bad")
    }

    fn quarantine(&self) {
        let bad = self.quarantine_file();
        match std::fs::rename(&self.file, &bad) {
            Ok(()) => tracing::warn!("⚠️ Moved unreadable reminders file to {}", bad.display()),
            Err(e) => tracing::warn!("⚠️ Failed to move {} aside: {e}", self.file.display()),
        }
    }
}

impl ReminderBackend for JsonFileBackend {
    fn load(&self) -> Vec<Reminder> {
        if !self.file.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(&self.file) {
            Ok(json) => parse_records(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Stored reminders are not a JSON array, starting empty: {e}");
                self.quarantine();
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read {}: {e}", self.file.display());
                Vec::new()
            }
        }
    }

    fn save(&self, reminders: &[Reminder]) -> Result<()> {
        let json = serde_json::to_string_pretty(reminders)?;
        let tmp = self.file.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.file)?;
        tracing::debug!("💾 Saved {} reminders to {}", reminders.len(), self.file.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.file.display().to_string()
    }
}

/// Parse a JSON array record by record, dropping the ones that do not fit.
/// Fails only when the document as a whole is not an array.
pub fn parse_records(json: &str) -> Result<Vec<Reminder>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let reminders = raw
        .into_iter()
        .enumerate()
        .filter_map(|(idx, value)| match serde_json::from_value::<Reminder>(value) {
            Ok(reminder) => Some(reminder),
            Err(e) => {
                tracing::warn!("⚠️ Skipping malformed reminder record #{idx}: {e}");
                None
            }
        })
        .collect();
    Ok(reminders)
}

/// Volatile backend. Remembers the last saved collection.
#[derive(Default)]
pub struct MemoryBackend {
    initial: Vec<Reminder>,
    saved: Mutex<Option<Vec<Reminder>>>,
}

impl MemoryBackend {
    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            initial: reminders,
            saved: Mutex::new(None),
        }
    }
}

impl ReminderBackend for MemoryBackend {
    fn load(&self) -> Vec<Reminder> {
        let saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        saved.clone().unwrap_or_else(|| self.initial.clone())
    }

    fn save(&self, reminders: &[Reminder]) -> Result<()> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(reminders.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderDraft;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn make(title: &str) -> Reminder {
        Reminder::from_draft(ReminderDraft::new(title, at(2, 9)), at(1, 8)).unwrap()
    }

    #[test]
    fn test_replace_rejects_stale_snapshot() {
        let store = ReminderStore::in_memory(vec![make("a")]);
        let snap = store.snapshot();
        assert_eq!(snap.version, 0);

        let v1 = store.replace(snap.version, vec![make("b")]).unwrap();
        assert_eq!(v1, 1);

        let err = store.replace(snap.version, vec![]).unwrap_err();
        assert!(matches!(
            err,
            NudgeError::StaleSnapshot {
                expected: 0,
                actual: 1
            }
        ));
        assert_eq!(store.reminders()[0].title, "b");
    }

    #[test]
    fn test_update_sees_latest_write() {
        let store = ReminderStore::in_memory(vec![]);
        store.append(make("first"));
        let count = store
            .update(|current| {
                let mut next = current.to_vec();
                next.push(make("second"));
                let len = next.len();
                Ok((next, len))
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.snapshot().version, 2);
    }

    #[test]
    fn test_failed_update_writes_nothing() {
        let store = ReminderStore::in_memory(vec![make("a")]);
        let result: Result<()> = store.update(|_| Err(NudgeError::validation("nope")));
        assert!(result.is_err());
        assert_eq!(store.snapshot().version, 0);
        assert_eq!(store.reminders().len(), 1);
    }

    #[test]
    fn test_json_roundtrip_on_disk() {
        let dir = std::env::temp_dir().join("nudge-test-json-store");
        std::fs::remove_dir_all(&dir).ok();
        {
            let store = ReminderStore::open(Box::new(JsonFileBackend::new(&dir)));
            store.append(make("persisted"));
        }
        let reopened = ReminderStore::open(Box::new(JsonFileBackend::new(&dir)));
        let reminders = reopened.reminders();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].title, "persisted");
        assert_eq!(reminders[0].due_at, at(2, 9));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let json = r#"[
            {"id": "ok-1", "title": "Good", "dueAt": "2024-03-02T09:00:00",
             "createdAt": "2024-03-01T08:00:00", "recurrenceRule": "daily"},
            {"id": "bad-1", "title": "No due date", "createdAt": "2024-03-01T08:00:00"},
            {"id": "bad-2", "title": "Bad rule", "dueAt": "2024-03-02T09:00:00",
             "createdAt": "2024-03-01T08:00:00", "recurrenceRule": "hourly"},
            "not even an object",
            {"id": "ok-2", "title": "Also good", "dueAt": "2024-03-02T10:00:00Z",
             "createdAt": "2024-03-01T08:00:00", "notified": true}
        ]"#;
        let reminders = parse_records(json).unwrap();
        let ids: Vec<&str> = reminders.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ok-1", "ok-2"]);
        assert!(reminders[1].notified);
    }

    #[test]
    fn test_garbage_file_is_moved_aside_not_overwritten() {
        let dir = std::env::temp_dir().join("nudge-test-json-garbage");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(JsonFileBackend::FILE_NAME), "{{{ not json").unwrap();

        let backend = JsonFileBackend::new(&dir);
        let bad = backend.quarantine_file();
        let store = ReminderStore::open(Box::new(backend));
        assert!(store.reminders().is_empty());

        // The next commit writes a fresh file; the broken one survives next to it.
        store.append(make("fresh"));
        assert_eq!(std::fs::read_to_string(&bad).unwrap(), "{{{ not json");
        let reopened = ReminderStore::open(Box::new(JsonFileBackend::new(&dir)));
        assert_eq!(reopened.reminders()[0].title, "fresh");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_uncreatable_dir_surfaces_on_save() {
        let blocker = std::env::temp_dir().join("nudge-test-json-blocker");
        std::fs::remove_dir_all(&blocker).ok();
        std::fs::write(&blocker, "a file, not a directory").unwrap();

        let backend = JsonFileBackend::new(&blocker.join("data"));
        assert!(backend.load().is_empty());
        assert!(backend.save(&[make("nowhere")]).is_err());
        std::fs::remove_file(&blocker).ok();
    }

    #[test]
    fn test_parse_records_rejects_non_array() {
        assert!(parse_records(r#"{"id": "x"}"#).is_err());
        assert!(parse_records("[]").unwrap().is_empty());
    }
}
