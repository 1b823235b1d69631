//! SQLite-backed persistence for the reminder collection.
//! Alternative to the JSON file store; survives restarts, single file, queryable.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nudge_core::error::{NudgeError, Result};

use crate::reminder::{Priority, RecurrenceRule, Reminder, wall_clock};
use crate::store::ReminderBackend;

/// SQLite-backed reminder backend.
pub struct SqliteBackend {
    conn: Mutex<rusqlite::Connection>,
    label: String,
}

impl SqliteBackend {
    pub const FILE_NAME: &'static str = "reminders.db";

    /// Open or create `reminders.db` inside `dir`.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open(&dir.join(Self::FILE_NAME))
    }

    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| NudgeError::storage(format!("DB open: {e}")))?;
        Self::with_connection(conn, path.display().to_string())
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| NudgeError::storage(format!("DB open: {e}")))?;
        Self::with_connection(conn, ":memory:".into())
    }

    fn with_connection(conn: rusqlite::Connection, label: String) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
            label,
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS reminders (
                position INTEGER PRIMARY KEY,
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                due_at TEXT NOT NULL,            -- local wall-clock, ISO-8601
                category TEXT NOT NULL DEFAULT 'general',
                recurrence_rule TEXT NOT NULL DEFAULT 'none',
                priority TEXT NOT NULL DEFAULT 'normal',
                completed INTEGER NOT NULL DEFAULT 0,
                notified INTEGER NOT NULL DEFAULT 0,
                snooze_until TEXT,
                created_at TEXT NOT NULL
            );
         ",
            )
            .map_err(|e| NudgeError::storage(format!("Migration: {e}")))
    }

    fn conn(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_rows(&self) -> Result<Vec<Reminder>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, due_at, category, recurrence_rule, priority,
                        completed, notified, snooze_until, created_at
                 FROM reminders ORDER BY position",
            )
            .map_err(|e| NudgeError::storage(format!("Load reminders: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    due_at: row.get(3)?,
                    category: row.get(4)?,
                    recurrence_rule: row.get(5)?,
                    priority: row.get(6)?,
                    completed: row.get::<_, i32>(7)? != 0,
                    notified: row.get::<_, i32>(8)? != 0,
                    snooze_until: row.get(9)?,
                    created_at: row.get(10)?,
                })
            })
            .map_err(|e| NudgeError::storage(format!("Load reminders: {e}")))?;

        let mut reminders = Vec::new();
        for row in rows {
            let parsed = row
                .map_err(|e| e.to_string())
                .and_then(StoredRow::into_reminder);
            match parsed {
                Ok(reminder) => reminders.push(reminder),
                Err(e) => tracing::warn!("⚠️ Skipping malformed reminder row: {e}"),
            }
        }
        Ok(reminders)
    }
}

impl ReminderBackend for SqliteBackend {
    fn load(&self) -> Vec<Reminder> {
        self.load_rows().unwrap_or_else(|e| {
            tracing::warn!("⚠️ {e}");
            Vec::new()
        })
    }

    fn save(&self, reminders: &[Reminder]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| NudgeError::storage(format!("Begin: {e}")))?;
        tx.execute("DELETE FROM reminders", [])
            .map_err(|e| NudgeError::storage(format!("Clear reminders: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO reminders
                     (position, id, title, description, due_at, category, recurrence_rule,
                      priority, completed, notified, snooze_until, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )
                .map_err(|e| NudgeError::storage(format!("Save reminder: {e}")))?;
            for (position, r) in reminders.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    position as i64,
                    r.id,
                    r.title,
                    r.description,
                    wall_clock::format(&r.due_at),
                    r.category,
                    r.recurrence_rule.as_str(),
                    r.priority.as_str(),
                    r.completed as i32,
                    r.notified as i32,
                    r.snooze_until.as_ref().map(wall_clock::format),
                    wall_clock::format(&r.created_at),
                ])
                .map_err(|e| NudgeError::storage(format!("Save reminder '{}': {e}", r.id)))?;
            }
        }
        tx.commit()
            .map_err(|e| NudgeError::storage(format!("Commit: {e}")))?;
        tracing::debug!("💾 Saved {} reminders to {}", reminders.len(), self.label);
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Raw column values, parsed into a [`Reminder`] after the query.
struct StoredRow {
    id: String,
    title: String,
    description: Option<String>,
    due_at: String,
    category: String,
    recurrence_rule: String,
    priority: String,
    completed: bool,
    notified: bool,
    snooze_until: Option<String>,
    created_at: String,
}

impl StoredRow {
    fn into_reminder(self) -> std::result::Result<Reminder, String> {
        let timestamp = |field: &str, raw: &str| {
            wall_clock::parse(raw)
                .ok_or_else(|| format!("row '{}': invalid {field} '{raw}'", self.id))
        };
        let due_at = timestamp("due_at", &self.due_at)?;
        let created_at = timestamp("created_at", &self.created_at)?;
        let snooze_until = match &self.snooze_until {
            Some(raw) => Some(timestamp("snooze_until", raw)?),
            None => None,
        };
        let recurrence_rule: RecurrenceRule = self
            .recurrence_rule
            .parse()
            .map_err(|e| format!("row '{}': {e}", self.id))?;
        let priority: Priority = self
            .priority
            .parse()
            .map_err(|e| format!("row '{}': {e}", self.id))?;

        Ok(Reminder {
            id: self.id,
            title: self.title,
            description: self.description,
            due_at,
            category: self.category,
            recurrence_rule,
            priority,
            completed: self.completed,
            notified: self.notified,
            snooze_until,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderDraft;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_save_and_load_preserves_order_and_fields() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let mut first = Reminder::from_draft(
            ReminderDraft::new("Pay rent", at(1, 9, 0))
                .recurring(RecurrenceRule::Monthly)
                .with_priority(Priority::High)
                .with_description("transfer to landlord"),
            at(1, 8, 0),
        )
        .unwrap();
        first.notified = true;
        first.snooze_until = Some(at(1, 9, 15));
        let second =
            Reminder::from_draft(ReminderDraft::new("Stretch", at(2, 7, 30)), at(1, 8, 0)).unwrap();

        db.save(&[first.clone(), second.clone()]).unwrap();
        let loaded = db.load();
        assert_eq!(loaded, vec![first.clone(), second]);

        // Saving replaces the whole table.
        db.save(&[first.clone()]).unwrap();
        assert_eq!(db.load(), vec![first]);
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let good =
            Reminder::from_draft(ReminderDraft::new("Good", at(2, 9, 0)), at(1, 8, 0)).unwrap();
        db.save(&[good.clone()]).unwrap();
        db.conn()
            .execute(
                "INSERT INTO reminders (position, id, title, due_at, recurrence_rule, created_at)
                 VALUES (5, 'bad-date', 'Broken', 'someday', 'none', '2024-03-01T08:00:00')",
                [],
            )
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO reminders (position, id, title, due_at, recurrence_rule, created_at)
                 VALUES (6, 'bad-rule', 'Broken', '2024-03-02T09:00:00', 'hourly', '2024-03-01T08:00:00')",
                [],
            )
            .unwrap();
        assert_eq!(db.load(), vec![good]);
    }

    #[test]
    fn test_duplicate_ids_still_save() {
        let db = SqliteBackend::open_in_memory().unwrap();
        let r = Reminder::from_draft(ReminderDraft::new("Twice", at(2, 9, 0)), at(1, 8, 0))
            .unwrap();
        let mut copy = r.clone();
        copy.title = "Twice again".into();

        db.save(&[r.clone(), copy.clone()]).unwrap();
        assert_eq!(db.load(), vec![r.clone(), copy]);

        // Later saves keep working.
        db.save(&[r.clone()]).unwrap();
        assert_eq!(db.load(), vec![r]);
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = std::env::temp_dir().join("nudge-test-sqlite-store");
        std::fs::remove_dir_all(&dir).ok();
        let r = Reminder::from_draft(ReminderDraft::new("Backup", at(3, 22, 0)), at(1, 8, 0))
            .unwrap();
        {
            let db = SqliteBackend::open_dir(&dir).unwrap();
            db.save(&[r.clone()]).unwrap();
        }
        let db = SqliteBackend::open_dir(&dir).unwrap();
        assert_eq!(db.load(), vec![r]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
