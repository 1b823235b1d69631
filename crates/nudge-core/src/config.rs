//! Nudge configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{NudgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl NudgeConfig {
    /// Load config from the default path (~/.nudge/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NudgeError::config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| NudgeError::config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the given path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| NudgeError::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Nudge home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nudge")
    }
}

/// Due-detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the detector polls the reminder collection.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Snooze length used when a notification's "Snooze" action is clicked.
    #[serde(default = "default_snooze_minutes")]
    pub default_snooze_minutes: u32,
}

fn default_poll_interval_secs() -> u64 { 30 }
fn default_snooze_minutes() -> u32 { 10 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            default_snooze_minutes: default_snooze_minutes(),
        }
    }
}

/// Which persistence backend holds the reminder collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Directory holding `reminders.json` or `reminders.db`. `~` is expanded.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_backend() -> StorageBackend { StorageBackend::Json }
fn default_storage_path() -> String { "~/.nudge/data".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
        }
    }
}

impl StorageConfig {
    /// Storage directory with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "bool_true")]
    pub audio_enabled: bool,
    #[serde(default = "default_tone_frequency_hz")]
    pub tone_frequency_hz: u32,
    #[serde(default = "default_tone_duration_ms")]
    pub tone_duration_ms: u32,
    #[serde(default = "bool_true")]
    pub console_enabled: bool,
    /// Optional HTTP endpoint that receives every alert as JSON.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Number of delivered notifications kept in memory.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn bool_true() -> bool { true }
fn default_tone_frequency_hz() -> u32 { 880 }
fn default_tone_duration_ms() -> u32 { 200 }
fn default_history_limit() -> usize { 100 }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            tone_frequency_hz: default_tone_frequency_hz(),
            tone_duration_ms: default_tone_duration_ms(),
            console_enabled: true,
            webhook_url: None,
            history_limit: default_history_limit(),
        }
    }
}
