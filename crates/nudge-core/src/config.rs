//! Nudge configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NudgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NudgeConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub store: StoreConfig,
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
            .map_err(|e| NudgeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| NudgeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.tick_interval_ms == 0 {
            return Err(NudgeError::Config("monitor.tick_interval_ms must be positive".into()));
        }
        if self.monitor.error_backoff_ms == 0 {
            return Err(NudgeError::Config("monitor.error_backoff_ms must be positive".into()));
        }
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| NudgeError::Config(format!("Failed to serialize config: {e}")))
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

/// One year.
pub const MAX_OVERDUE_GRACE_SECS: u64 = 366 * 24 * 3600;

/// Monitor loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// How long past its due time a pending reminder stays eligible for
    /// on-time delivery before it is marked overdue.
    #[serde(default = "default_overdue_grace_secs")]
    pub overdue_grace_secs: u64,
}

fn default_tick_interval_ms() -> u64 { 1000 }
fn default_error_backoff_ms() -> u64 { 5000 }
fn default_overdue_grace_secs() -> u64 { 60 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            overdue_grace_secs: default_overdue_grace_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Capped at [`MAX_OVERDUE_GRACE_SECS`].
    pub fn overdue_grace(&self) -> chrono::Duration {
        let secs = self.overdue_grace_secs.min(MAX_OVERDUE_GRACE_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// An open acknowledgment prompt is treated as acknowledged after this long.
    #[serde(default = "default_auto_dismiss_secs")]
    pub auto_dismiss_secs: u64,
    /// Forced finalization for prompts that never receive input.
    #[serde(default = "default_safety_net_secs")]
    pub safety_net_secs: u64,
    #[serde(default = "bool_true")]
    pub system_notifications: bool,
    #[serde(default = "default_notify_command")]
    pub notify_command: String,
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn bool_true() -> bool { true }
fn default_auto_dismiss_secs() -> u64 { 30 }
fn default_safety_net_secs() -> u64 { 5 }
fn default_notify_command() -> String { "notify-send".into() }
fn default_notify_timeout_secs() -> u64 { 10 }
fn default_history_limit() -> usize { 100 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            auto_dismiss_secs: default_auto_dismiss_secs(),
            safety_net_secs: default_safety_net_secs(),
            system_notifications: true,
            notify_command: default_notify_command(),
            notify_timeout_secs: default_notify_timeout_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl DispatchConfig {
    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_secs(self.auto_dismiss_secs)
    }

    pub fn safety_net(&self) -> Duration {
        Duration::from_secs(self.safety_net_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

/// Reminder store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String { "~/.nudge/reminders.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

impl StoreConfig {
    /// Database path with `~` expanded.
    pub fn resolved_db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).to_string())
    }
}
