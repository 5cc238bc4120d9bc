//! Configuration data structures

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the Telegram bot token (never stored in the config file)
pub const TOKEN_ENV: &str = "SHIFTREPORT_TELEGRAM_BOT_TOKEN";
/// Environment variable overriding the supervisory chat id
pub const SUPERVISORY_CHAT_ENV: &str = "SHIFTREPORT_SUPERVISORY_CHAT_ID";
/// Upper bound for `timing.shift_expiry_hours` (one year)
pub const MAX_SHIFT_EXPIRY_HOURS: u64 = 24 * 365;

/// Errors raised while loading or interpreting configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid recurrence rule '{expression}' for reminder '{key}': {reason}")]
    InvalidRecurrence {
        key: String,
        expression: String,
        reason: String,
    },

    #[error("Duplicate point name: {0}")]
    DuplicatePoint(String),

    #[error("Duplicate reminder key: {0}")]
    DuplicateReminder(String),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Logging level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

/// Telegram transport settings (the token comes from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Chat receiving consolidated reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisory_chat_id: Option<i64>,
    /// Bot API base URL
    pub api_base: String,
    /// Maximum items per media group
    pub max_media_group: usize,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            supervisory_chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            max_media_group: 10,
        }
    }
}

/// Timers and policy thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Delay used to coalesce near-simultaneous reminders
    pub debounce_millis: u64,
    /// Shifts older than this are force-ended
    pub shift_expiry_hours: u64,
    /// Pending reminders at which a session is force-ended
    pub pending_cap: usize,
    /// Janitor sweep period
    pub janitor_interval_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            debounce_millis: 1000,
            shift_expiry_hours: 16,
            pending_cap: 20,
            janitor_interval_secs: 3600,
        }
    }
}

impl TimingSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    /// Clamped to `1..=MAX_SHIFT_EXPIRY_HOURS`; `validate()` reports values outside it
    pub fn shift_expiry(&self) -> chrono::Duration {
        let hours = self.shift_expiry_hours.clamp(1, MAX_SHIFT_EXPIRY_HOURS);
        chrono::Duration::hours(hours as i64)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }
}

/// Control API bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// A point as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointConfig {
    pub name: String,
    pub password: String,
    /// Alias from `[timezones]` or an IANA name
    pub timezone: String,
    pub point_type: String,
}

/// A reminder as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub key: String,
    pub name: String,
    pub cron: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_type: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Logging verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
    /// Known-user roster file
    #[serde(default = "default_roster_path")]
    pub roster_path: PathBuf,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub server: ServerSettings,
    /// Timezone aliases, e.g. `KZ = "Asia/Almaty"`
    #[serde(default)]
    pub timezones: BTreeMap<String, String>,
    #[serde(default)]
    pub points: Vec<PointConfig>,
    #[serde(default)]
    pub reminders: Vec<ReminderConfig>,
}

fn default_roster_path() -> PathBuf {
    PathBuf::from(".deploy-users.json")
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            roster_path: default_roster_path(),
            telegram: TelegramSettings::default(),
            timing: TimingSettings::default(),
            server: ServerSettings::default(),
            timezones: BTreeMap::new(),
            points: Vec::new(),
            reminders: Vec::new(),
        }
    }
}

impl Configuration {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("shiftreport").join("config.toml"))
    }

    /// Apply environment overrides (supervisory chat id)
    pub fn apply_env_overrides(&mut self) {
        if let Some(chat_id) = std::env::var(SUPERVISORY_CHAT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            self.telegram.supervisory_chat_id = Some(chat_id);
        }
    }

    /// Resolve a timezone alias or IANA name
    pub fn resolve_timezone(&self, name: &str) -> Result<Tz, ConfigError> {
        let iana = self.timezones.get(name).map(String::as_str).unwrap_or(name);
        iana.parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(name.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.timing.debounce_millis == 0 || self.timing.debounce_millis > 60_000 {
            errors.push("timing.debounce_millis must be between 1 and 60000".to_string());
        }

        if self.timing.shift_expiry_hours == 0
            || self.timing.shift_expiry_hours > MAX_SHIFT_EXPIRY_HOURS
        {
            errors.push(format!(
                "timing.shift_expiry_hours must be between 1 and {}",
                MAX_SHIFT_EXPIRY_HOURS
            ));
        }

        if self.timing.pending_cap == 0 {
            errors.push("timing.pending_cap must be positive".to_string());
        }

        if self.timing.janitor_interval_secs < 60 {
            errors.push("timing.janitor_interval_secs must be at least 60".to_string());
        }

        if !(2..=10).contains(&self.telegram.max_media_group) {
            errors.push("telegram.max_media_group must be between 2 and 10".to_string());
        }

        if self.server.port < 1024 {
            errors.push(
                "server.port must be at least 1024 (privileged ports not allowed)".to_string(),
            );
        }

        let mut names = HashSet::new();
        for point in &self.points {
            if point.name.trim().is_empty() {
                errors.push("point name cannot be empty".to_string());
            }
            if !names.insert(point.name.as_str()) {
                errors.push(format!("duplicate point name: {}", point.name));
            }
            if point.password.is_empty() {
                errors.push(format!("point '{}' has an empty password", point.name));
            }
            if let Err(e) = self.resolve_timezone(&point.timezone) {
                errors.push(format!("point '{}': {}", point.name, e));
            }
        }

        let mut keys = HashSet::new();
        for reminder in &self.reminders {
            if !is_valid_reminder_key(&reminder.key) {
                errors.push(format!(
                    "reminder key '{}' must be 1-48 letters, digits, '-' or '_'",
                    reminder.key
                ));
            }
            if !keys.insert(reminder.key.as_str()) {
                errors.push(format!("duplicate reminder key: {}", reminder.key));
            }
            if let Err(reason) = crate::models::Recurrence::parse(&reminder.cron) {
                errors.push(format!(
                    "reminder '{}' has an invalid cron '{}': {}",
                    reminder.key, reminder.cron, reason
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Reminder keys travel in callback data, which the transport caps at 64 bytes
fn is_valid_reminder_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 48
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
