use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    /// Only honoured when stderr is a terminal
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleSettings {
    #[serde(default = "default_read_uuid")]
    pub read_char_uuid: Uuid,
    #[serde(default = "default_write_uuid")]
    pub write_char_uuid: Uuid,
    /// How long discovery and connect-time lookups scan for
    #[serde(default = "default_scan_duration_ms")]
    pub scan_duration_ms: u64,
    #[serde(default = "default_true")]
    pub presence_check_enabled: bool,
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            read_char_uuid: default_read_uuid(),
            write_char_uuid: default_write_uuid(),
            scan_duration_ms: default_scan_duration_ms(),
            presence_check_enabled: default_true(),
        }
    }
}

impl BleSettings {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResetSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_link_reset_program")]
    pub program: String,
}

impl Default for LinkResetSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            program: default_link_reset_program(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,
    #[serde(default)]
    pub ble: BleSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub link_reset: LinkResetSettings,
}

fn default_level() -> String {
    "error".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "acinfinity_ble".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_read_uuid() -> Uuid {
    crate::infrastructure::bluetooth::protocol::READ_CHAR_UUID
}
fn default_write_uuid() -> Uuid {
    crate::infrastructure::bluetooth::protocol::WRITE_CHAR_UUID
}
fn default_scan_duration_ms() -> u64 {
    5000
}
fn default_deadline_secs() -> u64 {
    60
}
fn default_attempt_timeout_secs() -> u64 {
    60
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_multiplier() -> u32 {
    2
}
fn default_link_reset_program() -> String {
    "bluetoothctl".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl SettingsService {
    /// Load settings from `explicit_path`, or from the per-user config file.
    ///
    /// A missing default file yields the defaults; an explicit path must load.
    pub fn new(explicit_path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit_path {
            let settings = Self::load_from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?;
            return Ok(Self {
                settings,
                settings_path: Some(path.to_path_buf()),
            });
        }

        let settings_path = Self::get_settings_path();
        let settings = settings_path
            .as_deref()
            .and_then(|p| Self::load_from_file(p).ok())
            .unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("acinfinity-ble");
        path.push("settings.json");
        Some(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}
