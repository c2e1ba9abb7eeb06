use crate::domain::models::{DeviceAddress, FanCommand, Reading, SensorReadings};
use crate::error::UsageError;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

fn after_help() -> String {
    format!("Attributes available by \"get\" action: {}", Reading::names())
}

/// Read sensors from, or set the fan level of, an AC Infinity controller over BLE
#[derive(Debug, Parser)]
#[command(name = "acinfinity-ble", version, after_help = after_help())]
pub struct Cli {
    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// MAC address of the controller
    pub address: String,

    /// Get sensor values or set the fan level
    #[arg(value_enum)]
    pub action: ActionKind,

    /// get: a single attribute, set: fan level 0-10
    #[arg(allow_hyphen_values = true)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionKind {
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `None` reads every attribute
    Get(Option<Reading>),
    Set(FanCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub address: DeviceAddress,
    pub action: Action,
}

impl Cli {
    /// Validate positional arguments before any radio traffic
    pub fn resolve(&self) -> Result<Invocation, UsageError> {
        let address = self.address.parse()?;
        let action = match self.action {
            ActionKind::Get => Action::Get(self.value.as_deref().map(str::parse::<Reading>).transpose()?),
            ActionKind::Set => {
                let value = self.value.as_deref().ok_or(UsageError::MissingVelocity)?;
                Action::Set(value.parse()?)
            }
        };
        Ok(Invocation { address, action })
    }
}

/// Text printed for a successful `get`
pub fn render(readings: &SensorReadings, reading: Option<Reading>) -> anyhow::Result<String> {
    match reading {
        Some(reading) => Ok(format!("{:?}", readings.get(reading))),
        None => {
            let mut out = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            readings.serialize(&mut serializer)?;
            Ok(String::from_utf8(out)?)
        }
    }
}
