//! Control an AC Infinity fan controller over Bluetooth LE.
//!
//! Reads the controller's telemetry notification (temperature, humidity,
//! VPD) and writes fan-level commands, retrying over an unreliable link.

pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{Error, Result};
