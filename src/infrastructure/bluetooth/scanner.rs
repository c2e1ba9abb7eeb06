//! BLE Scanner Module
//!
//! Pre-flight discovery scan. The controller does not always show up in
//! scans even when it accepts connections, so absence is only reported.

use crate::domain::models::DeviceAddress;
use crate::infrastructure::bluetooth::transport::BleTransport;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a presence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Found,
    Missing { seen: Vec<String> },
    ScanFailed,
}

/// Scan once and warn if `address` was not seen. Never fails.
pub async fn check_presence(
    transport: &dyn BleTransport,
    address: &DeviceAddress,
    duration: Duration,
) -> Presence {
    let devices = match transport.discover(duration).await {
        Ok(devices) => devices,
        Err(e) => {
            warn!("BLE discover failed for {}: {}", address, e);
            return Presence::ScanFailed;
        }
    };

    for device in &devices {
        debug!(
            "Seen {} ({}), RSSI {}",
            device.address,
            device.name.as_deref().unwrap_or("unnamed"),
            device
                .signal_strength
                .map_or_else(|| "n/a".to_string(), |rssi| format!("{} dBm", rssi))
        );
    }

    if devices
        .iter()
        .any(|d| d.address.eq_ignore_ascii_case(address.as_str()))
    {
        debug!("Found {} in scan", address);
        return Presence::Found;
    }

    let seen: Vec<String> = devices.into_iter().map(|d| d.address).collect();
    warn!(
        "BLE discover failed for {}, {} found: {:?}",
        address,
        seen.len(),
        seen
    );
    Presence::Missing { seen }
}
