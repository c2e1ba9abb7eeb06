//! Out-of-band reset of a stale BLE link.
//!
//! The controller firmware can keep a half-open session around that a fresh
//! `connect` cannot clear. Forcing a disconnect through the host's Bluetooth
//! control utility first makes the next connect succeed far more often.

use crate::domain::models::DeviceAddress;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Best-effort external session reset. Never fails.
#[async_trait]
pub trait LinkReset: Send + Sync {
    async fn reset(&self, address: &DeviceAddress);
}

/// Resets the link with `<program> disconnect <ADDRESS>` (bluetoothctl)
pub struct ControlUtilityReset {
    program: Option<String>,
}

impl ControlUtilityReset {
    /// Look `program` up once. When it is missing every reset is skipped.
    pub async fn locate(program: &str) -> Self {
        let present = Command::new("which")
            .arg(program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);

        if present {
            debug!("Link reset via {}", program);
        } else {
            debug!("{} not found, link reset disabled", program);
        }

        Self {
            program: present.then(|| program.to_string()),
        }
    }
}

#[async_trait]
impl LinkReset for ControlUtilityReset {
    async fn reset(&self, address: &DeviceAddress) {
        let Some(program) = &self.program else {
            return;
        };

        // Exit status and output are irrelevant, the device may simply not be connected.
        // The child dies with the attempt when the attempt timeout fires.
        let _ = Command::new(program)
            .arg("disconnect")
            .arg(address.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
    }
}

/// Used when link reset is disabled in settings
pub struct NoLinkReset;

#[async_trait]
impl LinkReset for NoLinkReset {
    async fn reset(&self, _address: &DeviceAddress) {}
}
