//! BLE Transport Port
//!
//! The capability surface the sessions need from a BLE stack. Implementations
//! carry no retry or timeout logic of their own.

use crate::domain::models::{DeviceAddress, DiscoveredDevice};
use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Callback invoked with the raw payload of every inbound notification
pub type NotificationHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Scan for nearby devices for `duration`
    async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError>;

    async fn connect(&self, address: &DeviceAddress) -> Result<(), TransportError>;

    /// Disconnecting a device that is not connected succeeds
    async fn disconnect(&self, address: &DeviceAddress) -> Result<(), TransportError>;

    async fn subscribe(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
        on_notify: NotificationHandler,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
    ) -> Result<(), TransportError>;

    /// Fire-and-forget characteristic write
    async fn write(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError>;
}
