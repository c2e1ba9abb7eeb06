//! BLE Connection Module
//!
//! [`BleTransport`] over `btleplug`: peripheral lookup, connection, GATT
//! characteristic access and notification forwarding.

use crate::domain::models::{DeviceAddress, DiscoveredDevice};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::transport::{BleTransport, NotificationHandler};
use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// How often the peripheral list is polled while scanning for a target
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// btleplug-backed connection handler
pub struct BleConnection {
    adapter: Adapter,
    scan_duration: Duration,
    peripherals: Mutex<HashMap<DeviceAddress, Peripheral>>,
    subscriptions: Mutex<HashMap<(DeviceAddress, Uuid), JoinHandle<()>>>,
}

impl BleConnection {
    /// Open the first Bluetooth adapter on the host
    pub async fn new(scan_duration: Duration) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        debug!("Using Bluetooth adapter: {}", adapter.adapter_info().await?);

        Ok(Self {
            adapter,
            scan_duration,
            peripherals: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    /// Find a peripheral already known to the adapter
    async fn lookup(&self, address: &DeviceAddress) -> Result<Option<Peripheral>, TransportError> {
        Ok(self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(address.as_str())))
    }

    /// Resolve a peripheral, scanning for up to the scan duration if needed
    async fn find_peripheral(&self, address: &DeviceAddress) -> Result<Peripheral, TransportError> {
        if let Some(peripheral) = self.peripherals.lock().await.get(address) {
            return Ok(peripheral.clone());
        }

        let peripheral = match self.lookup(address).await? {
            Some(p) => p,
            None => {
                debug!("{} not cached by adapter, scanning...", address);
                self.adapter.start_scan(ScanFilter::default()).await?;
                let found = self.poll_for(address).await;
                if let Err(e) = self.adapter.stop_scan().await {
                    debug!("Failed to stop scan: {}", e);
                }
                found?.ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))?
            }
        };

        self.peripherals
            .lock()
            .await
            .insert(address.clone(), peripheral.clone());
        Ok(peripheral)
    }

    async fn poll_for(&self, address: &DeviceAddress) -> Result<Option<Peripheral>, TransportError> {
        let deadline = Instant::now() + self.scan_duration;
        loop {
            if let Some(p) = self.lookup(address).await? {
                return Ok(Some(p));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }

    /// Peripheral for an address that `connect` has already resolved
    async fn connected(&self, address: &DeviceAddress) -> Result<Peripheral, TransportError> {
        self.peripherals
            .lock()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::NotConnected(address.to_string()))
    }

    fn characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }

    async fn stop_forwarding(&self, address: &DeviceAddress, characteristic: Uuid) {
        if let Some(task) = self
            .subscriptions
            .lock()
            .await
            .remove(&(address.clone(), characteristic))
        {
            task.abort();
        }
    }
}

#[async_trait]
impl BleTransport for BleConnection {
    async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        info!("Starting BLE scan for {:?}", duration);
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(duration).await;
        self.adapter.stop_scan().await?;

        let mut devices = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            let properties = peripheral.properties().await?;
            devices.push(DiscoveredDevice {
                address: peripheral.address().to_string(),
                name: properties.as_ref().and_then(|p| p.local_name.clone()),
                signal_strength: properties.as_ref().and_then(|p| p.rssi),
            });
        }

        info!("Scan found {} devices", devices.len());
        Ok(devices)
    }

    async fn connect(&self, address: &DeviceAddress) -> Result<(), TransportError> {
        info!("Connecting to Bluetooth device: {}", address);
        let peripheral = self.find_peripheral(address).await?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        info!(
            "Device connected, {} characteristics",
            peripheral.characteristics().len()
        );
        Ok(())
    }

    async fn disconnect(&self, address: &DeviceAddress) -> Result<(), TransportError> {
        let Some(peripheral) = self.peripherals.lock().await.get(address).cloned() else {
            return Ok(());
        };

        let stale: Vec<_> = {
            let mut subscriptions = self.subscriptions.lock().await;
            let keys: Vec<_> = subscriptions
                .keys()
                .filter(|(a, _)| a == address)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|k| subscriptions.remove(&k))
                .collect()
        };
        for task in stale {
            task.abort();
        }

        if peripheral.is_connected().await? {
            peripheral.disconnect().await?;
            info!("Disconnected from device {}", address);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
        mut on_notify: NotificationHandler,
    ) -> Result<(), TransportError> {
        let peripheral = self.connected(address).await?;
        let target = Self::characteristic(&peripheral, characteristic)?;

        // Take the stream before enabling notify so the first push is not lost
        let mut notifications = peripheral.notifications().await?;
        peripheral.subscribe(&target).await?;

        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == characteristic {
                    on_notify(&notification.value);
                } else {
                    trace!("Ignoring notification from {}", notification.uuid);
                }
            }
        });

        if let Some(previous) = self
            .subscriptions
            .lock()
            .await
            .insert((address.clone(), characteristic), task)
        {
            previous.abort();
        }

        debug!("Subscribed to {}", characteristic);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.stop_forwarding(address, characteristic).await;

        let peripheral = self.connected(address).await?;
        let target = Self::characteristic(&peripheral, characteristic)?;
        peripheral.unsubscribe(&target).await?;

        debug!("Unsubscribed from {}", characteristic);
        Ok(())
    }

    async fn write(
        &self,
        address: &DeviceAddress,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let peripheral = self.connected(address).await?;
        let target = Self::characteristic(&peripheral, characteristic)?;

        let write_type = if target
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        debug!("Writing {:02X?} to {} ({:?})", data, characteristic, write_type);
        peripheral.write(&target, data, write_type).await?;
        Ok(())
    }
}

impl Drop for BleConnection {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions.get_mut().drain() {
            task.abort();
        }
    }
}
