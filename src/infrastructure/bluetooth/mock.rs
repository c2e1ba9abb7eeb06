//! Scripted in-memory transport for session and service tests.

use crate::domain::models::{DeviceAddress, DiscoveredDevice};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::transport::{BleTransport, NotificationHandler};
use crate::infrastructure::link_reset::LinkReset;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    LinkReset(String),
    Discover,
    Connect(String),
    Disconnect(String),
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    Write(Uuid, Vec<u8>),
}

#[derive(Default)]
pub struct MockTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    connect_failures: Mutex<u32>,
    notifications: Vec<Vec<u8>>,
    devices: Vec<DiscoveredDevice>,
    discover_fails: bool,
    connect_hangs: bool,
    subscribe_fails: bool,
    unsubscribe_fails: bool,
    write_fails: bool,
    handler: Mutex<Option<NotificationHandler>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads pushed to the handler as soon as it is subscribed
    pub fn with_notifications(mut self, payloads: Vec<Vec<u8>>) -> Self {
        self.notifications = payloads;
        self
    }

    /// Fail the next `n` connect calls
    pub fn failing_connects(self, n: u32) -> Self {
        *self.connect_failures.lock().unwrap() = n;
        self
    }

    pub fn with_devices(mut self, addresses: &[&str]) -> Self {
        self.devices = addresses
            .iter()
            .map(|a| DiscoveredDevice {
                address: a.to_string(),
                name: None,
                signal_strength: None,
            })
            .collect();
        self
    }

    pub fn failing_discover(mut self) -> Self {
        self.discover_fails = true;
        self
    }

    /// Connect never returns, like a stack stuck on an unreachable device
    pub fn hanging_connect(mut self) -> Self {
        self.connect_hangs = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.subscribe_fails = true;
        self
    }

    pub fn failing_unsubscribe(mut self) -> Self {
        self.unsubscribe_fails = true;
        self
    }

    pub fn failing_write(mut self) -> Self {
        self.write_fails = true;
        self
    }

    /// Link reset that records into this transport's call log
    pub fn link_reset(&self) -> MockLinkReset {
        MockLinkReset {
            calls: self.calls.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(*c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    async fn discover(&self, _duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.record(Call::Discover);
        if self.discover_fails {
            return Err(TransportError::Other("scan failed".into()));
        }
        Ok(self.devices.clone())
    }

    async fn connect(&self, address: &DeviceAddress) -> Result<(), TransportError> {
        self.record(Call::Connect(address.to_string()));
        if self.connect_hangs {
            std::future::pending::<()>().await;
        }
        let mut failures = self.connect_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self, address: &DeviceAddress) -> Result<(), TransportError> {
        self.record(Call::Disconnect(address.to_string()));
        self.handler.lock().unwrap().take();
        Ok(())
    }

    async fn subscribe(
        &self,
        _address: &DeviceAddress,
        characteristic: Uuid,
        mut on_notify: NotificationHandler,
    ) -> Result<(), TransportError> {
        self.record(Call::Subscribe(characteristic));
        if self.subscribe_fails {
            return Err(TransportError::CharacteristicNotFound(characteristic));
        }
        for payload in &self.notifications {
            on_notify(payload);
        }
        // Kept alive so a wait without a qualifying frame hangs like a silent device
        *self.handler.lock().unwrap() = Some(on_notify);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        _address: &DeviceAddress,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.record(Call::Unsubscribe(characteristic));
        self.handler.lock().unwrap().take();
        if self.unsubscribe_fails {
            return Err(TransportError::Other("unsubscribe rejected".into()));
        }
        Ok(())
    }

    async fn write(
        &self,
        _address: &DeviceAddress,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.record(Call::Write(characteristic, data.to_vec()));
        if self.write_fails {
            return Err(TransportError::NotConnected("write rejected".into()));
        }
        Ok(())
    }
}

pub struct MockLinkReset {
    calls: Arc<Mutex<Vec<Call>>>,
}

#[async_trait]
impl LinkReset for MockLinkReset {
    async fn reset(&self, address: &DeviceAddress) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::LinkReset(address.to_string()));
    }
}
