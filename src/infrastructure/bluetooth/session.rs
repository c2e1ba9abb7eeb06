//! Read and write sessions against the controller.
//!
//! A session runs one attempt from a clean link: reset, connect, exchange,
//! disconnect. Whatever an attempt leaves open when it fails or times out is
//! released before the error is returned, so the next attempt starts over.

use crate::domain::models::{DeviceAddress, FanCommand, SensorReadings};
use crate::error::{Result, TransportError};
use crate::infrastructure::bluetooth::protocol::{self, FRAME_LEN};
use crate::infrastructure::bluetooth::transport::{BleTransport, NotificationHandler};
use crate::infrastructure::link_reset::LinkReset;
use crate::infrastructure::resilience::with_timeout;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info_span, Instrument, Span};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Disconnected,
    Connected,
    Subscribed,
    FrameReceived,
    Decoded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Disconnected,
    Connected,
    Written,
}

/// Telemetry read: subscribe, take the first 34-byte frame, decode
pub struct ReadSession {
    transport: Arc<dyn BleTransport>,
    link_reset: Arc<dyn LinkReset>,
    characteristic: Uuid,
    address: DeviceAddress,
    state: Mutex<ReadState>,
    span: Span,
}

impl ReadSession {
    pub fn new(
        transport: Arc<dyn BleTransport>,
        link_reset: Arc<dyn LinkReset>,
        characteristic: Uuid,
        address: DeviceAddress,
    ) -> Self {
        let span = info_span!("read_session", address = %address);
        Self {
            transport,
            link_reset,
            characteristic,
            address,
            state: Mutex::new(ReadState::Disconnected),
            span,
        }
    }

    pub fn state(&self) -> ReadState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ReadState) {
        debug!(parent: &self.span, "read session -> {:?}", state);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// One bounded attempt. Open resources are released on failure.
    pub async fn attempt(&self, timeout: Duration) -> Result<SensorReadings> {
        let result = with_timeout(timeout, self.run().instrument(self.span.clone())).await;
        if result.is_err() {
            self.release().instrument(self.span.clone()).await;
        }
        result
    }

    async fn run(&self) -> Result<SensorReadings> {
        self.set_state(ReadState::Disconnected);
        self.link_reset.reset(&self.address).await;

        self.transport.connect(&self.address).await?;
        self.set_state(ReadState::Connected);

        let (tx, rx) = oneshot::channel();
        self.transport
            .subscribe(&self.address, self.characteristic, self.frame_filter(tx))
            .await?;
        self.set_state(ReadState::Subscribed);

        let frame = rx.await.map_err(|_| TransportError::NotificationsClosed)?;
        self.set_state(ReadState::FrameReceived);

        // Only the first qualifying frame is used
        self.transport
            .unsubscribe(&self.address, self.characteristic)
            .await?;

        let readings = protocol::decode(&frame).map_err(TransportError::from)?;
        self.set_state(ReadState::Decoded);

        self.transport.disconnect(&self.address).await?;
        self.set_state(ReadState::Disconnected);

        Ok(readings)
    }

    /// One-shot handler: hands off the first 34-byte payload, drops everything else
    fn frame_filter(&self, tx: oneshot::Sender<Vec<u8>>) -> NotificationHandler {
        let span = self.span.clone();
        let mut slot = Some(tx);
        Box::new(move |payload: &[u8]| {
            let _enter = span.enter();
            debug!("got {:02x?}", payload);

            if payload.len() != FRAME_LEN {
                debug!("dumped {} bytes", payload.len());
                return;
            }
            if let Some(tx) = slot.take() {
                let _ = tx.send(payload.to_vec());
            }
        })
    }

    async fn release(&self) {
        let state = self.state();
        if matches!(state, ReadState::Subscribed | ReadState::FrameReceived) {
            if let Err(e) = self
                .transport
                .unsubscribe(&self.address, self.characteristic)
                .await
            {
                debug!("unsubscribe during release failed: {}", e);
            }
        }
        // A connect cut short by the timeout may still complete underneath us
        if let Err(e) = self.transport.disconnect(&self.address).await {
            debug!("disconnect during release failed: {}", e);
        }
        self.set_state(ReadState::Disconnected);
    }
}

/// Fan-speed write, no reply is expected
pub struct WriteSession {
    transport: Arc<dyn BleTransport>,
    link_reset: Arc<dyn LinkReset>,
    characteristic: Uuid,
    address: DeviceAddress,
    command: FanCommand,
    state: Mutex<WriteState>,
    span: Span,
}

impl WriteSession {
    pub fn new(
        transport: Arc<dyn BleTransport>,
        link_reset: Arc<dyn LinkReset>,
        characteristic: Uuid,
        address: DeviceAddress,
        command: FanCommand,
    ) -> Self {
        let span = info_span!("write_session", address = %address, velocity = command.velocity());
        Self {
            transport,
            link_reset,
            characteristic,
            address,
            command,
            state: Mutex::new(WriteState::Disconnected),
            span,
        }
    }

    pub fn state(&self) -> WriteState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: WriteState) {
        debug!(parent: &self.span, "write session -> {:?}", state);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub async fn attempt(&self, timeout: Duration) -> Result<()> {
        let result = with_timeout(timeout, self.run().instrument(self.span.clone())).await;
        if result.is_err() {
            self.release().instrument(self.span.clone()).await;
        }
        result
    }

    async fn run(&self) -> Result<()> {
        self.set_state(WriteState::Disconnected);
        self.link_reset.reset(&self.address).await;

        self.transport.connect(&self.address).await?;
        self.set_state(WriteState::Connected);

        let packet = protocol::encode(self.command);
        self.transport
            .write(&self.address, self.characteristic, &packet)
            .await?;
        self.set_state(WriteState::Written);

        self.transport.disconnect(&self.address).await?;
        self.set_state(WriteState::Disconnected);
        Ok(())
    }

    async fn release(&self) {
        if let Err(e) = self.transport.disconnect(&self.address).await {
            debug!("disconnect during release failed: {}", e);
        }
        self.set_state(WriteState::Disconnected);
    }
}
