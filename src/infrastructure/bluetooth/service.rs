//! Fan Service Module
//!
//! Entry point for the CLI: presence check, then a resilient read or write.

use crate::domain::models::{DeviceAddress, FanCommand, SensorReadings};
use crate::domain::settings::BleSettings;
use crate::error::Result;
use crate::infrastructure::bluetooth::scanner;
use crate::infrastructure::bluetooth::session::{ReadSession, WriteSession};
use crate::infrastructure::bluetooth::transport::BleTransport;
use crate::infrastructure::link_reset::LinkReset;
use crate::infrastructure::resilience::{with_retry, RetryPolicy};
use std::sync::Arc;
use tracing::info;

pub struct FanService {
    transport: Arc<dyn BleTransport>,
    link_reset: Arc<dyn LinkReset>,
    ble: BleSettings,
    policy: RetryPolicy,
}

impl FanService {
    pub fn new(
        transport: Arc<dyn BleTransport>,
        link_reset: Arc<dyn LinkReset>,
        ble: BleSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            link_reset,
            ble,
            policy,
        }
    }

    /// Non-fatal discovery scan, skipped when disabled in settings
    pub async fn check_presence(&self, address: &DeviceAddress) {
        if self.ble.presence_check_enabled {
            scanner::check_presence(self.transport.as_ref(), address, self.ble.scan_duration())
                .await;
        }
    }

    /// Read all sensor values, retrying until the deadline
    pub async fn read_sensors(&self, address: &DeviceAddress) -> Result<SensorReadings> {
        let session = ReadSession::new(
            self.transport.clone(),
            self.link_reset.clone(),
            self.ble.read_char_uuid,
            address.clone(),
        );
        let timeout = self.policy.attempt_timeout;

        let readings = with_retry(&self.policy, |_| session.attempt(timeout)).await?;
        info!("Read {:?} from {}", readings, address);
        Ok(readings)
    }

    /// Set the fan level, retrying until the deadline
    pub async fn set_fan(&self, address: &DeviceAddress, command: FanCommand) -> Result<()> {
        let session = WriteSession::new(
            self.transport.clone(),
            self.link_reset.clone(),
            self.ble.write_char_uuid,
            address.clone(),
            command,
        );
        let timeout = self.policy.attempt_timeout;

        with_retry(&self.policy, |_| session.attempt(timeout)).await?;
        info!("Fan on {} set to {}", address, command.velocity());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::infrastructure::bluetooth::mock::{Call, MockTransport};
    use crate::infrastructure::bluetooth::protocol::{self, FRAME_LEN};

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    fn service(transport: &Arc<MockTransport>) -> FanService {
        FanService::new(
            transport.clone(),
            Arc::new(transport.link_reset()),
            BleSettings::default(),
            RetryPolicy::default(),
        )
    }

    fn address() -> DeviceAddress {
        ADDRESS.parse().unwrap()
    }

    fn frame() -> Vec<u8> {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[8..14].copy_from_slice(&[0x09, 0xC4, 0x0B, 0xB8, 0x00, 0x64]);
        frame
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_recovers_from_flaky_connect() {
        let transport = Arc::new(
            MockTransport::new()
                .failing_connects(2)
                .with_notifications(vec![vec![0u8; 4], frame()]),
        );

        let readings = service(&transport).read_sensors(&address()).await.unwrap();
        assert_eq!(
            readings,
            SensorReadings {
                temperature_c: 25.0,
                temperature_f: 77.0,
                humidity: 30.0,
                vpd_kpa: 1.0,
            }
        );

        // Every attempt restarts with a link reset
        assert_eq!(transport.count(|c| matches!(c, Call::LinkReset(_))), 3);
        assert_eq!(transport.count(|c| matches!(c, Call::Connect(_))), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_exhausts_when_device_stays_silent() {
        let transport = Arc::new(MockTransport::new().with_notifications(vec![vec![0u8; 2]]));
        let started = tokio::time::Instant::now();

        let err = service(&transport)
            .read_sensors(&address())
            .await
            .unwrap_err();

        // A single 60 s attempt consumes the whole budget
        match err {
            Error::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 1);
                assert!(matches!(*last, Error::Timeout(_)));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert!(started.elapsed().as_secs() <= 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_writes_command() {
        let transport = Arc::new(MockTransport::new());
        service(&transport)
            .set_fan(&address(), FanCommand::new(5).unwrap())
            .await
            .unwrap();

        let writes: Vec<Vec<u8>> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(_, packet) => Some(packet),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![protocol::encode(FanCommand::new(5).unwrap())]);
        assert_eq!(&writes[0][writes[0].len() - 2..], &[0x0c, 0xab]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_reads_device_missing_from_scan() {
        let transport = Arc::new(
            MockTransport::new()
                .with_devices(&["11:22:33:44:55:66"])
                .with_notifications(vec![frame()]),
        );
        let service = service(&transport);

        service.check_presence(&address()).await;
        let readings = service.read_sensors(&address()).await.unwrap();
        assert_eq!(readings.humidity, 30.0);
        assert_eq!(transport.calls()[0], Call::Discover);
        assert_eq!(transport.count(|c| matches!(c, Call::Connect(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_releases_link_after_failed_write() {
        let transport = Arc::new(MockTransport::new().failing_write());
        let err = service(&transport)
            .set_fan(&address(), FanCommand::new(4).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Exhausted { .. }));
        // One write and one disconnect per attempt
        let writes = transport.count(|c| matches!(c, Call::Write(..)));
        assert!(writes > 1);
        assert_eq!(transport.count(|c| matches!(c, Call::Disconnect(_))), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_exhausts_after_repeated_failures() {
        let transport = Arc::new(MockTransport::new().failing_connects(u32::MAX));
        let err = service(&transport)
            .set_fan(&address(), FanCommand::new(3).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Exhausted { attempts: 9, .. }));
        assert_eq!(transport.count(|c| matches!(c, Call::Write(..))), 0);
    }

    #[tokio::test]
    async fn test_presence_check_can_be_disabled() {
        let transport = Arc::new(MockTransport::new());
        let service = FanService::new(
            transport.clone(),
            Arc::new(transport.link_reset()),
            BleSettings {
                presence_check_enabled: false,
                ..BleSettings::default()
            },
            RetryPolicy::default(),
        );

        service.check_presence(&address()).await;
        assert!(transport.calls().is_empty());
    }
}
