use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Invalid input, detected before any radio traffic
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("fan level must be 0-10, got: {0}")]
    VelocityOutOfRange(i64),
    #[error("fan level must be an integer 0-10, got: {0:?}")]
    InvalidVelocity(String),
    #[error("unknown reading {0:?}")]
    UnknownReading(String),
    #[error("invalid device address {0:?}, expected XX:XX:XX:XX:XX:XX")]
    InvalidAddress(String),
    #[error("a fan level is required for \"set\"")]
    MissingVelocity,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame size: {actual} (expected {expected})")]
    InvalidLength { expected: usize, actual: usize },
}

/// Failures of the BLE link itself. All of them are worth retrying.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no Bluetooth adapters found")]
    NoAdapter,
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("device {0} is not connected")]
    NotConnected(String),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("notification stream closed before a telemetry frame arrived")]
    NotificationsClosed,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("gave up after {attempts} attempts in {elapsed:.1?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// Usage errors repeat identically, everything else may clear up on the next attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Usage(_) | Self::Exhausted { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
