use crate::error::UsageError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Highest fan level the controller accepts
pub const MAX_VELOCITY: u8 = 10;

/// A named sensor reading carried by the telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    TemperatureC,
    TemperatureF,
    Humidity,
    VpdKpa,
}

impl Reading {
    /// All readings, in the order they are reported
    pub const ALL: [Reading; 4] = [
        Reading::TemperatureC,
        Reading::TemperatureF,
        Reading::Humidity,
        Reading::VpdKpa,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TemperatureC => "temperature_c",
            Self::TemperatureF => "temperature_f",
            Self::Humidity => "humidity",
            Self::VpdKpa => "vpd_kpa",
        }
    }

    /// Comma separated list of every reading name, for help output
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(Reading::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Reading {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| UsageError::UnknownReading(s.to_string()))
    }
}

/// Decoded telemetry. Field order is the output order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReadings {
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub humidity: f64,
    pub vpd_kpa: f64,
}

impl SensorReadings {
    pub fn get(&self, reading: Reading) -> f64 {
        match reading {
            Reading::TemperatureC => self.temperature_c,
            Reading::TemperatureF => self.temperature_f,
            Reading::Humidity => self.humidity,
            Reading::VpdKpa => self.vpd_kpa,
        }
    }
}

/// Target fan level, guaranteed to be in `0..=MAX_VELOCITY`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanCommand {
    velocity: u8,
}

impl FanCommand {
    pub fn new(velocity: u8) -> Result<Self, UsageError> {
        if velocity > MAX_VELOCITY {
            return Err(UsageError::VelocityOutOfRange(i64::from(velocity)));
        }
        Ok(Self { velocity })
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }
}

impl TryFrom<i64> for FanCommand {
    type Error = UsageError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| UsageError::VelocityOutOfRange(value))
            .and_then(Self::new)
    }
}

impl FromStr for FanCommand {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| UsageError::InvalidVelocity(s.to_string()))?;
        Self::try_from(value)
    }
}

/// Upper-case `XX:XX:XX:XX:XX:XX` hardware address of the peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceAddress {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        let octets: Vec<&str> = normalized.split(':').collect();
        let valid = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

        if !valid {
            return Err(UsageError::InvalidAddress(s.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A device seen during a discovery scan
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub signal_strength: Option<i16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_names_round_trip() {
        for reading in Reading::ALL {
            assert_eq!(reading.name().parse::<Reading>().unwrap(), reading);
        }
        assert!(matches!(
            "pressure".parse::<Reading>(),
            Err(UsageError::UnknownReading(_))
        ));
    }

    #[test]
    fn test_fan_command_range() {
        assert_eq!(FanCommand::new(0).unwrap().velocity(), 0);
        assert_eq!(FanCommand::new(10).unwrap().velocity(), 10);
        assert!(FanCommand::new(11).is_err());
        assert!(FanCommand::try_from(-1).is_err());
        assert!("abc".parse::<FanCommand>().is_err());
        assert_eq!("7".parse::<FanCommand>().unwrap().velocity(), 7);
    }

    #[test]
    fn test_address_is_normalized() {
        let addr: DeviceAddress = "aa:bb:cc:dd:ee:0f".parse().unwrap();
        assert_eq!(addr.as_str(), "AA:BB:CC:DD:EE:0F");
        assert!("AA:BB:CC".parse::<DeviceAddress>().is_err());
        assert!("GG:BB:CC:DD:EE:FF".parse::<DeviceAddress>().is_err());
    }
}
