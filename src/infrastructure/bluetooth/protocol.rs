//! AC Infinity Controller Protocol
//!
//! Wire layouts for the two GATT characteristics the controller exposes:
//! the telemetry notification and the fan-speed command.

use crate::domain::models::{FanCommand, SensorReadings};
use crate::error::FrameError;
use uuid::Uuid;

/// Notify characteristic carrying the periodic telemetry frame
pub const READ_CHAR_UUID: Uuid = Uuid::from_u128(0x70d51002_2c7f_4e75_ae8a_d758951ce4e0);

/// Write characteristic accepting command packets
pub const WRITE_CHAR_UUID: Uuid = Uuid::from_u128(0x70d51001_2c7f_4e75_ae8a_d758951ce4e0);

/// Length of the only notification payload treated as telemetry
pub const FRAME_LEN: usize = 34;

/// Device-identifying prefix, not covered by the CRC
pub const COMMAND_PREFIX: [u8; 8] = [0xa5, 0x00, 0x00, 0x08, 0x01, 0x3b, 0xb1, 0x91];
pub const COMMAND_HEADER: [u8; 4] = [0x00, 0x03, 0x10, 0x01];
pub const COMMAND_POWER: [u8; 2] = [0x02, 0x12];
pub const COMMAND_DIRECTION: [u8; 1] = [0x01];
pub const COMMAND_PARAMS: [u8; 2] = [0xff, 0x01];

/// Total size of an encoded command packet
pub const COMMAND_LEN: usize = COMMAND_PREFIX.len()
    + COMMAND_HEADER.len()
    + COMMAND_POWER.len()
    + COMMAND_DIRECTION.len()
    + 1
    + COMMAND_PARAMS.len()
    + 2;

/// Byte offsets of the big-endian u16 fields
mod offsets {
    pub const TEMPERATURE: usize = 8;
    pub const HUMIDITY: usize = 10;
    pub const VPD: usize = 12;
}

/// Raw fields are fixed-point hundredths
const SCALE: f64 = 100.0;

/// Parse a 34-byte telemetry frame
///
/// # Frame Structure (34 bytes)
///
/// ```text
/// [0-7]   : Unknown, not interpreted
/// [8-9]   : Temperature (u16 big-endian, hundredths of °C)
/// [10-11] : Relative humidity (u16 big-endian, hundredths of %)
/// [12-13] : Vapour pressure deficit (u16 big-endian, hundredths of kPa)
/// [14-33] : Unknown, not interpreted
/// ```
pub fn decode(frame: &[u8]) -> Result<SensorReadings, FrameError> {
    if frame.len() != FRAME_LEN {
        return Err(FrameError::InvalidLength {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }

    let temperature_c = read_u16_be(frame, offsets::TEMPERATURE) as f64 / SCALE;

    Ok(SensorReadings {
        temperature_c,
        temperature_f: (temperature_c * 9.0) / 5.0 + 32.0,
        humidity: read_u16_be(frame, offsets::HUMIDITY) as f64 / SCALE,
        vpd_kpa: read_u16_be(frame, offsets::VPD) as f64 / SCALE,
    })
}

fn read_u16_be(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Build the fan-speed command packet
///
/// ```text
/// prefix(8) | header(4) | power(2) | direction(1) | velocity(1) | params(2) | crc(2)
///           |<---------------------- crc covers ---------------------->|
/// ```
pub fn encode(command: FanCommand) -> Vec<u8> {
    let mut body = Vec::with_capacity(COMMAND_LEN - COMMAND_PREFIX.len() - 2);
    body.extend_from_slice(&COMMAND_HEADER);
    body.extend_from_slice(&COMMAND_POWER);
    body.extend_from_slice(&COMMAND_DIRECTION);
    body.push(command.velocity());
    body.extend_from_slice(&COMMAND_PARAMS);

    let crc = crc16_ccitt_false(&body);

    let mut packet = Vec::with_capacity(COMMAND_LEN);
    packet.extend_from_slice(&COMMAND_PREFIX);
    packet.extend_from_slice(&body);
    packet.extend_from_slice(&crc.to_be_bytes());
    packet
}

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection, no final xor
pub fn crc16_ccitt_false(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(temperature: u16, humidity: u16, vpd: u16) -> Vec<u8> {
        let mut frame = vec![0xAAu8; FRAME_LEN];
        frame[8..10].copy_from_slice(&temperature.to_be_bytes());
        frame[10..12].copy_from_slice(&humidity.to_be_bytes());
        frame[12..14].copy_from_slice(&vpd.to_be_bytes());
        frame
    }

    #[test]
    fn test_decode_known_frame() {
        let readings = decode(&frame_with(0x09C4, 0x0BB8, 0x0064)).unwrap();
        assert_eq!(readings.temperature_c, 25.0);
        assert_eq!(readings.temperature_f, 77.0);
        assert_eq!(readings.humidity, 30.0);
        assert_eq!(readings.vpd_kpa, 1.0);
    }

    #[test]
    fn test_decode_humidity_formula() {
        let readings = decode(&frame_with(0, 2500, 0)).unwrap();
        assert_eq!(readings.humidity, 25.0);
        assert_eq!(readings.temperature_c, 0.0);
        assert_eq!(readings.temperature_f, 32.0);
    }

    #[test]
    fn test_decode_ignores_other_bytes() {
        let mut frame = frame_with(1234, 5678, 90);
        let expected = decode(&frame).unwrap();
        frame[..8].fill(0x00);
        frame[14..].fill(0xFF);
        assert_eq!(decode(&frame).unwrap(), expected);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(matches!(
            decode(&[0u8; 20]),
            Err(FrameError::InvalidLength {
                expected: 34,
                actual: 20
            })
        ));
        assert!(decode(&[0u8; 35]).is_err());
    }

    #[test]
    fn test_crc_check_value() {
        assert_eq!(crc16_ccitt_false(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_encode_velocity_5() {
        let packet = encode(FanCommand::new(5).unwrap());
        assert_eq!(
            packet,
            vec![
                0xa5, 0x00, 0x00, 0x08, 0x01, 0x3b, 0xb1, 0x91, // prefix
                0x00, 0x03, 0x10, 0x01, // header
                0x02, 0x12, // power
                0x01, // direction
                0x05, // velocity
                0xff, 0x01, // params
                0x0c, 0xab, // crc
            ]
        );
        assert_eq!(packet.len(), COMMAND_LEN);
    }

    #[test]
    fn test_encode_crc_covers_body_only() {
        for velocity in 0..=10 {
            let packet = encode(FanCommand::new(velocity).unwrap());
            let body = &packet[COMMAND_PREFIX.len()..packet.len() - 2];
            let crc = crc16_ccitt_false(body).to_be_bytes();
            assert_eq!(&packet[packet.len() - 2..], &crc);
            assert_eq!(body[7], velocity);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let command = FanCommand::new(3).unwrap();
        assert_eq!(encode(command), encode(command));
    }
}
