//! Fitness Machine Service (FTMS) control-point and notification codec.
//!
//! Only the subset a smart trainer needs for racing: reset, target power
//! (ERG), simulation grade, and the power fields of Indoor Bike Data and
//! Cycling Power Measurement notifications. All fields are little-endian.

use racer_core::command::{SetpointKind, TrainerSetpoint, Validated};
use thiserror::Error;

pub const OP_RESET: u8 = 0x01;
pub const OP_SET_TARGET_POWER: u8 = 0x05;
pub const OP_SET_SIMULATION: u8 = 0x11;

/// Simulation grade range accepted by trainers (percent).
pub const SIM_GRADE_MIN: f64 = -10.0;
pub const SIM_GRADE_MAX: f64 = 20.0;

const FLAG_AVG_SPEED: u16 = 0x0002;
const FLAG_INST_CADENCE: u16 = 0x0004;
const FLAG_AVG_CADENCE: u16 = 0x0008;
const FLAG_TOTAL_DISTANCE: u16 = 0x0010;
const FLAG_RESISTANCE: u16 = 0x0020;
const FLAG_INST_POWER: u16 = 0x0040;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FtmsError {
    #[error("payload truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndoorBikeData {
    /// Instantaneous speed in km/h.
    pub speed_kmh: f64,
    pub power_w: Option<i16>,
}

pub fn encode_reset() -> Vec<u8> {
    vec![OP_RESET]
}

pub fn encode_target_power(watts: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    out.push(OP_SET_TARGET_POWER);
    out.extend_from_slice(&watts.to_le_bytes());
    out
}

/// Wind speed is always zero. Grade is sent in hundredths of a percent.
pub fn encode_simulation_grade(grade_percent: f64) -> Vec<u8> {
    let grade = grade_percent.clamp(SIM_GRADE_MIN, SIM_GRADE_MAX);
    let hundredths = (grade * 100.0).round() as i16;
    let mut out = Vec::with_capacity(5);
    out.push(OP_SET_SIMULATION);
    out.extend_from_slice(&0i16.to_le_bytes());
    out.extend_from_slice(&hundredths.to_le_bytes());
    out
}

/// Control-point bytes for a validated setpoint.
pub fn encode_setpoint(setpoint: &TrainerSetpoint<Validated>) -> Vec<u8> {
    encode_command(setpoint.kind(), setpoint.value())
}

/// Control-point bytes for a value that already passed validation.
pub fn encode_command(kind: SetpointKind, value: f64) -> Vec<u8> {
    match kind {
        SetpointKind::Grade => encode_simulation_grade(value),
        SetpointKind::TargetPower => encode_target_power(value.round().clamp(0.0, u16::MAX as f64) as u16),
    }
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, FtmsError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(FtmsError::Truncated {
            needed: offset + 2,
            got: data.len(),
        })
}

fn read_i16(data: &[u8], offset: usize) -> Result<i16, FtmsError> {
    read_u16(data, offset).map(|v| v as i16)
}

/// Decodes an Indoor Bike Data notification. Power is `None` when the
/// flag is clear or the field is cut off.
pub fn decode_indoor_bike_data(data: &[u8]) -> Result<IndoorBikeData, FtmsError> {
    let flags = read_u16(data, 0)?;
    let speed_kmh = read_u16(data, 2)? as f64 / 100.0;
    let mut offset = 4;

    if flags & FLAG_AVG_SPEED != 0 {
        offset += 2;
    }
    if flags & FLAG_INST_CADENCE != 0 {
        offset += 2;
    }
    if flags & FLAG_AVG_CADENCE != 0 {
        offset += 2;
    }
    if flags & FLAG_TOTAL_DISTANCE != 0 {
        // uint24
        offset += 3;
    }
    if flags & FLAG_RESISTANCE != 0 {
        offset += 2;
    }

    let power_w = if flags & FLAG_INST_POWER != 0 {
        read_i16(data, offset).ok()
    } else {
        None
    };

    Ok(IndoorBikeData { speed_kmh, power_w })
}

/// Decodes the instantaneous power of a Cycling Power Measurement.
pub fn decode_cycling_power(data: &[u8]) -> Result<i16, FtmsError> {
    read_i16(data, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use racer_core::command::ResistanceLimits;

    #[test]
    fn simulation_grade_bytes() {
        assert_eq!(encode_simulation_grade(2.5), vec![0x11, 0x00, 0x00, 0xFA, 0x00]);
        // -10% floor: -1000 = 0xFC18
        assert_eq!(encode_simulation_grade(-15.0), vec![0x11, 0x00, 0x00, 0x18, 0xFC]);
        assert_eq!(encode_simulation_grade(35.0)[3..], [0xD0, 0x07]);
    }

    #[test]
    fn target_power_bytes() {
        assert_eq!(encode_target_power(250), vec![0x05, 0xFA, 0x00]);
        let sp = TrainerSetpoint::target_power(300.4)
            .validate(&ResistanceLimits::default())
            .unwrap();
        assert_eq!(encode_setpoint(&sp), vec![0x05, 0x2C, 0x01]);
    }

    #[test]
    fn bike_data_power_after_skipped_fields() {
        // flags: inst cadence + total distance + power
        let flags: u16 = 0x0004 | 0x0010 | 0x0040;
        let mut data = flags.to_le_bytes().to_vec();
        data.extend_from_slice(&3000u16.to_le_bytes()); // 30.00 km/h
        data.extend_from_slice(&[0xB4, 0x00]); // cadence
        data.extend_from_slice(&[0x01, 0x02, 0x03]); // distance
        data.extend_from_slice(&215i16.to_le_bytes());

        let parsed = decode_indoor_bike_data(&data).unwrap();
        assert_eq!(parsed.speed_kmh, 30.0);
        assert_eq!(parsed.power_w, Some(215));
    }

    #[test]
    fn bike_data_without_power() {
        let data = [0x00, 0x00, 0x10, 0x27];
        let parsed = decode_indoor_bike_data(&data).unwrap();
        assert_eq!(parsed.speed_kmh, 100.0);
        assert_eq!(parsed.power_w, None);
    }

    #[test]
    fn truncated_payloads() {
        assert_eq!(
            decode_indoor_bike_data(&[0x40]),
            Err(FtmsError::Truncated { needed: 2, got: 1 })
        );
        // power flag set but field missing
        let parsed = decode_indoor_bike_data(&[0x40, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(parsed.power_w, None);
        assert!(decode_cycling_power(&[0x00, 0x00, 0x10]).is_err());
    }

    #[test]
    fn cycling_power_at_offset_two() {
        assert_eq!(decode_cycling_power(&[0x00, 0x00, 0x2C, 0x01]), Ok(300));
    }
}
