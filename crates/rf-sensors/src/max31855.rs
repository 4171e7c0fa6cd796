//! MAX31855 cold-junction compensated thermocouple-to-digital frames.
//!
//! Frame layout (32 bits, MSB first):
//!
//! | bits   | meaning                                        |
//! |--------|------------------------------------------------|
//! | 31..18 | thermocouple temperature, signed, 0.25 degC    |
//! | 16     | fault                                          |
//! | 15..4  | cold junction temperature, signed, 0.0625 degC |
//! | 2      | short to VCC                                   |
//! | 1      | short to GND                                   |
//! | 0      | open circuit                                   |
//!
//! A floating bus reads back all ones, so all three cause bits set means the
//! amplifier is absent.

use crate::ThermocoupleStatus;

const FAULT: u32 = 1 << 16;
const OPEN: u32 = 0b001;
const SHORT_GND: u32 = 0b010;
const SHORT_VCC: u32 = 0b100;
const CAUSES: u32 = OPEN | SHORT_GND | SHORT_VCC;

const TC_LSB: f64 = 0.25;
const CJ_LSB: f64 = 0.0625;

/// One decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Thermocouple temperature (degC), NaN on any fault.
    pub temperature: f64,
    /// Cold junction (amplifier die) temperature (degC), NaN when missing.
    pub cold_junction: f64,
    pub status: ThermocoupleStatus,
}

pub fn decode(frame: u32) -> Reading {
    let cold = (((frame << 16) as i32) >> 20) as f64 * CJ_LSB;
    let causes = frame & CAUSES;

    if causes == CAUSES {
        return Reading {
            temperature: f64::NAN,
            cold_junction: f64::NAN,
            status: ThermocoupleStatus::Missing,
        };
    }
    if frame & FAULT != 0 || causes != 0 {
        let status = if causes & OPEN != 0 {
            ThermocoupleStatus::Open
        } else if causes & SHORT_GND != 0 {
            ThermocoupleStatus::ShortToGnd
        } else if causes & SHORT_VCC != 0 {
            ThermocoupleStatus::ShortToVcc
        } else {
            ThermocoupleStatus::Open
        };
        return Reading {
            temperature: f64::NAN,
            cold_junction: cold,
            status,
        };
    }

    Reading {
        temperature: ((frame as i32) >> 18) as f64 * TC_LSB,
        cold_junction: cold,
        status: ThermocoupleStatus::Ok,
    }
}

/// Build a healthy frame. Values are quantised to the device resolution.
pub fn encode(temperature: f64, cold_junction: f64) -> u32 {
    let tc = quantise(temperature, TC_LSB, 14);
    let cj = quantise(cold_junction, CJ_LSB, 12);
    ((tc & 0x3FFF) << 18) | ((cj & 0x0FFF) << 4)
}

/// Build a frame reporting `status`. Healthy statuses encode a zero reading.
pub fn encode_fault(status: ThermocoupleStatus, cold_junction: f64) -> u32 {
    let cause = match status {
        ThermocoupleStatus::Missing => return u32::MAX,
        ThermocoupleStatus::Open => OPEN,
        ThermocoupleStatus::ShortToGnd => SHORT_GND,
        ThermocoupleStatus::ShortToVcc => SHORT_VCC,
        ThermocoupleStatus::Ok | ThermocoupleStatus::Disabled => return encode(0.0, cold_junction),
    };
    let cj = quantise(cold_junction, CJ_LSB, 12);
    FAULT | ((cj & 0x0FFF) << 4) | cause
}

fn quantise(value: f64, lsb: f64, bits: u32) -> u32 {
    let max = (1i32 << (bits - 1)) - 1;
    let min = -(1i32 << (bits - 1));
    let counts = if value.is_finite() {
        ((value / lsb).round() as i32).clamp(min, max)
    } else {
        0
    };
    counts as u32
}
