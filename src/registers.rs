//! Register map definitions for the BMP180 pressure sensor.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::params::Oversampling;

/// Default 7-bit bus address of the BMP180.
pub const DEFAULT_ADDRESS: u8 = 0x77;
/// Largest valid 7-bit bus address.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Register address of the first calibration coefficient (`AC1_MSB`).
pub const REG_CALIBRATION: u8 = 0xAA;
/// Register address of `ID`.
pub const REG_CHIP_ID: u8 = 0xD0;
/// Register address of the silicon version.
pub const REG_VERSION: u8 = 0xD1;
/// Register address of `SOFT_RESET`.
pub const REG_SOFT_RESET: u8 = 0xE0;
/// Register address of `CTRL_MEAS`.
pub const REG_CONTROL: u8 = 0xF4;
/// Register address of `OUT_MSB`.
pub const REG_RESULT: u8 = 0xF6;

/// Value held by the `ID` register.
pub const CHIP_ID: u8 = 0x55;
/// Writing this value to `SOFT_RESET` performs a power-on-reset sequence.
pub const SOFT_RESET_COMMAND: u8 = 0xB6;

/// Size of the calibration EEPROM block.
pub const CALIBRATION_LEN: usize = 22;
/// Bytes returned for a temperature conversion (`OUT_MSB`, `OUT_LSB`).
pub const TEMPERATURE_RESULT_LEN: usize = 2;
/// Bytes returned for a pressure conversion (`OUT_MSB`, `OUT_LSB`, `OUT_XLSB`).
pub const PRESSURE_RESULT_LEN: usize = 3;
/// Largest block accepted by a single bus transaction.
pub const MAX_BLOCK_LEN: usize = 32;

/// Measurement selector written to `CTRL_MEAS[4:0]` for a temperature conversion.
pub const MEASUREMENT_TEMPERATURE: u8 = 0x0E;
/// Measurement selector written to `CTRL_MEAS[4:0]` for a pressure conversion.
pub const MEASUREMENT_PRESSURE: u8 = 0x14;

/// Bitfield representation of the `CTRL_MEAS` register (address `0xF4`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    // Measurement selector (bits 4:0).
    pub measurement: B5,
    // Start of conversion, cleared by the device once the result is ready (bit 5).
    pub start_conversion: bool,
    // Pressure oversampling ratio (bits 7:6).
    pub oversampling: Oversampling,
}

impl Control {
    /// Command word that starts a temperature conversion.
    pub fn temperature() -> Self {
        Self::new()
            .with_measurement(MEASUREMENT_TEMPERATURE)
            .with_start_conversion(true)
            .with_oversampling(Oversampling::UltraLowPower)
    }

    /// Command word that starts a pressure conversion at the given oversampling ratio.
    pub fn pressure(oversampling: Oversampling) -> Self {
        Self::new()
            .with_measurement(MEASUREMENT_PRESSURE)
            .with_start_conversion(true)
            .with_oversampling(oversampling)
    }
}

impl From<u8> for Control {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<Control> for u8 {
    fn from(value: Control) -> Self {
        value.into_bytes()[0]
    }
}
