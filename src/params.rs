//! Strongly typed parameter enumerations for the BMP180 driver.
//!
//! The chip defines one temperature conversion and four pressure conversions
//! trading conversion time for resolution. Each conversion is described by an
//! [`OversamplingSetting`] record; the four pressure records are also reachable
//! through the [`Oversampling`] enum.
//!
//! # Examples
//!
//! ```rust
//! use bmp180::params::{Oversampling, OversamplingSetting};
//!
//! let setting = OversamplingSetting::from(Oversampling::HighResolution);
//! assert_eq!(setting, OversamplingSetting::HIGH_RESOLUTION);
//! assert_eq!(setting.command, 0xB4);
//! ```

use core::time::Duration;

use modular_bitfield::prelude::Specifier;

/// Pressure oversampling ratio encoded in `CTRL_MEAS.OSS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 2]
pub enum Oversampling {
    /// One internal sample, 4.5 ms conversion.
    UltraLowPower = 0b00,
    /// Two internal samples, 7.5 ms conversion.
    Standard = 0b01,
    /// Four internal samples, 13.5 ms conversion.
    HighResolution = 0b10,
    /// Eight internal samples, 25.5 ms conversion.
    UltraHighResolution = 0b11,
}

/// Conversion command together with the wait needed before its result is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OversamplingSetting {
    /// Oversampling ratio exponent, or [`OversamplingSetting::TEMPERATURE_MODE`].
    pub mode: u8,
    /// Value written to `CTRL_MEAS` to start the conversion.
    pub command: u8,
    /// Time to wait before reading the result registers.
    pub conversion_delay: Duration,
}

impl OversamplingSetting {
    /// Mode sentinel of the temperature conversion.
    pub const TEMPERATURE_MODE: u8 = 255;

    /// Temperature conversion.
    pub const TEMPERATURE: Self = Self {
        mode: Self::TEMPERATURE_MODE,
        command: 0x2E,
        conversion_delay: Duration::from_millis(8),
    };
    /// Pressure, ultra low power.
    pub const ULTRA_LOW_POWER: Self = Self {
        mode: 0,
        command: 0x34,
        conversion_delay: Duration::from_millis(5),
    };
    /// Pressure, standard.
    pub const STANDARD: Self = Self {
        mode: 1,
        command: 0x74,
        conversion_delay: Duration::from_millis(8),
    };
    /// Pressure, high resolution.
    pub const HIGH_RESOLUTION: Self = Self {
        mode: 2,
        command: 0xB4,
        conversion_delay: Duration::from_millis(14),
    };
    /// Pressure, ultra high resolution.
    pub const ULTRA_HIGH_RESOLUTION: Self = Self {
        mode: 3,
        command: 0xF4,
        conversion_delay: Duration::from_millis(26),
    };

    /// Returns the pressure oversampling ratio, `None` for the temperature record
    /// or an out-of-range mode.
    pub const fn oversampling(&self) -> Option<Oversampling> {
        match self.mode {
            0 => Some(Oversampling::UltraLowPower),
            1 => Some(Oversampling::Standard),
            2 => Some(Oversampling::HighResolution),
            3 => Some(Oversampling::UltraHighResolution),
            _ => None,
        }
    }
}

impl From<Oversampling> for OversamplingSetting {
    fn from(value: Oversampling) -> Self {
        match value {
            Oversampling::UltraLowPower => Self::ULTRA_LOW_POWER,
            Oversampling::Standard => Self::STANDARD,
            Oversampling::HighResolution => Self::HIGH_RESOLUTION,
            Oversampling::UltraHighResolution => Self::ULTRA_HIGH_RESOLUTION,
        }
    }
}

impl Default for OversamplingSetting {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::{Oversampling, OversamplingSetting};
    use crate::registers::Control;

    #[test]
    fn pressure_records_carry_control_commands() {
        for oversampling in [
            Oversampling::UltraLowPower,
            Oversampling::Standard,
            Oversampling::HighResolution,
            Oversampling::UltraHighResolution,
        ] {
            let setting = OversamplingSetting::from(oversampling);
            assert_eq!(setting.command, u8::from(Control::pressure(oversampling)));
            assert_eq!(setting.oversampling(), Some(oversampling));
        }
    }

    #[test]
    fn temperature_record_has_no_oversampling() {
        let setting = OversamplingSetting::TEMPERATURE;
        assert_eq!(setting.command, u8::from(Control::temperature()));
        assert_eq!(setting.oversampling(), None);
    }

    #[test]
    fn default_is_standard() {
        assert_eq!(OversamplingSetting::default(), OversamplingSetting::STANDARD);
    }
}
