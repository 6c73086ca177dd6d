//! Factory calibration coefficients and the fixed-point compensation formulas.
//!
//! The coefficients live in the on-chip EEPROM at `0xAA..=0xBF` as eleven big-endian
//! 16-bit words. Compensation follows the integer algorithm of the BMP180 datasheet
//! (BST-BMP180-DS000, section 3.5). The order of every shift and division matters:
//! rearranging them changes the result by several pascal.

use crate::registers::CALIBRATION_LEN;

/// Largest raw temperature code (16-bit ADC word).
pub const MAX_RAW_TEMPERATURE: i32 = 0xFFFF;
/// Largest raw pressure code (19-bit word at ultra high resolution).
pub const MAX_RAW_PRESSURE: i32 = 0x7_FFFF;

/// Errors raised by the compensation arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompensationError {
    /// A raw sample lies outside the ADC output range.
    InvalidRawValue(i32),
    /// Calibration data produced a zero divisor.
    DivisionByZero,
    /// Pressure oversampling mode outside `0..=3`.
    InvalidOversampling(u8),
    /// Calibration data drove an intermediate or the result past its integer range.
    Overflow,
}

/// Factory-trimmed calibration coefficients.
///
/// Replaced as a whole whenever the calibration block is read again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationData {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl CalibrationData {
    /// Decodes the 22-byte calibration block.
    pub fn from_bytes(raw: &[u8; CALIBRATION_LEN]) -> Self {
        let word = |offset: usize| [raw[offset], raw[offset + 1]];

        Self {
            ac1: i16::from_be_bytes(word(0)),
            ac2: i16::from_be_bytes(word(2)),
            ac3: i16::from_be_bytes(word(4)),
            ac4: u16::from_be_bytes(word(6)),
            ac5: u16::from_be_bytes(word(8)),
            ac6: u16::from_be_bytes(word(10)),
            b1: i16::from_be_bytes(word(12)),
            b2: i16::from_be_bytes(word(14)),
            mb: i16::from_be_bytes(word(16)),
            mc: i16::from_be_bytes(word(18)),
            md: i16::from_be_bytes(word(20)),
        }
    }

    /// Computes the temperature-dependent `B5` term shared by both formulas.
    pub fn compute_b5(&self, raw_temperature: i32) -> Result<i64, CompensationError> {
        if !(0..=MAX_RAW_TEMPERATURE).contains(&raw_temperature) {
            return Err(CompensationError::InvalidRawValue(raw_temperature));
        }

        let x1 = floor_div(
            (i64::from(raw_temperature) - i64::from(self.ac6)) * i64::from(self.ac5),
            1 << 15,
        );
        let divisor = x1 + i64::from(self.md);
        if divisor == 0 {
            return Err(CompensationError::DivisionByZero);
        }
        let x2 = floor_div(i64::from(self.mc) * (1 << 11), divisor);

        Ok(x1 + x2)
    }

    /// Converts a raw temperature code into tenths of a degree Celsius.
    pub fn compensate_temperature(&self, raw_temperature: i32) -> Result<i32, CompensationError> {
        let b5 = self.compute_b5(raw_temperature)?;
        Ok(floor_div(b5 + 8, 1 << 4) as i32)
    }

    /// Converts raw temperature and pressure codes into pascal.
    ///
    /// `oversampling` is the mode (0..=3) the pressure sample was taken with.
    /// Calibration words that push the result outside `i32` yield
    /// [`CompensationError::Overflow`] instead of a wrapped value.
    pub fn compensate_pressure(
        &self,
        raw_temperature: i32,
        raw_pressure: i32,
        oversampling: u8,
    ) -> Result<i32, CompensationError> {
        if !(0..=MAX_RAW_PRESSURE).contains(&raw_pressure) {
            return Err(CompensationError::InvalidRawValue(raw_pressure));
        }
        let oss = match oversampling {
            0..=3 => u32::from(oversampling),
            _ => return Err(CompensationError::InvalidOversampling(oversampling)),
        };
        let b5 = self.compute_b5(raw_temperature)?;

        let ac1 = i64::from(self.ac1);
        let ac2 = i64::from(self.ac2);
        let ac3 = i64::from(self.ac3);
        let ac4 = i64::from(self.ac4);
        let b1 = i64::from(self.b1);
        let b2 = i64::from(self.b2);

        let b6 = b5 - 4000;
        let mut x1 = (b2 * ((b6 * b6) >> 12)) >> 11;
        let mut x2 = (ac2 * b6) >> 11;
        let mut x3 = x1 + x2;
        let b3 = (((ac1 * 4 + x3) << oss) + 2) / 4;

        x1 = (ac3 * b6) >> 13;
        x2 = (b1 * ((b6 * b6) >> 12)) >> 16;
        x3 = ((x1 + x2) + 2) >> 2;
        let b4 = (ac4 * (x3 + 32768)) >> 15;
        if b4 == 0 {
            return Err(CompensationError::DivisionByZero);
        }

        // Signed comparison; a negative B7 takes the first branch.
        let b7 = (i64::from(raw_pressure) - b3)
            .checked_mul(50_000 >> oss)
            .ok_or(CompensationError::Overflow)?;
        let mut p = if b7 < 0x8000_0000 {
            b7.checked_mul(2).ok_or(CompensationError::Overflow)? / b4
        } else {
            (b7 / b4).checked_mul(2).ok_or(CompensationError::Overflow)?
        };

        let p8 = p >> 8;
        x1 = p8
            .checked_mul(p8)
            .and_then(|x| x.checked_mul(3038))
            .ok_or(CompensationError::Overflow)?
            >> 16;
        x2 = p.checked_mul(-7357).ok_or(CompensationError::Overflow)? >> 16;
        p += (x1 + x2 + 3791) >> 4;

        i32::try_from(p).map_err(|_| CompensationError::Overflow)
    }
}

/// Integer division rounding toward negative infinity.
fn floor_div(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    if numerator % denominator != 0 && ((numerator < 0) != (denominator < 0)) {
        quotient - 1
    } else {
        quotient
    }
}
