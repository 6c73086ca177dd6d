//! Error handling primitives for the BMP180 driver.

use core::fmt;

use crate::calibration::CompensationError;

/// Crate-wide result type alias.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the driver.
///
/// `E` is the error type of the underlying bus transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// The transport cannot be opened from a numeric bus identifier.
    InvalidBusKind,
    /// Bus address outside the 7-bit range `0x00..=0x7F`.
    InvalidAddress(u16),
    /// Register selector outside `0x00..=0xFF`.
    InvalidRegister(u16),
    /// Byte value outside `0x00..=0xFF`.
    InvalidValue(u16),
    /// Block length of zero or above the bus block limit.
    InvalidLength(usize),
    /// The provided configuration parameters are invalid.
    InvalidConfig,
    /// A block transaction returned fewer bytes than requested.
    ShortRead {
        /// Register the block was read from.
        register: u8,
        /// Requested byte count.
        expected: usize,
        /// Bytes actually delivered by the transport.
        got: usize,
    },
    /// The calibration block was truncated.
    ShortCalibrationData {
        /// Required calibration length.
        expected: usize,
        /// Bytes actually delivered by the transport.
        got: usize,
    },
    /// A conversion result was truncated.
    ShortResponse {
        /// Required result length.
        expected: usize,
        /// Bytes actually delivered by the transport.
        got: usize,
    },
    /// Every attempt allowed by the retry policy failed.
    TransportFailure {
        /// Register involved in the failed transaction.
        register: u8,
        /// Number of attempts performed.
        attempts: u8,
        /// Error reported by the last attempt.
        source: E,
    },
    /// The chip-id register did not hold the BMP180 identifier.
    UnexpectedChipId {
        /// Identifier documented for the device.
        expected: u8,
        /// Identifier read from the device.
        got: u8,
    },
    /// A conversion was requested before calibration data was read.
    Uncalibrated,
    /// A raw sample lies outside the ADC output range.
    InvalidRawValue(i32),
    /// Calibration data produced a zero divisor.
    DivisionByZero,
    /// Calibration data pushed the compensated pressure out of range.
    Overflow,
    /// The transport could not be opened for a driver-owned bus.
    OpenFailure(E),
    /// The transport reported an error while closing a driver-owned bus.
    CloseFailure(E),
    /// The driver-owned bus connection has already been closed.
    Closed,
}

impl<E> From<CompensationError> for Error<E> {
    fn from(err: CompensationError) -> Self {
        match err {
            CompensationError::InvalidRawValue(raw) => Self::InvalidRawValue(raw),
            CompensationError::DivisionByZero => Self::DivisionByZero,
            CompensationError::InvalidOversampling(mode) => Self::InvalidValue(u16::from(mode)),
            CompensationError::Overflow => Self::Overflow,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBusKind => f.write_str("transport cannot be opened from a bus identifier"),
            Self::InvalidAddress(address) => write!(f, "invalid bus address {address:#x}"),
            Self::InvalidRegister(register) => write!(f, "invalid register {register:#x}"),
            Self::InvalidValue(value) => write!(f, "invalid byte value {value:#x}"),
            Self::InvalidLength(len) => write!(f, "invalid block length {len}"),
            Self::InvalidConfig => f.write_str("invalid configuration"),
            Self::ShortRead {
                register,
                expected,
                got,
            } => write!(
                f,
                "short read from register {register:#04x}: expected {expected} bytes, got {got}"
            ),
            Self::ShortCalibrationData { expected, got } => write!(
                f,
                "short calibration data: expected {expected} bytes, got {got}"
            ),
            Self::ShortResponse { expected, got } => {
                write!(f, "short conversion result: expected {expected} bytes, got {got}")
            }
            Self::TransportFailure {
                register,
                attempts,
                source,
            } => write!(
                f,
                "transport failure on register {register:#04x} after {attempts} attempts: {source:?}"
            ),
            Self::UnexpectedChipId { expected, got } => {
                write!(f, "unexpected chip id: expected {expected:#04x}, got {got:#04x}")
            }
            Self::Uncalibrated => f.write_str("calibration data has not been read"),
            Self::InvalidRawValue(raw) => write!(f, "raw sample {raw} outside ADC range"),
            Self::DivisionByZero => f.write_str("calibration data yields a zero divisor"),
            Self::Overflow => f.write_str("calibration data overflows the pressure formula"),
            Self::OpenFailure(source) => write!(f, "failed to open bus: {source:?}"),
            Self::CloseFailure(source) => write!(f, "failed to close bus: {source:?}"),
            Self::Closed => f.write_str("bus connection already closed"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}
