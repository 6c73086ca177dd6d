//! High-level BMP180 device driver implementation.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::calibration::CalibrationData;
use crate::channel::BusChannel;
use crate::config::{Config, ConfigError};
use crate::error::{Error, Result};
use crate::interface::i2c::I2cInterface;
use crate::interface::{BusSource, Bmp180Interface};
use crate::log::{debug, trace};
use crate::params::OversamplingSetting;
use crate::registers::{
    CALIBRATION_LEN,
    CHIP_ID,
    Control,
    PRESSURE_RESULT_LEN,
    REG_CALIBRATION,
    REG_CHIP_ID,
    REG_CONTROL,
    REG_RESULT,
    REG_SOFT_RESET,
    REG_VERSION,
    SOFT_RESET_COMMAND,
    TEMPERATURE_RESULT_LEN,
};

// Datasheet start-up time after a power-on or soft reset (microseconds).
const RESET_STARTUP_DELAY_US: u32 = 10_000;

/// High-level synchronous driver for the BMP180 barometer.
///
/// Readings require calibration data, fetched by [`calibrate`](Self::calibrate) or
/// the full bring-up sequence in [`initialize`](Self::initialize).
pub struct Bmp180<IFACE, D> {
    channel: BusChannel<IFACE, D>,
    config: Config,
    calibration: Option<CalibrationData>,
    initialized: bool,
}

impl<IFACE, D, CommE> Bmp180<IFACE, D>
where
    IFACE: Bmp180Interface<Error = CommE>,
    D: DelayNs,
{
    // ==================================================================
    // == Driver Construction & Ownership ===============================
    // ==================================================================
    /// Creates a new driver on the given bus.
    ///
    /// No bus traffic is generated; call [`initialize`](Self::initialize) before
    /// taking readings.
    pub fn new(source: BusSource<IFACE>, delay: D, config: Config) -> Result<Self, CommE> {
        config.validate().map_err(|err| match err {
            ConfigError::InvalidAddress => Error::InvalidAddress(u16::from(config.address)),
            ConfigError::InvalidRetryPolicy(_) => Error::InvalidConfig,
        })?;
        let channel = BusChannel::new(source, config.address, config.retry, delay)?;

        Ok(Self {
            channel,
            config,
            calibration: None,
            initialized: false,
        })
    }

    /// Consumes the driver and returns the interface (if still open) and delay.
    pub fn release(self) -> (Option<IFACE>, D) {
        self.channel.release()
    }

    /// Provides mutable access to the register-level channel.
    pub fn channel_mut(&mut self) -> &mut BusChannel<IFACE, D> {
        &mut self.channel
    }

    /// Closes the bus connection if the driver opened it.
    ///
    /// Returns `false` for externally supplied connections, which stay open.
    pub fn close(&mut self) -> Result<bool, CommE> {
        self.channel.close()
    }

    // ==================================================================
    // == State & Configuration =========================================
    // ==================================================================
    /// Returns the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the 7-bit device address.
    pub fn address(&self) -> u8 {
        self.channel.address()
    }

    /// Changes the device address after validating it.
    pub fn set_address(&mut self, address: impl Into<u16>) -> Result<(), CommE> {
        self.channel.set_address(address)?;
        self.config.address = self.channel.address();
        Ok(())
    }

    /// Returns the pressure conversion used by [`pressure`](Self::pressure).
    pub fn oversampling(&self) -> OversamplingSetting {
        self.config.oversampling
    }

    /// Selects the pressure conversion; the record is used as supplied.
    pub fn set_oversampling(&mut self, oversampling: impl Into<OversamplingSetting>) {
        self.config.oversampling = oversampling.into();
    }

    /// Returns the current calibration snapshot.
    pub fn calibration(&self) -> Option<&CalibrationData> {
        self.calibration.as_ref()
    }

    /// Whether calibration data has been read.
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Whether the last bring-up sequence completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ==================================================================
    // == Bring-up ======================================================
    // ==================================================================
    /// Runs chip-id check, soft reset and calibration fetch in order.
    ///
    /// Any failing step aborts the sequence and leaves the driver uninitialized.
    pub fn initialize(&mut self) -> Result<bool, CommE> {
        self.initialized = false;

        self.verify_chip_id()?;
        self.soft_reset()?;
        self.calibrate()?;

        self.initialized = true;
        debug!("bmp180 initialized at address {:#x}", self.channel.address());
        Ok(true)
    }

    /// Verifies the identification register against the BMP180 constant.
    pub fn verify_chip_id(&mut self) -> Result<bool, CommE> {
        let id = self.channel.read_byte(REG_CHIP_ID)?;
        if id != CHIP_ID {
            debug!("unexpected chip id {:#x}", id);
            return Err(Error::UnexpectedChipId {
                expected: CHIP_ID,
                got: id,
            });
        }

        Ok(true)
    }

    /// Issues a soft reset and waits for the device to restart.
    pub fn soft_reset(&mut self) -> Result<bool, CommE> {
        self.channel.write_byte(REG_SOFT_RESET, SOFT_RESET_COMMAND)?;
        self.channel.wait_us(RESET_STARTUP_DELAY_US);
        Ok(true)
    }

    /// Reads the calibration EEPROM and replaces the calibration snapshot.
    pub fn calibrate(&mut self) -> Result<bool, CommE> {
        let mut raw = [0u8; CALIBRATION_LEN];
        self.channel
            .read_block(REG_CALIBRATION, &mut raw)
            .map_err(|err| match err {
                Error::ShortRead { expected, got, .. } => {
                    Error::ShortCalibrationData { expected, got }
                }
                other => other,
            })?;

        let calibration = CalibrationData::from_bytes(&raw);
        debug!(
            "calibration ac1={} ac2={} ac3={} ac4={} ac5={} ac6={}",
            calibration.ac1,
            calibration.ac2,
            calibration.ac3,
            calibration.ac4,
            calibration.ac5,
            calibration.ac6
        );
        self.calibration = Some(calibration);
        Ok(true)
    }

    // ==================================================================
    // == Identification & Status =======================================
    // ==================================================================
    /// Reads the silicon version register.
    pub fn read_version(&mut self) -> Result<u8, CommE> {
        self.channel.read_byte(REG_VERSION)
    }

    /// Whether the device reports a conversion still running.
    pub fn conversion_in_progress(&mut self) -> Result<bool, CommE> {
        let control = Control::from(self.channel.read_byte(REG_CONTROL)?);
        Ok(control.start_conversion())
    }

    // ==================================================================
    // == Data Acquisition ==============================================
    // ==================================================================
    /// Starts a temperature conversion and returns the raw 16-bit code.
    pub fn read_raw_temperature(&mut self) -> Result<i32, CommE> {
        let raw: [u8; TEMPERATURE_RESULT_LEN] = self.convert(OversamplingSetting::TEMPERATURE)?;
        let value = i32::from(raw[0]) * 256 + i32::from(raw[1]);
        trace!("raw temperature {}", value);
        Ok(value)
    }

    /// Starts a pressure conversion with the active oversampling setting and returns
    /// the raw code.
    pub fn read_raw_pressure(&mut self) -> Result<i32, CommE> {
        let setting = self.config.oversampling;
        let mode = Self::pressure_mode(&setting)?;

        let raw: [u8; PRESSURE_RESULT_LEN] = self.convert(setting)?;
        let word = (i32::from(raw[0]) << 16) + (i32::from(raw[1]) << 8) + i32::from(raw[2]);
        let value = word >> (8 - u32::from(mode));
        trace!("raw pressure {} (mode {})", value, mode);
        Ok(value)
    }

    /// Converts a raw temperature code into degrees Celsius.
    pub fn compute_temperature(&self, raw_temperature: i32) -> Result<f32, CommE> {
        let calibration = self.calibration.as_ref().ok_or(Error::<CommE>::Uncalibrated)?;
        let tenths = calibration.compensate_temperature(raw_temperature)?;
        Ok(tenths as f32 / 10.0)
    }

    /// Converts raw temperature and pressure codes into pascal, assuming the pressure
    /// code was sampled with the active oversampling setting.
    pub fn compute_pressure(&self, raw_temperature: i32, raw_pressure: i32) -> Result<i32, CommE> {
        let calibration = self.calibration.as_ref().ok_or(Error::<CommE>::Uncalibrated)?;
        let mode = Self::pressure_mode(&self.config.oversampling)?;
        Ok(calibration.compensate_pressure(raw_temperature, raw_pressure, mode)?)
    }

    /// Measures the temperature in degrees Celsius.
    pub fn temperature(&mut self) -> Result<f32, CommE> {
        self.ensure_calibrated()?;
        let raw = self.read_raw_temperature()?;
        self.compute_temperature(raw)
    }

    /// Measures the pressure in pascal.
    ///
    /// A temperature conversion always precedes the pressure conversion since the
    /// pressure formula depends on it.
    pub fn pressure(&mut self) -> Result<i32, CommE> {
        self.ensure_calibrated()?;
        let raw_temperature = self.read_raw_temperature()?;
        let raw_pressure = self.read_raw_pressure()?;
        self.compute_pressure(raw_temperature, raw_pressure)
    }

    // ==================================================================
    // == Internal Helpers ==============================================
    // ==================================================================
    fn ensure_calibrated(&self) -> Result<(), CommE> {
        if self.calibration.is_none() {
            return Err(Error::Uncalibrated);
        }
        Ok(())
    }

    fn pressure_mode(setting: &OversamplingSetting) -> Result<u8, CommE> {
        match setting.oversampling() {
            Some(_) => Ok(setting.mode),
            None => Err(Error::InvalidValue(u16::from(setting.mode))),
        }
    }

    fn convert<const N: usize>(&mut self, setting: OversamplingSetting) -> Result<[u8; N], CommE> {
        self.channel.write_byte(REG_CONTROL, setting.command)?;
        self.channel.wait_us(delay_us(&setting));

        let mut raw = [0u8; N];
        self.channel
            .read_block(REG_RESULT, &mut raw)
            .map_err(|err| match err {
                Error::ShortRead { expected, got, .. } => Error::ShortResponse { expected, got },
                other => other,
            })?;
        Ok(raw)
    }
}

impl<I2C, D> Bmp180<I2cInterface<I2C>, D>
where
    I2C: I2c,
    D: DelayNs,
{
    // ==================================================================
    // == I2C Convenience Constructors ==================================
    // ==================================================================
    /// Convenience constructor for an externally owned I2C bus.
    pub fn new_i2c(i2c: I2C, delay: D, config: Config) -> Result<Self, I2C::Error> {
        Self::new(BusSource::External(I2cInterface::new(i2c)), delay, config)
    }

    /// Releases the driver, returning the I2C bus and delay provider.
    pub fn release_i2c(self) -> (Option<I2C>, D) {
        let (iface, delay) = self.release();
        (iface.map(I2cInterface::release), delay)
    }
}

fn delay_us(setting: &OversamplingSetting) -> u32 {
    u32::try_from(setting.conversion_delay.as_micros()).unwrap_or(u32::MAX)
}
