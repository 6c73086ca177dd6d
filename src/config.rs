//! Configuration primitives for the BMP180 driver.

use crate::params::OversamplingSetting;
use crate::registers::{DEFAULT_ADDRESS, MAX_ADDRESS};
use crate::retry::{RetryPolicy, RetryPolicyError};

/// User-facing configuration for the BMP180 sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// 7-bit bus address of the device.
    pub address: u8,
    /// Backoff policy applied to every bus transaction.
    pub retry: RetryPolicy,
    /// Pressure conversion used by [`Bmp180::pressure`](crate::Bmp180::pressure).
    pub oversampling: OversamplingSetting,
}

impl Config {
    /// Begins building a [`Config`] using the builder pattern.
    pub fn new() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Checks whether this configuration is valid.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.address > MAX_ADDRESS {
            return Err(ConfigError::InvalidAddress);
        }

        self.retry.validate().map_err(ConfigError::InvalidRetryPolicy)
    }
}

/// Builder for [`Config`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder seeded with [`Config::default()`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Overrides the bus address.
    pub fn address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    /// Overrides the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Overrides the pressure conversion.
    pub fn oversampling(mut self, oversampling: impl Into<OversamplingSetting>) -> Self {
        self.config.oversampling = oversampling.into();
        self
    }

    /// Finalizes the builder and returns the [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            retry: RetryPolicy::default(),
            oversampling: OversamplingSetting::STANDARD,
        }
    }
}

/// Validation errors generated while verifying a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Address does not fit in seven bits.
    InvalidAddress,
    /// Retry policy violates its invariants.
    InvalidRetryPolicy(RetryPolicyError),
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};
    use crate::params::{Oversampling, OversamplingSetting};
    use crate::retry::{RetryPolicy, RetryPolicyError};

    #[test]
    fn defaults_target_standard_mode_at_0x77() {
        let config = Config::default();
        assert_eq!(config.address, 0x77);
        assert_eq!(config.oversampling, OversamplingSetting::STANDARD);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn builder_overrides_fields() {
        let config = Config::new()
            .address(0x76)
            .oversampling(Oversampling::UltraHighResolution)
            .retry(RetryPolicy::no_retry())
            .build();

        assert_eq!(config.address, 0x76);
        assert_eq!(config.oversampling, OversamplingSetting::ULTRA_HIGH_RESOLUTION);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn validate_rejects_wide_address_and_bad_policy() {
        let config = Config::new().address(0x80).build();
        assert_eq!(config.validate(), Err(ConfigError::InvalidAddress));

        let config = Config::new()
            .retry(RetryPolicy::default().with_max_attempts(0))
            .build();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidRetryPolicy(RetryPolicyError::NoAttempts))
        );
    }
}
