//! Retry-with-backoff policy shared by every bus transaction.

use core::time::Duration;

/// Exponential backoff policy applied to transport failures.
///
/// The delay scheduled after failed attempt `n` (1-based) is
/// `min(initial_delay * backoff_factor^(n - 1), max_delay)`, optionally scaled by a
/// jitter multiplier in `[1, 2)`. No delay follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u8,
    /// Growth factor between consecutive delays.
    pub backoff_factor: f32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for a single delay, `None` for unbounded.
    pub max_delay: Option<Duration>,
    /// Randomizes every delay by a multiplier in `[1, 2)`.
    pub jitter: bool,
}

/// Validation errors generated while verifying a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetryPolicyError {
    /// `max_attempts` is zero.
    NoAttempts,
    /// `backoff_factor` is below one or not finite.
    InvalidBackoffFactor,
}

impl RetryPolicy {
    /// Policy that performs a single attempt and never sleeps.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_factor: 1.0,
            initial_delay: Duration::ZERO,
            max_delay: Some(Duration::ZERO),
            jitter: false,
        }
    }

    /// Overrides the attempt budget.
    pub const fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Overrides the backoff growth factor.
    pub const fn with_backoff_factor(mut self, backoff_factor: f32) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Overrides the first delay.
    pub const fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Overrides the delay cap.
    pub const fn with_max_delay(mut self, max_delay: Option<Duration>) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enables or disables jitter.
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks the policy invariants.
    pub fn validate(&self) -> core::result::Result<(), RetryPolicyError> {
        if self.max_attempts == 0 {
            return Err(RetryPolicyError::NoAttempts);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(RetryPolicyError::InvalidBackoffFactor);
        }
        Ok(())
    }

    /// Delay to wait after failed `attempt` (1-based) before the next one.
    ///
    /// `jitter_sample` is a uniform value in `[0, 1)`; it is ignored unless jitter is
    /// enabled.
    pub fn delay_after(&self, attempt: u8, jitter_sample: f32) -> Duration {
        let mut micros = self.initial_delay.as_micros() as f64;
        for _ in 1..attempt {
            micros *= f64::from(self.backoff_factor);
            if let Some(max) = self.max_delay {
                if micros >= max.as_micros() as f64 {
                    break;
                }
            }
        }

        if let Some(max) = self.max_delay {
            let cap = max.as_micros() as f64;
            if micros > cap {
                micros = cap;
            }
        }

        if self.jitter {
            micros *= 1.0 + f64::from(jitter_sample.clamp(0.0, 0.999_999));
        }

        // Float-to-int casts saturate.
        Duration::from_micros(micros as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2.0,
            initial_delay: Duration::from_millis(5),
            max_delay: Some(Duration::from_millis(100)),
            jitter: false,
        }
    }
}

/// Xorshift generator feeding jitter samples.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Jitter {
    state: u32,
}

impl Jitter {
    pub(crate) const fn new(seed: u32) -> Self {
        // Xorshift never leaves the all-zero state.
        let state = if seed == 0 { 0x9E37_79B9 } else { seed };
        Self { state }
    }

    /// Next uniform sample in `[0, 1)`.
    pub(crate) fn sample(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        // Top 24 bits fit the f32 mantissa exactly.
        (x >> 8) as f32 / (1u32 << 24) as f32
    }
}
