//! Validated, retried register transactions against a single device address.

use embedded_hal::delay::DelayNs;

use crate::error::{Error, Result};
use crate::interface::{BusSource, Bmp180Interface};
use crate::log::{trace, warn};
use crate::registers::{MAX_ADDRESS, MAX_BLOCK_LEN};
use crate::retry::{Jitter, RetryPolicy};

const JITTER_SEED: u32 = 0x0B18_0180;

/// Register-level access to one device on one bus connection.
///
/// Inputs are validated before any transaction is issued; transport errors are
/// retried according to the channel's [`RetryPolicy`].
pub struct BusChannel<IFACE, D> {
    interface: Option<IFACE>,
    owned: bool,
    address: u8,
    retry: RetryPolicy,
    jitter: Jitter,
    delay: D,
}

/// Kind of transaction, used for tracing.
#[derive(Debug, Clone, Copy)]
enum Op {
    ReadByte,
    WriteByte,
    ReadBlock,
    WriteBlock,
}

impl Op {
    const fn name(self) -> &'static str {
        match self {
            Self::ReadByte => "read_byte",
            Self::WriteByte => "write_byte",
            Self::ReadBlock => "read_block",
            Self::WriteBlock => "write_block",
        }
    }
}

impl<IFACE, D, CommE> BusChannel<IFACE, D>
where
    IFACE: Bmp180Interface<Error = CommE>,
    D: DelayNs,
{
    // ==================================================================
    // == Construction & Ownership ======================================
    // ==================================================================
    /// Opens or adopts a bus connection for the device at `address`.
    ///
    /// [`BusSource::Owned`] asks the transport to open the bus; the channel then
    /// closes it in [`close`](Self::close). [`BusSource::External`] connections are
    /// never closed by the channel.
    pub fn new(
        source: BusSource<IFACE>,
        address: impl Into<u16>,
        retry: RetryPolicy,
        delay: D,
    ) -> Result<Self, CommE> {
        let address = Self::validate_address(address.into())?;

        let (interface, owned) = match source {
            BusSource::External(interface) => (interface, false),
            BusSource::Owned(bus) => match IFACE::open(bus) {
                Some(Ok(interface)) => (interface, true),
                Some(Err(err)) => return Err(Error::OpenFailure(err)),
                None => return Err(Error::InvalidBusKind),
            },
        };

        Ok(Self {
            interface: Some(interface),
            owned,
            address,
            retry,
            jitter: Jitter::new(JITTER_SEED),
            delay,
        })
    }

    /// Whether the channel opened, and therefore closes, the connection.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Returns the 7-bit device address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Changes the device address after validating it.
    pub fn set_address(&mut self, address: impl Into<u16>) -> Result<(), CommE> {
        self.address = Self::validate_address(address.into())?;
        Ok(())
    }

    /// Returns the retry policy shared by every transaction.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Provides mutable access to the underlying interface, `None` once closed.
    pub fn interface_mut(&mut self) -> Option<&mut IFACE> {
        self.interface.as_mut()
    }

    /// Provides mutable access to the delay provider.
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Consumes the channel and returns the interface (if still open) and delay.
    pub fn release(self) -> (Option<IFACE>, D) {
        (self.interface, self.delay)
    }

    /// Closes the connection if the channel owns it.
    ///
    /// Returns `true` when the connection is owned, `false` when it was supplied
    /// externally and left open. Closing an owned connection twice is a no-op.
    pub fn close(&mut self) -> Result<bool, CommE> {
        if !self.owned {
            return Ok(false);
        }

        if let Some(mut interface) = self.interface.take() {
            trace!("closing owned bus connection");
            if let Err(err) = interface.close() {
                self.interface = Some(interface);
                return Err(Error::CloseFailure(err));
            }
        }

        Ok(true)
    }

    // ==================================================================
    // == Transactions ==================================================
    // ==================================================================
    /// Reads a single register.
    pub fn read_byte(&mut self, register: impl Into<u16>) -> Result<u8, CommE> {
        let register = Self::validate_register(register.into())?;
        let address = self.address;
        self.with_retry(Op::ReadByte, register, |iface| {
            iface.read_byte(address, register)
        })
    }

    /// Writes a single register.
    pub fn write_byte(
        &mut self,
        register: impl Into<u16>,
        value: impl Into<u16>,
    ) -> Result<(), CommE> {
        let register = Self::validate_register(register.into())?;
        let value = Self::validate_value(value.into())?;
        let address = self.address;
        self.with_retry(Op::WriteByte, register, |iface| {
            iface.write_byte(address, register, value)
        })
    }

    /// Reads `buf.len()` consecutive registers starting at `register`.
    ///
    /// Fails with [`Error::ShortRead`] if the transport delivers fewer bytes.
    pub fn read_block(&mut self, register: impl Into<u16>, buf: &mut [u8]) -> Result<(), CommE> {
        let register = Self::validate_register(register.into())?;
        Self::validate_length(buf.len())?;
        let address = self.address;
        let got = self.with_retry(Op::ReadBlock, register, |iface| {
            iface.read_block(address, register, buf)
        })?;

        if got < buf.len() {
            return Err(Error::ShortRead {
                register,
                expected: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// Writes `data` to consecutive registers starting at `register`.
    pub fn write_block(&mut self, register: impl Into<u16>, data: &[u8]) -> Result<(), CommE> {
        let register = Self::validate_register(register.into())?;
        Self::validate_length(data.len())?;
        let address = self.address;
        self.with_retry(Op::WriteBlock, register, |iface| {
            iface.write_block(address, register, data)
        })
    }

    /// Sleeps for `us` microseconds using the channel's delay provider.
    pub(crate) fn wait_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn with_retry<T, F>(&mut self, op: Op, register: u8, mut transaction: F) -> Result<T, CommE>
    where
        F: FnMut(&mut IFACE) -> core::result::Result<T, CommE>,
    {
        let interface = self.interface.as_mut().ok_or(Error::<CommE>::Closed)?;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            trace!(
                "{} register={:#x} attempt={}",
                op.name(),
                register,
                attempt
            );

            match transaction(&mut *interface) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= max_attempts => {
                    warn!(
                        "{} register={:#x} failed after {} attempts",
                        op.name(),
                        register,
                        attempt
                    );
                    return Err(Error::TransportFailure {
                        register,
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(_) => {
                    let backoff = self.retry.delay_after(attempt, self.jitter.sample());
                    warn!(
                        "{} register={:#x} attempt={} failed, retrying in {} us",
                        op.name(),
                        register,
                        attempt,
                        backoff.as_micros() as u64
                    );
                    sleep(&mut self.delay, backoff.as_micros());
                    attempt += 1;
                }
            }
        }
    }

    fn validate_address(address: u16) -> Result<u8, CommE> {
        match u8::try_from(address) {
            Ok(address) if address <= MAX_ADDRESS => Ok(address),
            _ => Err(Error::InvalidAddress(address)),
        }
    }

    fn validate_register(register: u16) -> Result<u8, CommE> {
        u8::try_from(register).map_err(|_| Error::InvalidRegister(register))
    }

    fn validate_value(value: u16) -> Result<u8, CommE> {
        u8::try_from(value).map_err(|_| Error::InvalidValue(value))
    }

    fn validate_length(len: usize) -> Result<(), CommE> {
        if len == 0 || len > MAX_BLOCK_LEN {
            return Err(Error::InvalidLength(len));
        }
        Ok(())
    }
}

fn sleep<D: DelayNs>(delay: &mut D, mut micros: u128) {
    while micros > 0 {
        let chunk = micros.min(u128::from(u32::MAX));
        delay.delay_us(chunk as u32);
        micros -= chunk;
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{Expect, MockBus, MockError, RecordingDelay};
    use super::BusChannel;
    use crate::error::Error;
    use crate::interface::BusSource;
    use crate::retry::RetryPolicy;
    use core::time::Duration;
    use std::vec;
    use std::vec::Vec;

    fn channel(
        expectations: Vec<Expect>,
        retry: RetryPolicy,
    ) -> BusChannel<MockBus, RecordingDelay> {
        BusChannel::new(
            BusSource::External(MockBus::new(expectations)),
            0x77u8,
            retry,
            RecordingDelay::default(),
        )
        .unwrap()
    }

    fn bus(channel: BusChannel<MockBus, RecordingDelay>) -> (MockBus, RecordingDelay) {
        let (bus, delay) = channel.release();
        let bus = bus.unwrap();
        bus.done();
        (bus, delay)
    }

    #[test]
    fn rejects_addresses_wider_than_seven_bits() {
        for address in [0x80u16, 0xFF, 0x100, u16::MAX] {
            let result = BusChannel::new(
                BusSource::External(MockBus::default()),
                address,
                RetryPolicy::default(),
                RecordingDelay::default(),
            );
            assert!(matches!(result, Err(Error::InvalidAddress(a)) if a == address));
        }

        let mut channel = channel(vec![], RetryPolicy::default());
        assert_eq!(channel.set_address(0x80u16), Err(Error::InvalidAddress(0x80)));
        assert_eq!(channel.address(), 0x77);
        channel.set_address(0x76u8).unwrap();
        assert_eq!(channel.address(), 0x76);
    }

    #[test]
    fn invalid_inputs_never_reach_the_transport() {
        let mut channel = channel(vec![], RetryPolicy::default());

        assert_eq!(channel.read_byte(0x100u16), Err(Error::InvalidRegister(0x100)));
        assert_eq!(
            channel.write_byte(0x1FFu16, 0u8),
            Err(Error::InvalidRegister(0x1FF))
        );
        assert_eq!(
            channel.write_byte(0xF4u8, 0x100u16),
            Err(Error::InvalidValue(0x100))
        );
        assert_eq!(
            channel.read_block(0x100u16, &mut [0u8; 2]),
            Err(Error::InvalidRegister(0x100))
        );
        assert_eq!(
            channel.write_block(0x100u16, &[1, 2]),
            Err(Error::InvalidRegister(0x100))
        );
        assert_eq!(channel.read_block(0xF6u8, &mut []), Err(Error::InvalidLength(0)));
        assert_eq!(
            channel.write_block(0xF6u8, &[0u8; 33]),
            Err(Error::InvalidLength(33))
        );

        let (bus, delay) = bus(channel);
        assert_eq!(bus.calls, 0);
        assert!(delay.waits_ns.is_empty());
    }

    #[test]
    fn transactions_target_the_configured_address() {
        let mut channel = channel(
            vec![
                Expect::ReadByte {
                    register: 0xD0,
                    response: Ok(0x55),
                },
                Expect::WriteByte {
                    register: 0xE0,
                    value: 0xB6,
                    response: Ok(()),
                },
                Expect::WriteBlock {
                    register: 0xF4,
                    data: vec![0x2E],
                    response: Ok(()),
                },
            ],
            RetryPolicy::default(),
        );
        channel.interface_mut().unwrap().address = Some(0x77);

        assert_eq!(channel.read_byte(0xD0u8), Ok(0x55));
        channel.write_byte(0xE0u8, 0xB6u8).unwrap();
        channel.write_block(0xF4u8, &[0x2E]).unwrap();
        bus(channel);
    }

    #[test]
    fn retries_until_success_within_budget() {
        let mut channel = channel(
            vec![
                Expect::ReadByte {
                    register: 0xD0,
                    response: Err(MockError),
                },
                Expect::ReadByte {
                    register: 0xD0,
                    response: Err(MockError),
                },
                Expect::ReadByte {
                    register: 0xD0,
                    response: Ok(0x55),
                },
            ],
            RetryPolicy::default()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(5))
                .with_backoff_factor(2.0),
        );

        assert_eq!(channel.read_byte(0xD0u8), Ok(0x55));

        let (bus, delay) = bus(channel);
        assert_eq!(bus.calls, 3);
        assert_eq!(delay.waits_ns, vec![5_000_000, 10_000_000]);
    }

    #[test]
    fn exhausted_budget_surfaces_transport_failure() {
        let mut channel = channel(
            vec![
                Expect::WriteByte {
                    register: 0xF4,
                    value: 0x2E,
                    response: Err(MockError),
                },
                Expect::WriteByte {
                    register: 0xF4,
                    value: 0x2E,
                    response: Err(MockError),
                },
            ],
            RetryPolicy::default().with_max_attempts(2),
        );

        assert_eq!(
            channel.write_byte(0xF4u8, 0x2Eu8),
            Err(Error::TransportFailure {
                register: 0xF4,
                attempts: 2,
                source: MockError,
            })
        );

        // No sleep after the final attempt.
        let (bus, delay) = bus(channel);
        assert_eq!(bus.calls, 2);
        assert_eq!(delay.waits_ns.len(), 1);
    }

    #[test]
    fn short_block_is_not_retried() {
        let mut channel = channel(
            vec![Expect::ReadBlock {
                register: 0xF6,
                len: 3,
                response: Ok(vec![0x5D, 0x23]),
            }],
            RetryPolicy::default(),
        );

        let mut buf = [0u8; 3];
        assert_eq!(
            channel.read_block(0xF6u8, &mut buf),
            Err(Error::ShortRead {
                register: 0xF6,
                expected: 3,
                got: 2,
            })
        );

        let (bus, _) = bus(channel);
        assert_eq!(bus.calls, 1);
    }

    #[test]
    fn jittered_backoff_stays_within_bounds() {
        let mut channel = channel(
            vec![
                Expect::ReadByte {
                    register: 0xD1,
                    response: Err(MockError),
                },
                Expect::ReadByte {
                    register: 0xD1,
                    response: Err(MockError),
                },
                Expect::ReadByte {
                    register: 0xD1,
                    response: Ok(0x02),
                },
            ],
            RetryPolicy::default()
                .with_initial_delay(Duration::from_millis(4))
                .with_backoff_factor(1.0)
                .with_jitter(true),
        );

        assert_eq!(channel.read_byte(0xD1u8), Ok(0x02));

        let (_, delay) = bus(channel);
        assert_eq!(delay.waits_ns.len(), 2);
        for wait in delay.waits_ns {
            assert!((4_000_000..8_000_000).contains(&wait));
        }
    }

    #[test]
    fn external_connection_is_left_open() {
        let mut channel = channel(vec![], RetryPolicy::default());

        assert!(!channel.is_owned());
        assert_eq!(channel.close(), Ok(false));

        let (bus, _) = bus(channel);
        assert_eq!(bus.closes, 0);
    }

    #[test]
    fn owned_connection_is_closed_once() {
        let mut channel = BusChannel::<MockBus, _>::new(
            BusSource::Owned(1),
            0x77u8,
            RetryPolicy::default(),
            RecordingDelay::default(),
        )
        .unwrap();

        assert!(channel.is_owned());
        assert_eq!(channel.close(), Ok(true));
        assert_eq!(channel.close(), Ok(true));
        assert_eq!(channel.read_byte(0xD0u8), Err(Error::Closed));

        let (bus, _) = channel.release();
        assert!(bus.is_none());
    }

    #[test]
    fn failing_open_is_reported() {
        let result = BusChannel::<MockBus, _>::new(
            BusSource::Owned(99),
            0x77u8,
            RetryPolicy::default(),
            RecordingDelay::default(),
        );

        assert_eq!(result.err(), Some(Error::OpenFailure(MockError)));
    }

    #[test]
    fn failing_close_keeps_the_connection() {
        let mut channel = BusChannel::<MockBus, _>::new(
            BusSource::Owned(1),
            0x77u8,
            RetryPolicy::default(),
            RecordingDelay::default(),
        )
        .unwrap();
        channel.interface_mut().unwrap().fail_close = true;

        assert_eq!(channel.close(), Err(Error::CloseFailure(MockError)));

        let interface = channel.interface_mut().unwrap();
        assert_eq!(interface.closes, 1);
        interface.fail_close = false;
        assert_eq!(channel.close(), Ok(true));

        let (bus, _) = channel.release();
        assert!(bus.is_none());
    }
}
