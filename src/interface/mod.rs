//! Bus interface abstraction for the BMP180 driver.

pub mod i2c;

/// Abstraction over the low-level bus access required by the driver.
///
/// Every primitive addresses the device explicitly; the driver validates its
/// inputs before calling into the transport and retries transport errors.
pub trait Bmp180Interface {
    /// Error type produced by the concrete bus implementation.
    type Error;

    /// Opens the bus with the given numeric identifier.
    ///
    /// Transports that can only wrap an already-open handle keep the default,
    /// which reports that opening is unsupported.
    fn open(bus: u32) -> Option<core::result::Result<Self, Self::Error>>
    where
        Self: Sized,
    {
        let _ = bus;
        None
    }

    /// Reads a single register.
    fn read_byte(&mut self, address: u8, register: u8) -> core::result::Result<u8, Self::Error>;

    /// Writes a single register.
    fn write_byte(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> core::result::Result<(), Self::Error>;

    /// Reads consecutive registers into `buf`, returning the number of bytes delivered.
    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> core::result::Result<usize, Self::Error>;

    /// Writes consecutive registers from `data`.
    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> core::result::Result<(), Self::Error>;

    /// Closes the underlying connection.
    fn close(&mut self) -> core::result::Result<(), Self::Error>;
}

/// Selects who owns the bus connection used by the driver.
#[derive(Debug)]
pub enum BusSource<I> {
    /// The driver opens bus `n` itself and closes it on shutdown.
    Owned(u32),
    /// An already-open connection that stays open after the driver shuts down.
    External(I),
}
