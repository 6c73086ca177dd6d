//! I2C interface implementation built on top of `embedded-hal` `I2c`.

use embedded_hal::i2c::I2c;

use super::Bmp180Interface;
use crate::registers::MAX_BLOCK_LEN;

/// I2C-based interface implementation for the BMP180 driver.
pub struct I2cInterface<I2C> {
    i2c: I2C,
}

impl<I2C> I2cInterface<I2C> {
    /// Creates a new interface from the provided I2C bus abstraction.
    pub const fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Provides mutable access to the wrapped I2C bus.
    pub fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    /// Consumes the interface and returns the owned I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> Bmp180Interface for I2cInterface<I2C>
where
    I2C: I2c,
{
    type Error = I2C::Error;

    fn read_byte(&mut self, address: u8, register: u8) -> core::result::Result<u8, Self::Error> {
        let mut value = [0u8; 1];
        self.i2c.write_read(address, &[register], &mut value)?;
        Ok(value[0])
    }

    fn write_byte(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> core::result::Result<(), Self::Error> {
        self.i2c.write(address, &[register, value])
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> core::result::Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.i2c.write_read(address, &[register], buf)?;
        Ok(buf.len())
    }

    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> core::result::Result<(), Self::Error> {
        if data.is_empty() {
            return Ok(());
        }

        // Register pointer followed by the payload in a single frame.
        let len = data.len().min(MAX_BLOCK_LEN);
        let mut frame = [0u8; MAX_BLOCK_LEN + 1];
        frame[0] = register;
        frame[1..=len].copy_from_slice(&data[..len]);
        self.i2c.write(address, &frame[..=len])
    }

    fn close(&mut self) -> core::result::Result<(), Self::Error> {
        // embedded-hal buses are released by dropping them.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::I2cInterface;
    use crate::interface::Bmp180Interface;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use std::vec;

    const ADDR: u8 = 0x77;

    #[test]
    fn read_byte_writes_pointer_then_reads() {
        let expectations = [I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x55])];
        let mut interface = I2cInterface::new(I2cMock::new(&expectations));

        assert_eq!(interface.read_byte(ADDR, 0xD0).unwrap(), 0x55);
        interface.release().done();
    }

    #[test]
    fn write_byte_sends_register_and_value() {
        let expectations = [I2cTransaction::write(ADDR, vec![0xE0, 0xB6])];
        let mut interface = I2cInterface::new(I2cMock::new(&expectations));

        interface.write_byte(ADDR, 0xE0, 0xB6).unwrap();
        interface.release().done();
    }

    #[test]
    fn read_block_fills_buffer_and_reports_length() {
        let expectations = [I2cTransaction::write_read(
            ADDR,
            vec![0xF6],
            vec![0x5D, 0x23, 0x00],
        )];
        let mut interface = I2cInterface::new(I2cMock::new(&expectations));

        let mut buf = [0u8; 3];
        assert_eq!(interface.read_block(ADDR, 0xF6, &mut buf).unwrap(), 3);
        assert_eq!(buf, [0x5D, 0x23, 0x00]);
        interface.release().done();
    }

    #[test]
    fn write_block_prefixes_register() {
        let expectations = [I2cTransaction::write(ADDR, vec![0xF4, 0x12, 0x34])];
        let mut interface = I2cInterface::new(I2cMock::new(&expectations));

        interface.write_block(ADDR, 0xF4, &[0x12, 0x34]).unwrap();
        interface.release().done();
    }

    #[test]
    fn empty_blocks_skip_the_bus() {
        let expectations: [I2cTransaction; 0] = [];
        let mut interface = I2cInterface::new(I2cMock::new(&expectations));

        assert_eq!(interface.read_block(ADDR, 0xF6, &mut []).unwrap(), 0);
        interface.write_block(ADDR, 0xF4, &[]).unwrap();
        interface.release().done();
    }

    #[test]
    fn wrapped_bus_cannot_be_opened_by_number() {
        assert!(I2cInterface::<I2cMock>::open(1).is_none());
    }
}
