use super::com::Com;
use alloc::vec::Vec;
use embedded_hal::blocking::i2c;

/// I2C transport. Register addresses go on the bus unshifted; the read/write
/// direction comes from the bus protocol itself (datasheet section 8.1.3).
pub struct ComI2c<I2C> {
    com: I2C,
    addr: u8,
}

impl<I2C> ComI2c<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self { com: i2c, addr }
    }

    pub fn release(self) -> I2C {
        self.com
    }
}

impl<I2C> Com for ComI2c<I2C>
where
    I2C: i2c::Read + i2c::Write,
{
    fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<(), ()> {
        self.com.write(self.addr, &[reg]).map_err(|_| ())?;
        self.com.read(self.addr, value).map_err(|_| ())?;
        Ok(())
    }

    fn write(&mut self, reg: u8, value: &[u8]) -> Result<(), ()> {
        let mut tx_buf = Vec::with_capacity(1 + value.len());
        tx_buf.push(reg);
        tx_buf.extend_from_slice(value);
        self.com.write(self.addr, &tx_buf).map_err(|_| ())?;
        Ok(())
    }
}
