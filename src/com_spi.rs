use super::com::Com;
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;

/// SPI transport (datasheet section 8.1.2).
///
/// The address byte carries the register address in bits 6..1; bit 7 is 1 for
/// a read and 0 for a write, bit 0 is always 0. During a multi-byte read the
/// address is resent for every byte except the last, which clocks out 0x00 to
/// terminate the transfer.
pub struct ComSpi<SPI, NSS> {
    com: SPI,
    nss: NSS,
}

fn read_address(reg: u8) -> u8 {
    0x80 | ((reg << 1) & 0x7E)
}

fn write_address(reg: u8) -> u8 {
    (reg << 1) & 0x7E
}

impl<SPI, NSS> ComSpi<SPI, NSS> {
    pub fn new(spi: SPI, nss: NSS) -> Self {
        Self { com: spi, nss }
    }

    pub fn release(self) -> (SPI, NSS) {
        (self.com, self.nss)
    }
}

impl<SPI, NSS> ComSpi<SPI, NSS>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    NSS: OutputPin,
{
    fn send_byte(&mut self, byte: u8) -> Result<u8, ()> {
        let mut buf = [byte];
        self.com.transfer(&mut buf).map_err(|_| ())?;
        Ok(buf[0])
    }

    // NSS must be released on every path, including errors.
    fn framed<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ()>) -> Result<T, ()> {
        self.nss.set_low().map_err(|_| ())?;
        let result = f(self);
        self.nss.set_high().map_err(|_| ())?;
        result
    }
}

impl<SPI, NSS> Com for ComSpi<SPI, NSS>
where
    SPI: spi::Transfer<u8> + spi::Write<u8>,
    NSS: OutputPin,
{
    fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<(), ()> {
        if value.is_empty() {
            return Ok(());
        }
        let address = read_address(reg);
        self.framed(|spi| {
            spi.send_byte(address)?;
            let count = value.len() - 1;
            for byte in value[..count].iter_mut() {
                *byte = spi.send_byte(address)?;
            }
            value[count] = spi.send_byte(0x00)?;
            Ok(())
        })
    }

    fn write(&mut self, reg: u8, value: &[u8]) -> Result<(), ()> {
        let address = write_address(reg);
        self.framed(|spi| {
            spi.send_byte(address)?;
            for &byte in value {
                spi.send_byte(byte)?;
            }
            Ok(())
        })
    }
}
