/// Register access to the MFRC522, independent of the physical bus.
///
/// Reads and writes are blocking and synchronous. A read of `value.len()`
/// bytes from the FIFO data register pops that many bytes from the chip FIFO;
/// for ordinary registers every byte returns the current register value.
pub trait Com {
    fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<(), ()>;
    fn write(&mut self, reg: u8, value: &[u8]) -> Result<(), ()>;
}
