use alloc::vec;
use alloc::vec::Vec;

use super::com::Com;
use super::picc::{self, Response, Uid};
use super::{Error, Result};

/// MFRC522 registers. Described in chapter 9 of the datasheet.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Register {
    CommandReg = 0x01,     // starts and stops command execution
    ComIEnReg = 0x02,      // enable and disable interrupt request control bits
    DivIEnReg = 0x03,      // enable and disable interrupt request control bits
    ComIrqReg = 0x04,      // interrupt request bits
    DivIrqReg = 0x05,      // interrupt request bits
    ErrorReg = 0x06,       // error bits showing the error status of the last command executed
    Status1Reg = 0x07,     // communication status bits
    Status2Reg = 0x08,     // receiver and transmitter status bits
    FIFODataReg = 0x09,    // input and output of 64 byte FIFO buffer
    FIFOLevelReg = 0x0A,   // number of bytes stored in the FIFO buffer
    WaterLevelReg = 0x0B,  // level for FIFO underflow and overflow warning
    ControlReg = 0x0C,     // miscellaneous control registers
    BitFramingReg = 0x0D,  // adjustments for bit-oriented frames
    CollReg = 0x0E,        // bit position of the first bit-collision detected on the RF interface
    ModeReg = 0x11,        // defines general modes for transmitting and receiving
    TxModeReg = 0x12,      // defines transmission data rate and framing
    RxModeReg = 0x13,      // defines reception data rate and framing
    TxControlReg = 0x14,   // controls the logical behavior of the antenna driver pins TX1 and TX2
    TxASKReg = 0x15,       // controls the setting of the transmission modulation
    TxSelReg = 0x16,       // selects the internal sources for the antenna driver
    RxSelReg = 0x17,       // selects internal receiver settings
    RxThresholdReg = 0x18, // selects thresholds for the bit decoder
    DemodReg = 0x19,       // defines demodulator settings
    MfTxReg = 0x1C,        // controls some MIFARE communication transmit parameters
    MfRxReg = 0x1D,        // controls some MIFARE communication receive parameters
    SerialSpeedReg = 0x1F, // selects the speed of the serial UART interface
    CRCResultRegHigh = 0x21, // shows the MSB value of the CRC calculation
    CRCResultRegLow = 0x22,  // shows the LSB value of the CRC calculation
    ModWidthReg = 0x24,    // controls the ModWidth setting
    RFCfgReg = 0x26,       // configures the receiver gain
    GsNReg = 0x27,         // selects the conductance of the antenna driver pins TX1 and TX2 for modulation
    CWGsPReg = 0x28,       // defines the conductance of the p-driver output during periods of no modulation
    ModGsPReg = 0x29,      // defines the conductance of the p-driver output during periods of modulation
    TModeReg = 0x2A,       // defines settings for the internal timer
    TPrescalerReg = 0x2B,  // the lower 8 bits of the TPrescaler value
    TReloadRegHigh = 0x2C, // defines the 16-bit timer reload value, high byte
    TReloadRegLow = 0x2D,  // defines the 16-bit timer reload value, low byte
    TCounterValueRegHigh = 0x2E, // shows the 16-bit timer value, high byte
    TCounterValueRegLow = 0x2F,  // shows the 16-bit timer value, low byte
    TestSel1Reg = 0x31,    // general test signal configuration
    TestSel2Reg = 0x32,    // general test signal configuration
    TestPinEnReg = 0x33,   // enables pin output driver on pins D1 to D7
    TestPinValueReg = 0x34, // defines the values for D1 to D7 when it is used as an I/O bus
    TestBusReg = 0x35,     // shows the status of the internal test bus
    AutoTestReg = 0x36,    // controls the digital self-test
    VersionReg = 0x37,     // shows the software version
    AnalogTestReg = 0x38,  // controls the pins AUX1 and AUX2
    TestDAC1Reg = 0x39,    // defines the test value for TestDAC1
    TestDAC2Reg = 0x3A,    // defines the test value for TestDAC2
    TestADCReg = 0x3B,     // shows the value of ADC I and Q channels
}

/// Commands the MFRC522 itself executes. Described in chapter 10 of the datasheet.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Idle = 0x00,             // no action, cancels current command execution
    Mem = 0x01,              // stores 25 bytes into the internal buffer
    GenerateRandomId = 0x02, // generates a 10-byte random ID number
    CalcCRC = 0x03,          // activates the CRC coprocessor or performs a self-test
    Transmit = 0x04,         // transmits data from the FIFO buffer
    NoCmdChange = 0x07,      // no command change, can be used to modify the CommandReg register bits without affecting the command
    Receive = 0x08,          // activates the receiver circuits
    Transceive = 0x0C,       // transmits data from FIFO buffer to antenna and automatically activates the receiver after transmission
    MFAuthent = 0x0E,        // performs the MIFARE standard authentication as a reader
    SoftReset = 0x0F,        // resets the MFRC522
}

// Expected FIFO content after the digital self-test, one table per known
// version of the chip firmware.
const FIRMWARE_REFERENCE_V1_0: [u8; 64] = [
    0x00, 0xC6, 0x37, 0xD5, 0x32, 0xB7, 0x57, 0x5C,
    0xC2, 0xD8, 0x7C, 0x4D, 0xD9, 0x70, 0xC7, 0x73,
    0x10, 0xE6, 0xD2, 0xAA, 0x5E, 0xA1, 0x3E, 0x5A,
    0x14, 0xAF, 0x30, 0x61, 0xC9, 0x70, 0xDB, 0x2E,
    0x64, 0x22, 0x72, 0xB5, 0xBD, 0x65, 0xF4, 0xEC,
    0x22, 0xBC, 0xD3, 0x72, 0x35, 0xCD, 0xAA, 0x41,
    0x1F, 0xA7, 0xF3, 0x53, 0x14, 0xDE, 0x7E, 0x02,
    0xD9, 0x0F, 0xB5, 0x5E, 0x25, 0x1D, 0x29, 0x79,
];

const FIRMWARE_REFERENCE_V2_0: [u8; 64] = [
    0x00, 0xEB, 0x66, 0xBA, 0x57, 0xBF, 0x23, 0x95,
    0xD0, 0xE3, 0x0D, 0x3D, 0x27, 0x89, 0x5C, 0xDE,
    0x9D, 0x3B, 0xA7, 0x00, 0x21, 0x5B, 0x89, 0x82,
    0x51, 0x3A, 0xEB, 0x02, 0x0C, 0xA5, 0x00, 0x49,
    0x7C, 0x84, 0x4D, 0xB3, 0xCC, 0xD2, 0x1B, 0x81,
    0x5D, 0x48, 0x76, 0xD5, 0x71, 0x61, 0x21, 0xA9,
    0x86, 0x96, 0x83, 0x38, 0xCF, 0x9D, 0x5B, 0x6D,
    0xDC, 0x15, 0xBA, 0x3E, 0x7D, 0x95, 0x3B, 0x2F,
];

// Fudan Semiconductor FM17522, a common MFRC522 clone.
const FM17522_FIRMWARE_REFERENCE: [u8; 64] = [
    0x00, 0xD6, 0x78, 0x8C, 0xE2, 0xAA, 0x0C, 0x18,
    0x2A, 0xB8, 0x7A, 0x7F, 0xD3, 0x6A, 0xCF, 0x0B,
    0xB1, 0x37, 0x63, 0x4B, 0x69, 0xAE, 0x91, 0xC7,
    0xC3, 0x97, 0xAE, 0x77, 0xF4, 0x37, 0xD7, 0x9B,
    0x7C, 0xF5, 0x3C, 0x11, 0x8F, 0x15, 0xC3, 0xD7,
    0xC1, 0x5B, 0x00, 0x2A, 0xD0, 0x75, 0xDE, 0x9E,
    0x51, 0x64, 0xAB, 0x3E, 0xE9, 0x15, 0xB5, 0xAB,
    0x56, 0x9A, 0x98, 0x82, 0x26, 0xEA, 0x2A, 0x62,
];

/// The reader chip (PCD) itself. Generic over the bus transport.
pub struct Mfrc522<C> {
    com: C,
}

impl<C: Com> Mfrc522<C> {
    pub fn new(com: C) -> Self {
        Self { com }
    }

    pub fn release(self) -> C {
        self.com
    }

    #[cfg(test)]
    pub(crate) fn com_mut(&mut self) -> &mut C {
        &mut self.com
    }

    ////////////////////////////////////////////////////////////////////////
    // Register access
    ////////////////////////////////////////////////////////////////////////

    pub fn read_register(&mut self, reg: Register) -> Result<u8> {
        let mut value = [0u8];
        self.com.read(reg as u8, &mut value).map_err(|_| Error::ComErr)?;
        Ok(value[0])
    }

    /// Reads `values.len()` bytes starting at `reg`. When `rx_align` is
    /// nonzero only bit positions `rx_align..=7` of the first byte are
    /// updated; the low bits keep their previous content.
    pub fn read_register_array(
        &mut self,
        reg: Register,
        values: &mut [u8],
        rx_align: u8,
    ) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let first = values[0];
        self.com.read(reg as u8, values).map_err(|_| Error::ComErr)?;
        if rx_align > 0 {
            let mask = 0xFFu8 << rx_align;
            values[0] = (first & !mask) | (values[0] & mask);
        }
        Ok(())
    }

    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.com.write(reg as u8, &[value]).map_err(|_| Error::ComErr)
    }

    pub fn write_register_array(&mut self, reg: Register, values: &[u8]) -> Result<()> {
        self.com.write(reg as u8, values).map_err(|_| Error::ComErr)
    }

    pub fn set_register_bitmask(&mut self, reg: Register, mask: u8) -> Result<()> {
        let value = self.read_register(reg)?;
        self.write_register(reg, value | mask)
    }

    pub fn clear_register_bitmask(&mut self, reg: Register, mask: u8) -> Result<()> {
        let value = self.read_register(reg)?;
        self.write_register(reg, value & !mask)
    }

    ////////////////////////////////////////////////////////////////////////
    // Chip setup
    ////////////////////////////////////////////////////////////////////////

    /// Issues a soft reset and waits for the PowerDown bit to clear.
    pub fn reset(&mut self) -> Result<()> {
        self.write_register(Register::CommandReg, Command::SoftReset as u8)?;
        // The oscillator start-up takes up to 1ms after a cold start.
        for _ in 0..255 {
            if self.read_register(Register::CommandReg)? & (1 << 4) == 0 {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    /// Resets and configures the chip for ISO 14443A at 106 kBd.
    pub fn init(&mut self) -> Result<()> {
        self.reset()?;

        // Reset baud rates and modulation width in case the chip was left
        // configured by a previous run.
        self.write_register(Register::TxModeReg, 0x00)?;
        self.write_register(Register::RxModeReg, 0x00)?;
        self.write_register(Register::ModWidthReg, 0x26)?;

        // Timeout timer: TAuto=1, start automatically at the end of the
        // transmission. TPrescaler=0xA9 gives a 40kHz timer (25us period),
        // reload of 0x3E8 = 1000 gives a 25ms timeout.
        self.write_register(Register::TModeReg, 0x80)?;
        self.write_register(Register::TPrescalerReg, 0xA9)?;
        self.write_register(Register::TReloadRegHigh, 0x03)?;
        self.write_register(Register::TReloadRegLow, 0xE8)?;

        // Force 100% ASK modulation.
        self.write_register(Register::TxASKReg, 0x40)?;
        // CRC coprocessor preset 0x6363 (ISO 14443-3 6.2.4).
        self.write_register(Register::ModeReg, 0x3D)?;

        self.antenna_on()
    }

    /// Turns the antenna on by enabling the TX1 and TX2 driver pins.
    pub fn antenna_on(&mut self) -> Result<()> {
        let value = self.read_register(Register::TxControlReg)?;
        if value & 0x03 != 0x03 {
            self.write_register(Register::TxControlReg, value | 0x03)?;
        }
        Ok(())
    }

    pub fn antenna_off(&mut self) -> Result<()> {
        self.clear_register_bitmask(Register::TxControlReg, 0x03)
    }

    /// Receiver gain, 0 to 7 (RxGain[2:0], 18dB to 48dB).
    pub fn antenna_gain(&mut self) -> Result<u8> {
        Ok((self.read_register(Register::RFCfgReg)? & 0x70) >> 4)
    }

    pub fn set_antenna_gain(&mut self, gain: u8) -> Result<()> {
        if self.antenna_gain()? != gain & 0x07 {
            self.clear_register_bitmask(Register::RFCfgReg, 0x70)?;
            self.set_register_bitmask(Register::RFCfgReg, (gain & 0x07) << 4)?;
        }
        Ok(())
    }

    /// Chip firmware version: 0x91 for v1.0, 0x92 for v2.0, 0x88 for the
    /// FM17522 clone.
    pub fn version(&mut self) -> Result<u8> {
        self.read_register(Register::VersionReg)
    }

    /// Runs the digital self-test described in datasheet section 16.1.1 and
    /// compares the output against the known firmware tables.
    pub fn self_test(&mut self) -> Result<()> {
        self.reset()?;

        // The test is started on an internal buffer of 25 zero bytes.
        self.set_register_bitmask(Register::FIFOLevelReg, 0x80)?;
        self.write_register_array(Register::FIFODataReg, &[0u8; 25])?;
        self.write_register(Register::CommandReg, Command::Mem as u8)?;

        // Enable the self-test and start it by a CalcCRC on one zero byte.
        self.write_register(Register::AutoTestReg, 0x09)?;
        self.write_register(Register::FIFODataReg, 0x00)?;
        self.write_register(Register::CommandReg, Command::CalcCRC as u8)?;

        for _ in 0..0xFF {
            if self.read_register(Register::DivIrqReg)? & 0x04 != 0 {
                break;
            }
        }
        self.write_register(Register::CommandReg, Command::Idle as u8)?;

        let mut result = [0u8; 64];
        self.read_register_array(Register::FIFODataReg, &mut result, 0)?;
        self.write_register(Register::AutoTestReg, 0x00)?;

        let reference: &[u8; 64] = match self.read_register(Register::VersionReg)? {
            0x88 => &FM17522_FIRMWARE_REFERENCE,
            0x91 => &FIRMWARE_REFERENCE_V1_0,
            0x92 => &FIRMWARE_REFERENCE_V2_0,
            _ => return Err(Error::Communication),
        };
        if result != *reference {
            return Err(Error::Communication);
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////
    // Talking to PICCs
    ////////////////////////////////////////////////////////////////////////

    /// Feeds `data` to the CRC coprocessor and returns the CRC_A.
    ///
    /// The low half of the returned value holds the register at 0x21 and the
    /// high half the register at 0x22, so `to_be_bytes()` yields the two CRC
    /// bytes in transmission order (least significant byte first, ISO 14443-3
    /// section 6.2.4).
    pub fn calculate_crc(&mut self, data: &[u8]) -> Result<u16> {
        self.write_register(Register::CommandReg, Command::Idle as u8)?;
        self.write_register(Register::DivIrqReg, 0x04)?;
        self.set_register_bitmask(Register::FIFOLevelReg, 0x80)?;
        self.write_register_array(Register::FIFODataReg, data)?;
        self.write_register(Register::CommandReg, Command::CalcCRC as u8)?;

        // The coprocessor needs 25us per byte; even a full 64 byte FIFO
        // finishes long before this loop runs out.
        for _ in 0..5000 {
            if self.read_register(Register::DivIrqReg)? & 0x04 != 0 {
                self.write_register(Register::CommandReg, Command::Idle as u8)?;
                let mut result = u16::from(self.read_register(Register::CRCResultRegLow)?) << 8;
                result |= u16::from(self.read_register(Register::CRCResultRegHigh)?);
                return Ok(result);
            }
        }
        Err(Error::Timeout)
    }

    /// Transmits the FIFO content and collects the answer, the workhorse
    /// behind every protocol operation.
    ///
    /// `wait_irq` selects the ComIrqReg bits that signal completion of
    /// `command`. Up to `back_capacity` response bytes are accepted; 0 means
    /// no answer is expected. `valid_bits` is the number of bits to send from
    /// the last byte of `send_data` (0 = all 8), `rx_align` the bit position
    /// in the first response byte where reception starts.
    ///
    /// A collision is reported through [`Response::had_collision`] rather
    /// than an error so that the bytes received before the collision stay
    /// available to the caller.
    pub fn communicate_with_picc(
        &mut self,
        command: Command,
        wait_irq: u8,
        send_data: &[u8],
        back_capacity: usize,
        valid_bits: u8,
        rx_align: u8,
        check_crc: bool,
    ) -> Result<Response> {
        let bit_framing = (rx_align << 4) | (valid_bits & 0x07);

        self.write_register(Register::CommandReg, Command::Idle as u8)?;
        self.write_register(Register::ComIrqReg, 0x7F)?;
        self.set_register_bitmask(Register::FIFOLevelReg, 0x80)?;
        self.write_register_array(Register::FIFODataReg, send_data)?;
        self.write_register(Register::BitFramingReg, bit_framing)?;
        self.write_register(Register::CommandReg, command as u8)?;
        if let Command::Transceive = command {
            // StartSend
            self.set_register_bitmask(Register::BitFramingReg, 0x80)?;
        }

        // The chip timer fires after 25ms of silence (TimerIRq). The loop
        // bound only guards against a wedged chip that raises neither bit.
        let mut completed = false;
        for _ in 0..2000 {
            let irq = self.read_register(Register::ComIrqReg)?;
            if irq & wait_irq != 0 {
                completed = true;
                break;
            }
            if irq & 0x01 != 0 {
                return Err(Error::Timeout);
            }
        }
        if !completed {
            return Err(Error::Timeout);
        }

        // BufferOvfl ParityErr ProtocolErr
        let error = self.read_register(Register::ErrorReg)?;
        if error & 0x13 != 0 {
            return Err(Error::Communication);
        }

        let mut response = Response {
            data: Vec::new(),
            valid_bits: 0,
            had_collision: false,
        };
        if back_capacity > 0 {
            let count = usize::from(self.read_register(Register::FIFOLevelReg)?);
            if count > back_capacity {
                return Err(Error::NoRoom);
            }
            let mut data = vec![0u8; count];
            self.read_register_array(Register::FIFODataReg, &mut data, rx_align)?;
            response.data = data;
            // RxLastBits: number of valid bits in the last byte, 0 = all 8.
            response.valid_bits = self.read_register(Register::ControlReg)? & 0x07;
        }

        // CollErr, checked only after the data was copied out.
        if error & 0x08 != 0 {
            response.had_collision = true;
            return Ok(response);
        }

        if check_crc && !response.data.is_empty() {
            // A MIFARE NAK is a lone 4-bit answer, not a broken frame.
            if response.data.len() == 1 && response.valid_bits == 4 {
                return Err(Error::MifareNack);
            }
            if response.data.len() < 2 || response.valid_bits != 0 {
                return Err(Error::CrcWrong);
            }
            let len = response.data.len();
            let crc = self.calculate_crc(&response.data[..len - 2])?;
            if response.data[len - 2] != (crc >> 8) as u8
                || response.data[len - 1] != crc as u8
            {
                return Err(Error::CrcWrong);
            }
        }

        Ok(response)
    }

    /// Executes the Transceive command, waiting on RxIRq and IdleIRq.
    pub fn transceive_data(
        &mut self,
        send_data: &[u8],
        back_capacity: usize,
        valid_bits: u8,
        rx_align: u8,
        check_crc: bool,
    ) -> Result<Response> {
        self.communicate_with_picc(
            Command::Transceive,
            0x30,
            send_data,
            back_capacity,
            valid_bits,
            rx_align,
            check_crc,
        )
    }

    /// REQA: invites PICCs in state IDLE. Fills in `uid.atqa` on success.
    pub fn request_a(&mut self, uid: &mut Uid) -> Result<()> {
        self.reqa_or_wupa(picc::Command::REQA, uid)
    }

    /// WUPA: invites PICCs in state IDLE and HALT. Fills in `uid.atqa`.
    pub fn wakeup_a(&mut self, uid: &mut Uid) -> Result<()> {
        self.reqa_or_wupa(picc::Command::WUPA, uid)
    }

    fn reqa_or_wupa(&mut self, command: picc::Command, uid: &mut Uid) -> Result<()> {
        // ValuesAfterColl=0: keep all received bits after a collision.
        self.clear_register_bitmask(Register::CollReg, 0x80)?;

        // REQA and WUPA are short frames: 7 bits of a single byte.
        let response = self.transceive_data(&[command as u8], 2, 7, 0, false)?;
        if response.had_collision {
            return Err(Error::Collision);
        }
        // The ATQA is exactly 2 full bytes.
        if response.data.len() != 2 || response.valid_bits != 0 {
            return Err(Error::Communication);
        }
        uid.atqa = u16::from(response.data[0]) | u16::from(response.data[1]) << 8;
        Ok(())
    }

    /// Runs anticollision and selects the PICC (ISO 14443-3 section 6.4.3),
    /// filling in `uid.bytes`, `uid.size` and `uid.sak`.
    ///
    /// Only cascade level 1 is handled, so the PICCs this can select are the
    /// ones with a 4 byte UID. A double or triple size UID answers the first
    /// SELECT with the cascade bit set, which is reported as
    /// [`Error::InternalError`].
    pub fn select(&mut self, uid: &mut Uid) -> Result<()> {
        // ATQA bits 0..4 announce bit frame anticollision; a PICC using a
        // proprietary scheme sets none or several of them.
        match uid.atqa & 0x001F {
            0x01 | 0x02 | 0x04 | 0x08 | 0x10 => (),
            _ => return Err(Error::ProprietaryAnticollision),
        }

        self.clear_register_bitmask(Register::CollReg, 0x80)?;

        // ANTICOLLISION: SEL + NVB for 2 whole bytes, no CRC.
        let anticoll = &[picc::Command::SelCl1 as u8, 0x20];
        let response = self.transceive_data(anticoll, 10, 0, 0, false)?;
        if response.had_collision {
            return Err(Error::Collision);
        }
        // 4 UID bytes plus the BCC.
        if response.data.len() != 5 || response.valid_bits != 0 {
            return Err(Error::Communication);
        }
        let bcc =
            response.data[0] ^ response.data[1] ^ response.data[2] ^ response.data[3];
        if bcc != response.data[4] {
            return Err(Error::BccError);
        }
        uid.bytes[..4].copy_from_slice(&response.data[..4]);
        uid.size = 4;

        // SELECT: SEL + NVB for 7 whole bytes + UID + BCC + CRC_A.
        let mut buffer = [0u8; 9];
        buffer[0] = picc::Command::SelCl1 as u8;
        buffer[1] = 0x70;
        buffer[2..7].copy_from_slice(&response.data[..5]);
        let crc = self.calculate_crc(&buffer[..7])?;
        buffer[7..9].copy_from_slice(&crc.to_be_bytes());

        let response = self.transceive_data(&buffer, 10, 0, 0, true)?;
        if response.had_collision {
            return Err(Error::Collision);
        }
        // SAK plus its CRC_A, already verified above.
        if response.data.len() != 3 || response.valid_bits != 0 {
            return Err(Error::Communication);
        }
        if response.data[0] & 0x04 != 0 {
            // Cascade bit: the UID is longer than 4 bytes and would need
            // cascade levels 2 and 3.
            return Err(Error::InternalError);
        }
        uid.sak = response.data[0];
        Ok(())
    }

    /// HLTA: sends the ACTIVE PICC to state HALT.
    ///
    /// Success is signaled by silence: a PICC that answers anything within
    /// 1ms did not accept the command, so the timeout and success outcomes of
    /// the transceive are inverted here.
    pub fn halt_a(&mut self) -> Result<()> {
        let mut buffer = [0u8; 4];
        buffer[0] = picc::Command::HLTA as u8;
        buffer[1] = 0x00;
        let crc = self.calculate_crc(&buffer[..2])?;
        buffer[2..4].copy_from_slice(&crc.to_be_bytes());

        match self.transceive_data(&buffer, 0, 0, 0, false) {
            Err(Error::Timeout) => Ok(()),
            Ok(response) if response.had_collision => Err(Error::Collision),
            Ok(_) => Err(Error::Communication),
            Err(e) => Err(e),
        }
    }

    /// Probes the field with a REQA. A collision still means at least one
    /// card is present.
    pub fn is_new_card_present(&mut self, uid: &mut Uid) -> Result<bool> {
        // Undo a possible leftover baud rate change before probing.
        self.write_register(Register::TxModeReg, 0x00)?;
        self.write_register(Register::RxModeReg, 0x00)?;
        self.write_register(Register::ModWidthReg, 0x26)?;

        match self.request_a(uid) {
            Ok(()) => Ok(true),
            Err(Error::Collision) => Ok(true),
            Err(Error::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Selects the card a previous [`Mfrc522::is_new_card_present`] saw.
    pub fn read_card_serial(&mut self, uid: &mut Uid) -> Result<()> {
        self.select(uid)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! A register-level simulation of the chip, plus either a scripted reply
    //! queue or a small MIFARE Classic card model behind its antenna.

    use super::super::com::Com;
    use std::collections::VecDeque;

    /// Software CRC_A (ISO 14443-3 6.2.4): preset 0x6363, the low byte of the
    /// result goes on the wire first.
    pub fn crc_a(data: &[u8]) -> u16 {
        let mut crc: u16 = 0x6363;
        for &byte in data {
            let mut ch = byte ^ (crc as u8);
            ch ^= ch << 4;
            crc = (crc >> 8)
                ^ (u16::from(ch) << 8)
                ^ (u16::from(ch) << 3)
                ^ (u16::from(ch) >> 4);
        }
        crc
    }

    pub fn with_crc(data: &[u8]) -> Vec<u8> {
        let crc = crc_a(data);
        let mut out = data.to_vec();
        out.push(crc as u8);
        out.push((crc >> 8) as u8);
        out
    }

    pub enum Reply {
        Data {
            data: Vec<u8>,
            valid_bits: u8,
            error_bits: u8,
        },
        Silence,
    }

    impl Reply {
        pub fn bytes(data: &[u8]) -> Self {
            Reply::Data {
                data: data.to_vec(),
                valid_bits: 0,
                error_bits: 0,
            }
        }

        pub fn short(data: &[u8], valid_bits: u8) -> Self {
            Reply::Data {
                data: data.to_vec(),
                valid_bits,
                error_bits: 0,
            }
        }

        pub fn ack() -> Self {
            Reply::short(&[0x0A], 4)
        }

        pub fn nak(code: u8) -> Self {
            Reply::short(&[code], 4)
        }
    }

    /// One MIFARE Classic card in the field.
    pub struct CardSim {
        pub atqa: u16,
        pub uid: [u8; 4],
        pub sak: u8,
        pub blocks: Vec<[u8; 16]>,
        pub halted: bool,
        /// A broken card that answers HLTA instead of staying silent.
        pub answers_halt: bool,
        pending_write: Option<u8>,
        pending_value: bool,
    }

    impl CardSim {
        pub fn mifare_1k(uid: [u8; 4]) -> Self {
            CardSim {
                atqa: 0x0004,
                uid,
                sak: 0x08,
                blocks: vec![[0u8; 16]; 64],
                halted: false,
                answers_halt: false,
                pending_write: None,
                pending_value: false,
            }
        }

        fn bcc(&self) -> u8 {
            self.uid[0] ^ self.uid[1] ^ self.uid[2] ^ self.uid[3]
        }

        fn respond(&mut self, frame: &[u8], tx_bits: u8) -> Reply {
            if self.pending_write.is_some() && frame.len() == 18 {
                let addr = usize::from(self.pending_write.take().unwrap());
                self.blocks[addr].copy_from_slice(&frame[..16]);
                return Reply::ack();
            }
            if self.pending_value && frame.len() == 6 {
                // The value operand phase is never acknowledged.
                self.pending_value = false;
                return Reply::Silence;
            }
            match frame {
                [0x26] if tx_bits == 7 => {
                    if self.halted {
                        return Reply::Silence;
                    }
                    Reply::bytes(&[self.atqa as u8, (self.atqa >> 8) as u8])
                }
                [0x52] if tx_bits == 7 => {
                    self.halted = false;
                    Reply::bytes(&[self.atqa as u8, (self.atqa >> 8) as u8])
                }
                [0x93, 0x20] => {
                    let mut answer = self.uid.to_vec();
                    answer.push(self.bcc());
                    Reply::bytes(&answer)
                }
                [0x93, 0x70, ..] if frame.len() == 9 => Reply::bytes(&with_crc(&[self.sak])),
                [0x50, 0x00, ..] => {
                    if self.answers_halt {
                        return Reply::bytes(&[0x00]);
                    }
                    self.halted = true;
                    Reply::Silence
                }
                [0x30, addr, ..] if frame.len() == 4 => {
                    Reply::bytes(&with_crc(&self.blocks[usize::from(*addr)]))
                }
                [0xA0, addr, ..] if frame.len() == 4 => {
                    self.pending_write = Some(*addr);
                    Reply::ack()
                }
                [0xA2, page, ..] if frame.len() == 8 => {
                    self.blocks[usize::from(*page)][..4].copy_from_slice(&frame[2..6]);
                    Reply::ack()
                }
                [0xC0 | 0xC1 | 0xC2, _, ..] if frame.len() == 4 => {
                    self.pending_value = true;
                    Reply::ack()
                }
                [0xB0, _, ..] if frame.len() == 4 => Reply::ack(),
                _ => Reply::Silence,
            }
        }
    }

    pub struct MockPcd {
        pub regs: [u8; 64],
        pub fifo: Vec<u8>,
        /// Frames drained from the FIFO at each Transceive/MFAuthent.
        pub sent: Vec<Vec<u8>>,
        pub replies: VecDeque<Reply>,
        pub card: Option<CardSim>,
        pub self_test_fifo: [u8; 64],
        /// When set, MFAuthent raises the timer interrupt instead of IdleIRq.
        pub auth_timeout: bool,
    }

    const COMMAND: usize = 0x01;
    const COM_IRQ: usize = 0x04;
    const DIV_IRQ: usize = 0x05;
    const ERROR: usize = 0x06;
    const STATUS2: usize = 0x08;
    const CONTROL: usize = 0x0C;
    const BIT_FRAMING: usize = 0x0D;
    const CRC_HIGH: usize = 0x21;
    const CRC_LOW: usize = 0x22;
    const AUTO_TEST: usize = 0x36;
    const VERSION: usize = 0x37;

    impl MockPcd {
        pub fn new() -> Self {
            let mut mock = MockPcd {
                regs: [0u8; 64],
                fifo: Vec::new(),
                sent: Vec::new(),
                replies: VecDeque::new(),
                card: None,
                self_test_fifo: [0u8; 64],
                auth_timeout: false,
            };
            mock.regs[VERSION] = 0x92;
            mock
        }

        pub fn with_card(card: CardSim) -> Self {
            let mut mock = Self::new();
            mock.card = Some(card);
            mock
        }

        pub fn push_reply(&mut self, reply: Reply) {
            self.replies.push_back(reply);
        }

        fn apply(&mut self, reply: Reply) {
            match reply {
                Reply::Silence => self.regs[COM_IRQ] |= 0x01,
                Reply::Data {
                    data,
                    valid_bits,
                    error_bits,
                } => {
                    self.fifo = data;
                    self.regs[CONTROL] = valid_bits & 0x07;
                    self.regs[ERROR] = error_bits;
                    self.regs[COM_IRQ] |= 0x30;
                }
            }
        }

        fn execute(&mut self, command: u8) {
            match command {
                // SoftReset: everything but the version register clears.
                0x0F => {
                    let version = self.regs[VERSION];
                    self.regs = [0u8; 64];
                    self.regs[VERSION] = version;
                    self.fifo.clear();
                }
                // Idle
                0x00 => self.regs[COMMAND] = 0x00,
                // Mem just consumes the FIFO here.
                0x01 => self.fifo.clear(),
                // CalcCRC, doubling as the self-test trigger.
                0x03 => {
                    if self.regs[AUTO_TEST] == 0x09 {
                        self.fifo = self.self_test_fifo.to_vec();
                    } else {
                        let crc = crc_a(&self.fifo);
                        self.fifo.clear();
                        self.regs[CRC_HIGH] = (crc >> 8) as u8;
                        self.regs[CRC_LOW] = crc as u8;
                    }
                    self.regs[DIV_IRQ] |= 0x04;
                }
                // Transceive
                0x0C => {
                    let frame: Vec<u8> = self.fifo.drain(..).collect();
                    let tx_bits = self.regs[BIT_FRAMING] & 0x07;
                    self.sent.push(frame.clone());
                    let reply = if let Some(card) = self.card.as_mut() {
                        card.respond(&frame, tx_bits)
                    } else {
                        self.replies.pop_front().unwrap_or(Reply::Silence)
                    };
                    self.apply(reply);
                }
                // MFAuthent
                0x0E => {
                    let frame: Vec<u8> = self.fifo.drain(..).collect();
                    self.sent.push(frame);
                    if self.auth_timeout {
                        self.regs[COM_IRQ] |= 0x01;
                    } else {
                        self.regs[STATUS2] |= 0x08;
                        self.regs[COM_IRQ] |= 0x10;
                    }
                }
                _ => {}
            }
        }
    }

    impl Com for MockPcd {
        fn read(&mut self, reg: u8, value: &mut [u8]) -> Result<(), ()> {
            let reg = usize::from(reg);
            match reg {
                0x09 => {
                    for byte in value.iter_mut() {
                        *byte = if self.fifo.is_empty() {
                            0
                        } else {
                            self.fifo.remove(0)
                        };
                    }
                }
                0x0A => {
                    for byte in value.iter_mut() {
                        *byte = self.fifo.len() as u8;
                    }
                }
                _ => {
                    for byte in value.iter_mut() {
                        *byte = self.regs[reg];
                    }
                }
            }
            Ok(())
        }

        fn write(&mut self, reg: u8, value: &[u8]) -> Result<(), ()> {
            let reg = usize::from(reg);
            match reg {
                0x09 => self.fifo.extend_from_slice(value),
                0x0A => {
                    for &byte in value {
                        if byte & 0x80 != 0 {
                            self.fifo.clear();
                        }
                        self.regs[reg] = byte & 0x7F;
                    }
                }
                // Irq registers: bit 7 selects set (1) or clear (0).
                0x04 | 0x05 => {
                    for &byte in value {
                        if byte & 0x80 != 0 {
                            self.regs[reg] |= byte & 0x7F;
                        } else {
                            self.regs[reg] &= !byte;
                        }
                    }
                }
                0x01 => {
                    for &byte in value {
                        self.regs[reg] = byte;
                        self.execute(byte);
                    }
                }
                _ => {
                    for &byte in value {
                        self.regs[reg] = byte;
                    }
                }
            }
            Ok(())
        }
    }
}
