//! Driver for the MFRC522 contactless reader (PCD) and the PICCs it talks to.
//!
//! The protocol side implements ISO/IEC 14443-3 Type A initialization and
//! anticollision (REQA/WUPA, single cascade level SELECT, HLTA) plus the
//! MIFARE Classic/Ultralight block transactions (authenticate, read, write,
//! value block operations).
//!
//! The register interface of the chip is reached through the [`com::Com`]
//! trait; [`com_spi::ComSpi`] and [`com_i2c::ComI2c`] provide the SPI and I2C
//! transports on top of `embedded-hal`.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod com;
pub mod com_i2c;
pub mod com_spi;
pub mod mfrc522;
pub mod mifare;
pub mod picc;

/// Outcome of every protocol operation. The driver never retries: each layer
/// returns the first failure and the application decides whether to try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 通信接口出错
    ComErr,
    Communication,            // Error in communication
    Collision,                // Collission detected
    Timeout,                  // Timeout in communication.
    NoRoom,                   // A buffer is not big enough.
    InternalError,            // Internal error in the code. Should not happen.
    Invalid,                  // Invalid argument.
    CrcWrong,                 // The CRC_A does not match
    MifareNack,               // A MIFARE PICC responded with NAK.
    ProprietaryAnticollision, // The ATQA announced a proprietary anticollision scheme.
    BccError,                 // The BCC does not match the XOR of the four UID bytes.
}

pub type Result<T> = core::result::Result<T, Error>;
