//! MIFARE Classic and Ultralight transactions, layered on the transceive
//! engine in [`crate::mfrc522`].

use alloc::vec::Vec;

use super::com::Com;
use super::mfrc522::{Command, Mfrc522, Register};
use super::picc::{self, Uid, MIFARE_ACK};
use super::{Error, Result};

/// A MIFARE Crypto1 key is 6 bytes.
pub const KEY_SIZE: usize = 6;
/// MIFARE Classic blocks and Ultralight compatibility-write frames are 16 bytes.
pub const BLOCK_SIZE: usize = 16;

/// Which of the two sector keys to authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKey {
    A,
    B,
}

/// Transport cards ship with both keys set to all 0xFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MifareKey(pub [u8; KEY_SIZE]);

impl MifareKey {
    pub const DEFAULT: MifareKey = MifareKey([0xFF; KEY_SIZE]);
}

impl<C: Com> Mfrc522<C> {
    /// Runs the MFAuthent command to open the Crypto1 stream for the sector
    /// containing `block_addr`. The card stays authenticated until
    /// [`Mfrc522::stop_crypto1`], a failed command or leaving the field.
    ///
    /// Remember to call [`Mfrc522::stop_crypto1`] when done, or no other
    /// communication can take place.
    pub fn authenticate(
        &mut self,
        key_type: AuthKey,
        block_addr: u8,
        key: &MifareKey,
        uid: &Uid,
    ) -> Result<()> {
        let command = match key_type {
            AuthKey::A => picc::Command::MfAuthKeyA,
            AuthKey::B => picc::Command::MfAuthKeyB,
        };
        let mut send_data = [0u8; 2 + KEY_SIZE + 4];
        send_data[0] = command as u8;
        send_data[1] = block_addr;
        send_data[2..8].copy_from_slice(&key.0);
        // The last 4 UID bytes for cards with longer UIDs; this driver only
        // selects 4 byte UIDs, which are used whole.
        send_data[8..12].copy_from_slice(&uid.bytes[..4]);

        // IdleIRq signals completion; the command has no response payload.
        let response =
            self.communicate_with_picc(Command::MFAuthent, 0x10, &send_data, 0, 0, 0, false)?;
        if response.had_collision {
            return Err(Error::Collision);
        }
        Ok(())
    }

    /// Drops the Crypto1 stream. Status2Reg bit 3 is MFCrypto1On.
    pub fn stop_crypto1(&mut self) -> Result<()> {
        self.clear_register_bitmask(Register::Status2Reg, 0x08)
    }

    /// Reads one 16 byte block (MIFARE Classic) or 4 pages (Ultralight).
    ///
    /// The returned buffer is the raw 18 byte answer: 16 data bytes followed
    /// by the CRC_A, which has already been verified.
    pub fn mifare_read(&mut self, block_addr: u8) -> Result<Vec<u8>> {
        let mut buffer = [0u8; 4];
        buffer[0] = picc::Command::MfRead as u8;
        buffer[1] = block_addr;
        let crc = self.calculate_crc(&buffer[..2])?;
        buffer[2..4].copy_from_slice(&crc.to_be_bytes());

        let response = self.transceive_data(&buffer, BLOCK_SIZE + 2, 0, 0, true)?;
        if response.had_collision {
            return Err(Error::Collision);
        }
        Ok(response.data)
    }

    /// Writes one 16 byte block to an authenticated MIFARE Classic sector.
    /// For MIFARE Ultralight this is the "compatibility write": the card
    /// keeps the first 4 bytes and ignores the rest.
    ///
    /// The command runs in two phases, each acknowledged separately: first
    /// the address, then the data.
    pub fn mifare_write(&mut self, block_addr: u8, buffer: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.mifare_transceive(&[picc::Command::MfWrite as u8, block_addr], false)?;
        self.mifare_transceive(buffer, false)
    }

    /// Writes one 4 byte page to a MIFARE Ultralight.
    pub fn ultralight_write(&mut self, page: u8, data: &[u8; 4]) -> Result<()> {
        let mut buffer = [0u8; 6];
        buffer[0] = picc::Command::UlWrite as u8;
        buffer[1] = page;
        buffer[2..6].copy_from_slice(data);
        self.mifare_transceive(&buffer, false)
    }

    pub fn mifare_increment(&mut self, block_addr: u8, delta: i32) -> Result<()> {
        self.mifare_two_step(picc::Command::MfIncrement, block_addr, delta)
    }

    pub fn mifare_decrement(&mut self, block_addr: u8, delta: i32) -> Result<()> {
        self.mifare_two_step(picc::Command::MfDecrement, block_addr, delta)
    }

    /// Loads a value block into the card's internal data register.
    pub fn mifare_restore(&mut self, block_addr: u8) -> Result<()> {
        // The datasheet describes Restore as a two step operation with a
        // mandatory but unused operand.
        self.mifare_two_step(picc::Command::MfRestore, block_addr, 0)
    }

    /// Writes the card's internal data register to a value block. Follows an
    /// increment, decrement or restore to commit the result.
    pub fn mifare_transfer(&mut self, block_addr: u8) -> Result<()> {
        self.mifare_transceive(&[picc::Command::MfTransfer as u8, block_addr], false)
    }

    /// Increment, Decrement and Restore share this shape: an acknowledged
    /// command phase, then an operand phase the card commits silently.
    fn mifare_two_step(&mut self, command: picc::Command, block_addr: u8, data: i32) -> Result<()> {
        self.mifare_transceive(&[command as u8, block_addr], false)?;
        self.mifare_transceive(&data.to_le_bytes(), true)
    }

    /// Sends `send_data` with an appended CRC_A and expects the 4 bit MIFARE
    /// ACK back. With `accept_timeout` a silent card also counts as success,
    /// for the operand phase of the value operations.
    pub fn mifare_transceive(&mut self, send_data: &[u8], accept_timeout: bool) -> Result<()> {
        if send_data.len() > BLOCK_SIZE {
            return Err(Error::NoRoom);
        }
        let mut buffer = Vec::with_capacity(send_data.len() + 2);
        buffer.extend_from_slice(send_data);
        let crc = self.calculate_crc(&buffer)?;
        buffer.extend_from_slice(&crc.to_be_bytes());

        let response =
            match self.transceive_data(&buffer, BLOCK_SIZE + 2, 0, 0, false) {
                Err(Error::Timeout) if accept_timeout => return Ok(()),
                other => other?,
            };
        if response.had_collision {
            return Err(Error::Collision);
        }
        if response.data.len() != 1 || response.valid_bits != 4 {
            return Err(Error::Communication);
        }
        if response.data[0] != MIFARE_ACK {
            return Err(Error::MifareNack);
        }
        Ok(())
    }

    /// Interprets an authenticated value block and returns its value.
    pub fn mifare_get_value(&mut self, block_addr: u8) -> Result<i32> {
        let data = self.mifare_read(block_addr)?;
        if data.len() < 4 {
            return Err(Error::Communication);
        }
        Ok(i32::from_le_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Formats `block_addr` as a value block holding `value`.
    ///
    /// The layout (MF1S503x section 8.6.2.1) stores the little-endian value
    /// at bytes 0-3 and 8-11 with its bitwise complement at 4-7, then the
    /// block address, inverted, plain and inverted again at 12-15.
    pub fn mifare_set_value(&mut self, block_addr: u8, value: i32) -> Result<()> {
        let bytes = value.to_le_bytes();
        let mut buffer = [0u8; BLOCK_SIZE];
        buffer[0..4].copy_from_slice(&bytes);
        buffer[8..12].copy_from_slice(&bytes);
        for i in 0..4 {
            buffer[4 + i] = !bytes[i];
        }
        buffer[12] = block_addr;
        buffer[13] = !block_addr;
        buffer[14] = block_addr;
        buffer[15] = !block_addr;
        self.mifare_write(block_addr, &buffer)
    }
}

/// Packs the per-group access conditions of a sector trailer into its three
/// access bytes. `g0`..`g2` are the 3 bit C1/C2/C3 tuples for the data
/// blocks, `g3` the tuple for the trailer itself (MF1S503x section 8.7.1).
pub fn set_access_bits(g0: u8, g1: u8, g2: u8, g3: u8) -> [u8; 3] {
    let c1 = ((g3 & 4) << 1) | (g2 & 4) | ((g1 & 4) >> 1) | ((g0 & 4) >> 2);
    let c2 = ((g3 & 2) << 2) | ((g2 & 2) << 1) | (g1 & 2) | ((g0 & 2) >> 1);
    let c3 = ((g3 & 1) << 3) | ((g2 & 1) << 2) | ((g1 & 1) << 1) | (g0 & 1);

    [
        ((!c2 & 0xF) << 4) | (!c1 & 0xF),
        (c1 << 4) | (!c3 & 0xF),
        (c3 << 4) | c2,
    ]
}
