//! Pak block read over PIF RAM
//!
//! Read frame layout, starting `channel` bytes into the RAM (one zero byte
//! per preceding controller port):
//!
//! | offset | field                                      |
//! |--------|--------------------------------------------|
//! | 0      | dummy (`0xFF`)                             |
//! | 1      | tx size (3)                                |
//! | 2      | rx size (33), error bits on return         |
//! | 3      | command (`0x02`, read)                     |
//! | 4..6   | address word, big-endian                   |
//! | 6..38  | data                                       |
//! | 38     | data CRC                                   |
//! | 39     | end marker (`0xFE`)                        |

use super::crc::{address_word, data_crc};
use super::{PakError, SerialBus, BLOCK_SIZE, MAX_CONTROLLERS};

/// Size of the PIF RAM
pub const PIF_RAM_SIZE: usize = 64;

/// Re-reads attempted after the first when the data CRC disagrees
pub const PAK_READ_RETRIES: usize = 2;

const CMD_NOP: u8 = 0xFF;
const CMD_END: u8 = 0xFE;
const CMD_EXE: u8 = 0x01;
const CMD_READ_PAK: u8 = 0x02;
const READ_TX_SIZE: u8 = 3;
const READ_RX_SIZE: u8 = 33;

const OFF_TX: usize = 1;
const OFF_RX: usize = 2;
const OFF_CMD: usize = 3;
const OFF_ADDR: usize = 4;
const OFF_DATA: usize = 6;
const OFF_CRC: usize = OFF_DATA + BLOCK_SIZE;
const FRAME_LEN: usize = OFF_CRC + 1;

const STATUS_OFFSET: usize = PIF_RAM_SIZE - 1;
const CHANNEL_NO_RESPONSE: u8 = 0x80;
const CHANNEL_OVERRUN: u8 = 0x40;

/// The 64-byte buffer exchanged with the PIF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PifRam {
    bytes: [u8; PIF_RAM_SIZE],
}

impl PifRam {
    /// Zeroed RAM
    pub fn new() -> Self {
        PifRam {
            bytes: [0; PIF_RAM_SIZE],
        }
    }

    /// Raw contents
    pub fn as_bytes(&self) -> &[u8; PIF_RAM_SIZE] {
        &self.bytes
    }

    /// Mutable raw contents
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PIF_RAM_SIZE] {
        &mut self.bytes
    }

    /// PIF status byte (last byte of the RAM)
    pub fn status(&self) -> u8 {
        self.bytes[STATUS_OFFSET]
    }

    /// Fill with `0xFF` and clear the status ahead of a read DMA
    pub fn prepare_read(&mut self) {
        self.bytes.fill(CMD_NOP);
        self.bytes[STATUS_OFFSET] = 0;
    }

    /// The read frame for `channel`
    pub fn read_frame(&self, channel: usize) -> Result<&[u8], PakError> {
        check_channel(channel)?;
        Ok(&self.bytes[channel..channel + FRAME_LEN])
    }

    fn read_frame_mut(&mut self, channel: usize) -> Result<&mut [u8], PakError> {
        check_channel(channel)?;
        Ok(&mut self.bytes[channel..channel + FRAME_LEN])
    }
}

impl Default for PifRam {
    fn default() -> Self {
        Self::new()
    }
}

fn check_channel(channel: usize) -> Result<(), PakError> {
    if channel < MAX_CONTROLLERS {
        Ok(())
    } else {
        Err(PakError::InvalidChannel(channel))
    }
}

/// Pack a block read request for `address` on `channel` into `ram`.
///
/// Clears the RAM, places the frame after `channel` zero bytes and
/// terminates it with the end marker.
pub fn pack_read_request(ram: &mut PifRam, channel: usize, address: u16) -> Result<(), PakError> {
    check_channel(channel)?;
    ram.bytes = [0; PIF_RAM_SIZE];
    ram.bytes[STATUS_OFFSET] = CMD_EXE;

    let frame = ram.read_frame_mut(channel)?;
    frame[0] = CMD_NOP;
    frame[OFF_TX] = READ_TX_SIZE;
    frame[OFF_RX] = READ_RX_SIZE;
    frame[OFF_CMD] = CMD_READ_PAK;
    frame[OFF_ADDR..OFF_DATA].copy_from_slice(&address_word(address).to_be_bytes());
    frame[OFF_DATA..OFF_CRC].fill(CMD_NOP);
    frame[OFF_CRC] = CMD_NOP;

    ram.bytes[channel + FRAME_LEN] = CMD_END;
    Ok(())
}

/// Validate the response for `channel` and extract the data block.
///
/// # Errors
/// [`PakError::NoResponse`] if the channel did not answer,
/// [`PakError::ControllerFail`] on an overrun and
/// [`PakError::CrcMismatch`] if the data CRC disagrees.
pub fn parse_read_response(ram: &PifRam, channel: usize) -> Result<[u8; BLOCK_SIZE], PakError> {
    let frame = ram.read_frame(channel)?;

    let channel_error = frame[OFF_RX] & (CHANNEL_NO_RESPONSE | CHANNEL_OVERRUN);
    if channel_error & CHANNEL_NO_RESPONSE != 0 {
        return Err(PakError::NoResponse);
    }
    if channel_error & CHANNEL_OVERRUN != 0 {
        return Err(PakError::ControllerFail);
    }

    let mut data = [0u8; BLOCK_SIZE];
    data.copy_from_slice(&frame[OFF_DATA..OFF_CRC]);
    let expected = data_crc(&data);
    let actual = frame[OFF_CRC];
    if expected != actual {
        return Err(PakError::CrcMismatch { expected, actual });
    }
    Ok(data)
}

/// Read one 32-byte block from the pak on `channel`.
///
/// The request is written once; the response is read up to
/// `1 + PAK_READ_RETRIES` times. A CRC mismatch triggers a status query
/// whose failure is returned as is; a healthy status means another read.
pub fn read_pak<B: SerialBus + ?Sized>(bus: &mut B, channel: usize, address: u16) -> Result<[u8; BLOCK_SIZE], PakError> {
    let mut ram = PifRam::new();
    pack_read_request(&mut ram, channel, address)?;
    bus.write_pif(&ram);

    for attempt in 1..=PAK_READ_RETRIES + 1 {
        ram.prepare_read();
        bus.read_pif(&mut ram);
        match parse_read_response(&ram, channel) {
            Ok(data) => return Ok(data),
            Err(PakError::CrcMismatch { expected, actual }) => {
                log::debug!(
                    target: "pak",
                    "channel {}: data CRC {:#04x}, expected {:#04x} (attempt {})",
                    channel,
                    actual,
                    expected,
                    attempt
                );
                bus.pak_status(channel).check()?;
            }
            Err(PakError::ControllerFail) => {
                log::debug!(target: "pak", "channel {}: overrun (attempt {})", channel, attempt);
            }
            Err(err) => return Err(err),
        }
    }

    log::warn!(
        target: "pak",
        "channel {}: block {:#05x} unreadable after {} attempts",
        channel,
        address,
        PAK_READ_RETRIES + 1
    );
    Err(PakError::ControllerFail)
}
