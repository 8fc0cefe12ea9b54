//! Controller pak reads
//!
//! A pak block read is one serial transfer: the request is packed into the
//! 64-byte PIF RAM at the controller's channel offset, written out once, and
//! the response is read back, re-reading while the data CRC disagrees.
//! Anything that goes wrong surfaces as a [`PakError`] carrying the classic
//! controller-pak error code; nothing here panics.

pub mod crc;
pub mod read;

use bitflags::bitflags;

pub use read::{pack_read_request, parse_read_response, read_pak, PifRam, PAK_READ_RETRIES};

/// Controller ports on the serial bus
pub const MAX_CONTROLLERS: usize = 4;

/// Bytes per pak block
pub const BLOCK_SIZE: usize = 32;

/// Errors reported by controller pak transfers
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakError {
    /// No pak inserted, or the controller reported an error
    #[error("no controller pak")]
    NoPack,

    /// The pak was swapped since it was last accessed
    #[error("controller pak changed")]
    NewPack,

    /// The transfer kept failing its checksum
    #[error("controller communication failure")]
    ControllerFail,

    /// Data CRC of a single response did not match
    #[error("data CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch {
        /// CRC computed over the received block
        expected: u8,
        /// CRC the pak sent
        actual: u8,
    },

    /// The channel did not answer
    #[error("no response on channel")]
    NoResponse,

    /// Channel index outside the controller ports
    #[error("invalid channel {0}")]
    InvalidChannel(usize),

    /// The device misbehaved beyond recovery
    #[error("controller pak device error")]
    Device,
}

impl PakError {
    /// Numeric controller-pak error code
    pub fn code(&self) -> i32 {
        match self {
            PakError::NoPack => 1,
            PakError::NewPack => 2,
            PakError::ControllerFail | PakError::CrcMismatch { .. } => 4,
            PakError::InvalidChannel(_) => 5,
            PakError::NoResponse => 8,
            PakError::Device => 11,
        }
    }
}

bitflags! {
    /// Pak status byte from a controller status query
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PakStatusFlags: u8 {
        /// A pak is inserted
        const CARD_ON = 0x01;
        /// The pak was pulled since the last query
        const CARD_PULL = 0x02;
        /// The last address CRC did not match
        const ADDR_CRC_ER = 0x04;
    }
}

/// Controller status query result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PakStatus {
    /// Channel error bits of the status transfer
    pub errno: u8,
    /// Pak status byte
    pub status: PakStatusFlags,
}

impl PakStatus {
    /// Interpret the status as a read outcome.
    ///
    /// `Ok(())` means the pak looks healthy and the transfer may be retried.
    pub fn check(&self) -> Result<(), PakError> {
        let on = self.status.contains(PakStatusFlags::CARD_ON);
        if on && self.status.contains(PakStatusFlags::CARD_PULL) {
            Err(PakError::NewPack)
        } else if self.errno != 0 || !on {
            Err(PakError::NoPack)
        } else if self.status.contains(PakStatusFlags::ADDR_CRC_ER) {
            Err(PakError::ControllerFail)
        } else {
            Ok(())
        }
    }
}

/// Serial interface to the controllers
pub trait SerialBus {
    /// DMA `ram` out to the PIF
    fn write_pif(&mut self, ram: &PifRam);

    /// DMA the PIF's response into `ram`
    fn read_pif(&mut self, ram: &mut PifRam);

    /// Query the status of the controller on `channel`
    fn pak_status(&mut self, channel: usize) -> PakStatus;
}
