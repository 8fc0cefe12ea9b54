//! Controller pak checksums
//!
//! Both are MSB-first CRCs with the register flushed by zero bits at the end.

/// 5-bit CRC over an 11-bit block address (polynomial `0x15`)
pub fn address_crc(address: u16) -> u8 {
    let mut crc: u8 = 0;
    let mut bit = 0x400u16;
    while bit != 0 {
        let feedback = if crc & 0x10 != 0 { 0x15 } else { 0 };
        crc <<= 1;
        if address & bit != 0 {
            crc |= 1;
        }
        crc ^= feedback;
        bit >>= 1;
    }
    for _ in 0..5 {
        let feedback = if crc & 0x10 != 0 { 0x15 } else { 0 };
        crc = (crc << 1) ^ feedback;
    }
    crc & 0x1F
}

/// 8-bit CRC over a 32-byte data block (polynomial `0x85`)
pub fn data_crc(data: &[u8; 32]) -> u8 {
    let mut crc: u8 = 0;
    let flushed = data.iter().copied().chain(std::iter::once(0));
    for byte in flushed {
        for shift in (0..8).rev() {
            let feedback = if crc & 0x80 != 0 { 0x85 } else { 0 };
            crc = (crc << 1) | ((byte >> shift) & 1);
            crc ^= feedback;
        }
    }
    crc
}

/// Address word sent on the wire: `address << 5 | crc5(address)`
pub fn address_word(address: u16) -> u16 {
    (address << 5) | address_crc(address) as u16
}
