//! Replay record and log encoding

use serde::{Deserialize, Serialize};

use super::{Buttons, ControllerInput, ReplayButtons};
use crate::{PortError, Result};

/// Stick X field
pub const REPLAY_STICK_X: u32 = 0x0000_00FF;
/// Stick Y field
pub const REPLAY_STICK_Y: u32 = 0x0000_FF00;
/// Hold count field
pub const REPLAY_FRAME_COUNTER: u32 = 0x00FF_0000;
/// One hold count step
pub const REPLAY_FRAME_INCREMENT: u32 = 0x0001_0000;
/// Everything but the hold count
pub const REPLAY_CLEAR_FRAME_COUNTER: u32 = !REPLAY_FRAME_COUNTER;
/// Slot 0 value of a log with no input yet
pub const REPLAY_SENTINEL: u32 = 0xFFFF_FFFF;

/// One run-length encoded input sample.
///
/// Bits 0-7 stick X, 8-15 stick Y, 16-23 extra frames held, 28-31 the
/// R/Z/B/A buttons. A record with hold count `h` covers `h + 1` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayRecord(pub u32);

impl ReplayRecord {
    /// Encode one frame of controller input with a zero hold count
    pub fn from_input(input: &ControllerInput) -> Self {
        let mut bits = ReplayButtons::empty();
        if input.buttons.contains(Buttons::A) {
            bits |= ReplayButtons::A;
        }
        if input.buttons.contains(Buttons::B) {
            bits |= ReplayButtons::B;
        }
        if input.buttons.contains(Buttons::Z_TRIG) {
            bits |= ReplayButtons::Z_TRIG;
        }
        if input.buttons.contains(Buttons::R_TRIG) {
            bits |= ReplayButtons::R_TRIG;
        }
        let x = input.stick_x as u8 as u32;
        let y = (input.stick_y as u8 as u32) << 8;
        ReplayRecord(bits.bits() | x | y)
    }

    /// Stick X, sign-extended
    pub fn stick_x(self) -> i8 {
        (self.0 & REPLAY_STICK_X) as u8 as i8
    }

    /// Stick Y, sign-extended
    pub fn stick_y(self) -> i8 {
        ((self.0 & REPLAY_STICK_Y) >> 8) as u8 as i8
    }

    /// Extra frames this input was held
    pub fn hold(self) -> u8 {
        ((self.0 & REPLAY_FRAME_COUNTER) >> 16) as u8
    }

    /// Recorded button bits
    pub fn replay_buttons(self) -> ReplayButtons {
        ReplayButtons::from_bits_truncate(self.0)
    }

    /// Recorded buttons as controller buttons
    pub fn buttons(self) -> Buttons {
        let bits = self.replay_buttons();
        let mut buttons = Buttons::empty();
        if bits.contains(ReplayButtons::A) {
            buttons |= Buttons::A;
        }
        if bits.contains(ReplayButtons::B) {
            buttons |= Buttons::B;
        }
        if bits.contains(ReplayButtons::Z_TRIG) {
            buttons |= Buttons::Z_TRIG;
        }
        if bits.contains(ReplayButtons::R_TRIG) {
            buttons |= Buttons::R_TRIG;
        }
        buttons
    }

    /// The record with its hold count cleared
    pub fn without_hold(self) -> Self {
        ReplayRecord(self.0 & REPLAY_CLEAR_FRAME_COUNTER)
    }

    /// Whether the hold count can no longer grow
    pub fn hold_saturated(self) -> bool {
        self.0 & REPLAY_FRAME_COUNTER == REPLAY_FRAME_COUNTER
    }

    /// Whether this is the empty-log sentinel
    pub fn is_sentinel(self) -> bool {
        self.0 == REPLAY_SENTINEL
    }
}

/// A recorded input log
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayLog {
    records: Vec<ReplayRecord>,
}

impl ReplayLog {
    /// Wrap recorded entries
    pub fn new(records: Vec<ReplayRecord>) -> Self {
        ReplayLog { records }
    }

    /// Recorded entries
    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log has no entries
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Frames covered by the whole log
    pub fn frame_count(&self) -> usize {
        self.records.iter().map(|r| r.hold() as usize + 1).sum()
    }

    /// Serialize as big-endian words
    pub fn to_be_bytes(&self) -> Vec<u8> {
        self.records.iter().flat_map(|r| r.0.to_be_bytes()).collect()
    }

    /// Parse big-endian words
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(bytes, u32::from_be_bytes)
    }

    /// Parse words stored with their bytes reversed (staff ghost data)
    pub fn from_swapped_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(bytes, u32::from_le_bytes)
    }

    fn decode(bytes: &[u8], word: fn([u8; 4]) -> u32) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(PortError::ReplayError(format!(
                "replay data length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let records = bytes
            .chunks_exact(4)
            .map(|c| ReplayRecord(word([c[0], c[1], c[2], c[3]])))
            .collect();
        Ok(ReplayLog { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let input = ControllerInput {
            stick_x: -3,
            stick_y: 40,
            buttons: Buttons::A | Buttons::R_TRIG | Buttons::START,
        };
        let rec = ReplayRecord::from_input(&input);
        assert_eq!(rec.0, 0x8000_0000 | 0x1000_0000 | 0x28FD);
        assert_eq!(rec.stick_x(), -3);
        assert_eq!(rec.stick_y(), 40);
        assert_eq!(rec.hold(), 0);
        assert_eq!(rec.buttons(), Buttons::A | Buttons::R_TRIG);
    }

    #[test]
    fn test_hold_field() {
        let rec = ReplayRecord(0x00FF_1234);
        assert!(rec.hold_saturated());
        assert_eq!(rec.hold(), 0xFF);
        assert_eq!(rec.without_hold().0, 0x1234);
    }

    #[test]
    fn test_byte_orders() {
        let log = ReplayLog::new(vec![ReplayRecord(0x8001_0203), ReplayRecord(0x0002_0000)]);
        let be = log.to_be_bytes();
        assert_eq!(&be[..4], &[0x80, 0x01, 0x02, 0x03]);
        assert_eq!(ReplayLog::from_be_bytes(&be).unwrap(), log);

        let swapped = [0x03, 0x02, 0x01, 0x80];
        let parsed = ReplayLog::from_swapped_bytes(&swapped).unwrap();
        assert_eq!(parsed.records()[0], ReplayRecord(0x8001_0203));
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        assert!(matches!(
            ReplayLog::from_be_bytes(&[1, 2, 3]),
            Err(PortError::ReplayError(_))
        ));
    }

    #[test]
    fn test_frame_count() {
        let log = ReplayLog::new(vec![ReplayRecord(0x0002_0000), ReplayRecord(0)]);
        assert_eq!(log.frame_count(), 4);
    }

    #[test]
    fn test_json_is_plain_words() {
        let log = ReplayLog::new(vec![ReplayRecord(1), ReplayRecord(0x10000)]);
        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(json, "[1,65536]");
        let back: ReplayLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
