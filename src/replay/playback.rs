//! Replay and ghost playback

use super::record::{ReplayLog, ReplayRecord, REPLAY_FRAME_COUNTER, REPLAY_FRAME_INCREMENT};
use super::{Buttons, ControllerState, REPLAY_MASK, REPLAY_MAX_RECORDS};

/// Result of one playback frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    /// A recorded frame was written to the controller
    Applied,
    /// The log ran out; the entity should be handed to CPU control
    Exhausted,
}

/// Feeds a recorded log into a virtual controller, one frame per call
#[derive(Debug, Clone)]
pub struct ReplayPlayback {
    records: Vec<ReplayRecord>,
    index: usize,
    frames_remaining: u32,
    prev_buttons: Buttons,
}

impl ReplayPlayback {
    /// Start playback at the first record
    pub fn new(log: ReplayLog) -> Self {
        let records = log.records().to_vec();
        let frames_remaining = records.first().map_or(0, |r| r.0 & REPLAY_FRAME_COUNTER);
        ReplayPlayback {
            records,
            index: 0,
            frames_remaining,
            prev_buttons: Buttons::empty(),
        }
    }

    /// Whether the next step would report exhaustion
    pub fn is_exhausted(&self) -> bool {
        self.index >= REPLAY_MAX_RECORDS || self.index >= self.records.len()
    }

    /// Record currently playing
    pub fn index(&self) -> usize {
        self.index
    }

    /// Play one frame into `controller`.
    ///
    /// Sticks and held buttons are overwritten. Press/release edges for the
    /// recorded buttons are derived from the previous frame; edges of
    /// buttons outside the recording are kept from the controller.
    pub fn step(&mut self, controller: &mut ControllerState) -> PlaybackStep {
        if self.is_exhausted() {
            return PlaybackStep::Exhausted;
        }

        let record = self.records[self.index];
        controller.stick_x = record.stick_x() as i16;
        controller.stick_y = record.stick_y() as i16;

        let buttons = record.buttons();
        let changed = buttons ^ self.prev_buttons;
        controller.pressed = (buttons & changed) | (controller.pressed & REPLAY_MASK);
        controller.released = (self.prev_buttons & changed) | (controller.released & REPLAY_MASK);
        controller.buttons = buttons;
        self.prev_buttons = buttons;

        if self.frames_remaining == 0 {
            self.index += 1;
            self.frames_remaining = self
                .records
                .get(self.index)
                .map_or(0, |r| r.0 & REPLAY_FRAME_COUNTER);
        } else {
            self.frames_remaining -= REPLAY_FRAME_INCREMENT;
        }
        PlaybackStep::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ControllerInput, ReplayRecorder};

    fn log_of(inputs: &[(i8, Buttons)]) -> ReplayLog {
        let mut rec = ReplayRecorder::new();
        for &(x, buttons) in inputs {
            rec.record(&ControllerInput {
                stick_x: x,
                stick_y: -x,
                buttons,
            });
        }
        rec.to_log().unwrap()
    }

    #[test]
    fn test_hold_plays_extra_frames() {
        let log = ReplayLog::new(vec![ReplayRecord(0x0002_0001), ReplayRecord(0x0000_0005)]);
        let mut play = ReplayPlayback::new(log);
        let mut pad = ControllerState::default();
        let mut xs = Vec::new();
        while play.step(&mut pad) == PlaybackStep::Applied {
            xs.push(pad.stick_x);
        }
        assert_eq!(xs, vec![1, 1, 1, 5]);
        assert!(play.is_exhausted());
    }

    #[test]
    fn test_sticks_sign_extend() {
        let mut play = ReplayPlayback::new(ReplayLog::new(vec![ReplayRecord(0x0000_80FF)]));
        let mut pad = ControllerState::default();
        play.step(&mut pad);
        assert_eq!(pad.stick_x, -1);
        assert_eq!(pad.stick_y, -128);
    }

    #[test]
    fn test_button_edges() {
        let log = log_of(&[(0, Buttons::empty()), (0, Buttons::A), (0, Buttons::A), (0, Buttons::empty())]);
        let mut play = ReplayPlayback::new(log);
        let mut pad = ControllerState::default();

        play.step(&mut pad);
        assert!(pad.pressed.is_empty());

        play.step(&mut pad);
        assert_eq!(pad.pressed, Buttons::A);
        assert_eq!(pad.buttons, Buttons::A);

        play.step(&mut pad);
        assert!(pad.pressed.is_empty());

        play.step(&mut pad);
        assert_eq!(pad.released, Buttons::A);
        assert!(pad.buttons.is_empty());
    }

    #[test]
    fn test_unrecorded_edges_survive() {
        let mut play = ReplayPlayback::new(log_of(&[(0, Buttons::B)]));
        let mut pad = ControllerState {
            pressed: Buttons::START | Buttons::A,
            ..ControllerState::default()
        };
        play.step(&mut pad);
        assert_eq!(pad.pressed, Buttons::START | Buttons::B);
    }

    #[test]
    fn test_roundtrip_through_recorder() {
        let frames = [(3, Buttons::Z_TRIG), (3, Buttons::Z_TRIG), (-7, Buttons::empty()), (12, Buttons::R_TRIG)];
        let mut play = ReplayPlayback::new(log_of(&frames));
        let mut pad = ControllerState::default();
        for &(x, buttons) in &frames {
            assert_eq!(play.step(&mut pad), PlaybackStep::Applied);
            assert_eq!(pad.stick_x, x as i16);
            assert_eq!(pad.stick_y, -(x as i16));
            assert_eq!(pad.buttons, buttons);
        }
        assert_eq!(play.step(&mut pad), PlaybackStep::Exhausted);
    }

    #[test]
    fn test_empty_log_is_exhausted() {
        let mut play = ReplayPlayback::new(ReplayLog::default());
        assert_eq!(play.step(&mut ControllerState::default()), PlaybackStep::Exhausted);
    }
}
