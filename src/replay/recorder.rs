//! Run-length input recording

use super::record::{ReplayLog, ReplayRecord, REPLAY_FRAME_INCREMENT, REPLAY_SENTINEL};
use super::{ControllerInput, REPLAY_MAX_RECORDS};

/// Records one controller's input, one call per frame.
///
/// Identical consecutive inputs extend the current record's hold count; a
/// change, or a hold count already at `0xFF`, starts a new record. Once the
/// log is full, or the run is interrupted or paused, the recording is
/// latched as unsaveable.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    records: Vec<ReplayRecord>,
    index: usize,
    cannot_save: bool,
}

impl ReplayRecorder {
    /// Start an empty recording
    pub fn new() -> Self {
        ReplayRecorder {
            records: vec![ReplayRecord(REPLAY_SENTINEL)],
            index: 0,
            cannot_save: false,
        }
    }

    /// Record one frame of input
    pub fn record(&mut self, input: &ControllerInput) {
        if self.index >= REPLAY_MAX_RECORDS {
            if !self.cannot_save {
                log::debug!(target: "replay", "input log full at {} records", self.index);
            }
            self.cannot_save = true;
            return;
        }

        let inputs = ReplayRecord::from_input(input);
        let prev = self.records[self.index];

        if self.records[0].is_sentinel() {
            self.records[self.index] = inputs;
        } else if prev.without_hold() == inputs && !prev.hold_saturated() {
            self.records[self.index] = ReplayRecord(prev.0 + REPLAY_FRAME_INCREMENT);
        } else {
            self.index += 1;
            self.records.push(inputs);
        }
    }

    /// Latch the recording unsaveable (kart picked up, out of bounds)
    pub fn interrupt(&mut self) {
        self.cannot_save = true;
    }

    /// Latch the recording unsaveable because the game was paused
    pub fn pause(&mut self) {
        self.cannot_save = true;
    }

    /// Whether the recording can still be kept as a ghost
    pub fn can_save(&self) -> bool {
        !self.cannot_save
    }

    /// Index of the record being extended
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.records[0].is_sentinel()
    }

    /// Records written so far
    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }

    /// Finished log, or `None` if nothing was recorded
    pub fn to_log(&self) -> Option<ReplayLog> {
        if self.is_empty() {
            None
        } else {
            Some(ReplayLog::new(self.records.clone()))
        }
    }
}

impl Default for ReplayRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::Buttons;

    fn input(x: i8, buttons: Buttons) -> ControllerInput {
        ControllerInput {
            stick_x: x,
            stick_y: 0,
            buttons,
        }
    }

    #[test]
    fn test_first_frame_replaces_sentinel() {
        let mut rec = ReplayRecorder::new();
        assert!(rec.is_empty());
        assert!(rec.to_log().is_none());
        rec.record(&input(5, Buttons::A));
        assert!(!rec.is_empty());
        assert_eq!(rec.records().len(), 1);
        assert_eq!(rec.records()[0].stick_x(), 5);
        assert_eq!(rec.records()[0].hold(), 0);
    }

    #[test]
    fn test_repeats_extend_hold() {
        let mut rec = ReplayRecorder::new();
        for _ in 0..4 {
            rec.record(&input(1, Buttons::B));
        }
        assert_eq!(rec.records().len(), 1);
        assert_eq!(rec.records()[0].hold(), 3);

        rec.record(&input(2, Buttons::B));
        assert_eq!(rec.index(), 1);
        assert_eq!(rec.records()[1].hold(), 0);
    }

    #[test]
    fn test_saturated_hold_starts_new_record() {
        let mut rec = ReplayRecorder::new();
        for _ in 0..256 {
            rec.record(&input(0, Buttons::empty()));
        }
        assert_eq!(rec.records().len(), 1);
        assert!(rec.records()[0].hold_saturated());

        rec.record(&input(0, Buttons::empty()));
        assert_eq!(rec.records().len(), 2);
        assert_eq!(rec.records()[1].hold(), 0);
        assert_eq!(rec.to_log().unwrap().frame_count(), 257);
    }

    #[test]
    fn test_unrecorded_buttons_do_not_split() {
        let mut rec = ReplayRecorder::new();
        rec.record(&input(0, Buttons::START));
        rec.record(&input(0, Buttons::L_TRIG));
        assert_eq!(rec.records().len(), 1);
        assert_eq!(rec.records()[0].hold(), 1);
    }

    #[test]
    fn test_full_log_latches() {
        let mut rec = ReplayRecorder::new();
        for i in 0..=REPLAY_MAX_RECORDS {
            rec.record(&input((i & 1) as i8, Buttons::empty()));
        }
        assert_eq!(rec.index(), REPLAY_MAX_RECORDS);
        assert!(rec.can_save());
        rec.record(&input(9, Buttons::empty()));
        assert!(!rec.can_save());
        assert_eq!(rec.records().len(), REPLAY_MAX_RECORDS + 1);
    }

    #[test]
    fn test_pause_latches() {
        let mut rec = ReplayRecorder::new();
        rec.pause();
        assert!(!rec.can_save());
    }
}
