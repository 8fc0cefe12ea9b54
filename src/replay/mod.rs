//! Input replays and ghosts
//!
//! Time trials record the player's controller every frame into a
//! run-length encoded log of 32-bit [`ReplayRecord`]s. A finished run
//! becomes the player ghost; staff ghosts ship as byte-swapped logs. During
//! playback each log drives a virtual controller until it runs out, at which
//! point the ghost kart is handed over to the CPU.

pub mod playback;
pub mod record;
pub mod recorder;

use bitflags::bitflags;

pub use playback::{PlaybackStep, ReplayPlayback};
pub use record::{ReplayLog, ReplayRecord};
pub use recorder::ReplayRecorder;

use crate::{PortError, Result};

/// Records a replay may hold before recording stops
pub const REPLAY_MAX_RECORDS: usize = 0x1000;

bitflags! {
    /// Controller button word
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u16 {
        /// A
        const A = 0x8000;
        /// B
        const B = 0x4000;
        /// Z trigger
        const Z_TRIG = 0x2000;
        /// Start
        const START = 0x1000;
        /// D-pad up
        const U_JPAD = 0x0800;
        /// D-pad down
        const D_JPAD = 0x0400;
        /// D-pad left
        const L_JPAD = 0x0200;
        /// D-pad right
        const R_JPAD = 0x0100;
        /// L trigger
        const L_TRIG = 0x0020;
        /// R trigger
        const R_TRIG = 0x0010;
        /// C up
        const U_CBUTTONS = 0x0008;
        /// C down
        const D_CBUTTONS = 0x0004;
        /// C left
        const L_CBUTTONS = 0x0002;
        /// C right
        const R_CBUTTONS = 0x0001;
    }
}

bitflags! {
    /// Button bits stored in a replay record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReplayButtons: u32 {
        /// R trigger
        const R_TRIG = 1 << 28;
        /// Z trigger
        const Z_TRIG = 1 << 29;
        /// B
        const B = 1 << 30;
        /// A
        const A = 1 << 31;
    }
}

/// Buttons whose press/release edges playback leaves to the live controller.
///
/// L is excluded even though it is never recorded.
pub const REPLAY_MASK: Buttons = Buttons::all().difference(
    Buttons::A
        .union(Buttons::B)
        .union(Buttons::Z_TRIG)
        .union(Buttons::R_TRIG)
        .union(Buttons::L_TRIG),
);

/// One frame of raw controller input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerInput {
    /// Stick X
    pub stick_x: i8,
    /// Stick Y
    pub stick_y: i8,
    /// Held buttons
    pub buttons: Buttons,
}

/// Controller state as game logic sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    /// Stick X
    pub stick_x: i16,
    /// Stick Y
    pub stick_y: i16,
    /// Held buttons
    pub buttons: Buttons,
    /// Buttons pressed this frame
    pub pressed: Buttons,
    /// Buttons released this frame
    pub released: Buttons,
}

/// The two alternating player ghost slots.
///
/// One slot holds the ghost being raced against, the other receives the
/// current run. Saving a completed run flips them.
#[derive(Debug, Clone, Default)]
pub struct GhostSlots {
    slots: [Option<ReplayLog>; 2],
    ghost: usize,
}

impl GhostSlots {
    /// Two empty slots
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot holding the ghost
    pub fn ghost_slot(&self) -> usize {
        self.ghost
    }

    /// Slot the current run records into
    pub fn recording_slot(&self) -> usize {
        self.ghost ^ 1
    }

    /// Ghost log, if one was saved
    pub fn ghost(&self) -> Option<&ReplayLog> {
        self.slots[self.ghost].as_ref()
    }

    /// Start playback of the ghost
    pub fn ghost_playback(&self) -> Option<ReplayPlayback> {
        self.ghost().cloned().map(ReplayPlayback::new)
    }

    /// Keep a completed run as the new ghost.
    ///
    /// # Errors
    /// Returns [`PortError::ReplayError`] if the run was latched unsaveable
    /// or recorded nothing.
    pub fn save_run(&mut self, recorder: &ReplayRecorder) -> Result<usize> {
        if !recorder.can_save() {
            return Err(PortError::ReplayError("run cannot be saved as a ghost".into()));
        }
        let log = recorder
            .to_log()
            .ok_or_else(|| PortError::ReplayError("run recorded no input".into()))?;

        let len = log.len();
        let slot = self.recording_slot();
        self.slots[slot] = Some(log);
        self.ghost = slot;
        log::debug!(target: "replay", "saved {} records as ghost in slot {}", len, slot);
        Ok(len)
    }
}
