//! Audio reset sub-state-machine
//!
//! A reset (switching sound presets, reloading banks) is the only way to
//! cancel what the audio thread is doing. The game posts a preset id; the
//! scheduler notices it on its next eligible tick, suspends frame production
//! and calls the host's [`ResetStep`] once per tick until the status falls
//! back to idle, then acknowledges with the preset id it loaded.

use std::time::Duration;

use crate::mailbox::Mailbox;

/// Reset progress as reported by the host's step function.
///
/// Zero is idle; [`ResetStatus::REQUESTED`] is the entry phase. Values in
/// between are host-defined intermediate phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResetStatus(pub u8);

impl ResetStatus {
    /// No reset in flight
    pub const IDLE: ResetStatus = ResetStatus(0);
    /// A reset was just requested
    pub const REQUESTED: ResetStatus = ResetStatus(5);

    /// Whether no reset is in flight
    pub fn is_idle(self) -> bool {
        self.0 == 0
    }
}

/// Teardown/reload work performed one phase per tick.
pub trait ResetStep {
    /// Perform the work for `status` and return the next status.
    ///
    /// Returning [`ResetStatus::IDLE`] reports completion.
    fn reset_step(&mut self, status: ResetStatus, preset_id: u8) -> ResetStatus;
}

/// What the scheduler should do with the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetProgress {
    /// No reset in flight; produce the frame
    Idle,
    /// A reset is running; produce nothing
    Suspended,
    /// The reset finished this tick with the given preset; produce nothing
    Completed(u8),
}

/// Scheduler-side reset state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetController {
    status: ResetStatus,
    preset_id: u8,
}

impl ResetController {
    /// Idle controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly received request.
    ///
    /// A request arriving mid-reset restarts it with the new preset.
    pub fn request(&mut self, preset_id: u8) {
        if !self.status.is_idle() {
            log::debug!(target: "audio", "reset restarted: preset {} -> {}", self.preset_id, preset_id);
        }
        self.preset_id = preset_id;
        self.status = ResetStatus::REQUESTED;
    }

    /// Run one step if a reset is in flight
    pub fn advance<R: ResetStep + ?Sized>(&mut self, host: &mut R) -> ResetProgress {
        if self.status.is_idle() {
            return ResetProgress::Idle;
        }
        self.status = host.reset_step(self.status, self.preset_id);
        if self.status.is_idle() {
            ResetProgress::Completed(self.preset_id)
        } else {
            ResetProgress::Suspended
        }
    }

    /// Current status
    pub fn status(&self) -> ResetStatus {
        self.status
    }

    /// Preset being (or last) loaded
    pub fn preset_id(&self) -> u8 {
        self.preset_id
    }

    /// Whether a reset is in flight
    pub fn is_active(&self) -> bool {
        !self.status.is_idle()
    }
}

/// Game-side reset requester
#[derive(Debug, Clone)]
pub struct ResetHandle {
    request: Mailbox<u8>,
    ack: Mailbox<u8>,
}

impl ResetHandle {
    /// Wrap the request and acknowledgment mailboxes
    pub fn new(request: Mailbox<u8>, ack: Mailbox<u8>) -> Self {
        ResetHandle { request, ack }
    }

    /// Ask the audio thread to reset into `preset_id`.
    ///
    /// Never blocks; an unobserved earlier request is replaced.
    pub fn request(&self, preset_id: u8) {
        self.request.send_latest(preset_id);
    }

    /// Take a pending acknowledgment
    pub fn poll_ack(&self) -> Option<u8> {
        self.ack.poll()
    }

    /// Wait up to `timeout` for an acknowledgment
    pub fn wait_ack_timeout(&self, timeout: Duration) -> Option<u8> {
        self.ack.recv_timeout(timeout)
    }
}

/// Reference step function walking one phase per tick.
///
/// Phases run `5 → 4 → 3 → 2 → 1 → 0`; `on_load` is invoked with the preset
/// id on the final phase.
pub struct PhasedReset<F: FnMut(u8)> {
    on_load: F,
}

impl<F: FnMut(u8)> PhasedReset<F> {
    /// Create a phased reset calling `on_load` when the preset is loaded
    pub fn new(on_load: F) -> Self {
        PhasedReset { on_load }
    }
}

impl<F: FnMut(u8)> ResetStep for PhasedReset<F> {
    fn reset_step(&mut self, status: ResetStatus, preset_id: u8) -> ResetStatus {
        let next = ResetStatus(status.0.saturating_sub(1));
        if next.is_idle() {
            (self.on_load)(preset_id);
        }
        next
    }
}
