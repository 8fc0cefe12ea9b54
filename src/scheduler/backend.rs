//! Collaborators the scheduler drives each frame
//!
//! The scheduler owns the pacing; everything that touches hardware or does
//! DSP sits behind these traits. A backend bundles all of them into one
//! [`PortBackend`] so it can be handed to the audio thread as a single value.

use super::dma::DmaTally;
use crate::reset::{ResetStatus, ResetStep};
use crate::sequence::{SequenceHost, SequencerState};

/// Cycle counter ticks per output sample frame on the reference clock
pub const CYCLES_PER_SAMPLE: u32 = 1464;

/// Inputs to one synthesis call
pub struct SynthesisContext<'a> {
    /// Audio command list to fill (cleared before the call)
    pub commands: &'a mut Vec<u64>,
    /// Interleaved stereo destination, `sample_count * 2` values
    pub output: &'a mut [i16],
    /// Sample frames to render
    pub sample_count: usize,
    /// Sequence players after this frame's commands were applied
    pub sequencer: &'a mut SequencerState,
    /// Tally to count sample DMAs issued while rendering
    pub dma: &'a mut DmaTally,
}

/// What a synthesis call produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisOutput {
    /// Audio commands written to the command list
    pub commands_written: usize,
    /// Sample frames written to the destination
    pub samples_written: usize,
}

/// Renders one frame of audio
pub trait Synthesizer {
    /// Fill `ctx.output` and `ctx.commands` for `ctx.sample_count` frames
    fn synthesize(&mut self, ctx: SynthesisContext<'_>) -> SynthesisOutput;
}

/// The audio output device
pub trait AudioInterface {
    /// Sample frames still queued in the device
    fn ai_remaining_samples(&self) -> i32;

    /// Queue an interleaved stereo buffer behind the one playing
    fn ai_queue_buffer(&mut self, samples: &[i16]);

    /// Free-running cycle counter
    fn cycle_count(&self) -> u32;

    /// Age the sample cache's DMA buffers by one frame
    fn decrease_sample_dma_ttls(&mut self) {}
}

/// Everything the scheduler needs from its host
pub trait PortBackend: Synthesizer + AudioInterface + ResetStep + SequenceHost + Send {}

impl<T> PortBackend for T where T: Synthesizer + AudioInterface + ResetStep + SequenceHost + Send {}

/// Backend that renders silence.
///
/// Emits one placeholder audio command per 16 sample frames, reports a fixed
/// device backlog and walks resets down one phase per call.
#[derive(Debug, Clone, Default)]
pub struct SilentBackend {
    remaining: i32,
    clock: u32,
    queued_buffers: u64,
    last_queued_len: usize,
    loaded_preset: Option<u8>,
}

impl SilentBackend {
    /// Silent backend with an empty device queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Silent backend reporting `remaining` sample frames queued
    pub fn with_remaining(remaining: i32) -> Self {
        SilentBackend {
            remaining,
            ..Self::default()
        }
    }

    /// Change the reported device backlog
    pub fn set_remaining(&mut self, remaining: i32) {
        self.remaining = remaining;
    }

    /// Buffers handed to the device so far
    pub fn queued_buffers(&self) -> u64 {
        self.queued_buffers
    }

    /// Length in sample frames of the last buffer handed to the device
    pub fn last_queued_len(&self) -> usize {
        self.last_queued_len
    }

    /// Preset loaded by the last completed reset
    pub fn loaded_preset(&self) -> Option<u8> {
        self.loaded_preset
    }
}

impl Synthesizer for SilentBackend {
    fn synthesize(&mut self, ctx: SynthesisContext<'_>) -> SynthesisOutput {
        ctx.output.fill(0);
        let chunks = (ctx.sample_count + 15) / 16;
        ctx.commands.extend(std::iter::repeat(0u64).take(chunks));
        self.clock = self
            .clock
            .wrapping_add((ctx.sample_count as u32).wrapping_mul(CYCLES_PER_SAMPLE));
        SynthesisOutput {
            commands_written: chunks,
            samples_written: ctx.sample_count,
        }
    }
}

impl AudioInterface for SilentBackend {
    fn ai_remaining_samples(&self) -> i32 {
        self.remaining
    }

    fn ai_queue_buffer(&mut self, samples: &[i16]) {
        self.queued_buffers += 1;
        self.last_queued_len = samples.len() / 2;
    }

    fn cycle_count(&self) -> u32 {
        self.clock
    }
}

impl ResetStep for SilentBackend {
    fn reset_step(&mut self, status: ResetStatus, preset_id: u8) -> ResetStatus {
        let next = ResetStatus(status.0.saturating_sub(1));
        if next.is_idle() {
            self.loaded_preset = Some(preset_id);
        }
        next
    }
}

impl SequenceHost for SilentBackend {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Mailbox;

    #[test]
    fn test_silent_synthesis() {
        let mut backend = SilentBackend::new();
        let mut commands = Vec::new();
        let mut output = vec![7i16; 200];
        let mut sequencer = SequencerState::default();
        let mut dma = DmaTally::new(Mailbox::with_capacity(1));

        let out = backend.synthesize(SynthesisContext {
            commands: &mut commands,
            output: &mut output,
            sample_count: 100,
            sequencer: &mut sequencer,
            dma: &mut dma,
        });
        assert_eq!(out.commands_written, 7);
        assert_eq!(out.samples_written, 100);
        assert_eq!(commands.len(), 7);
        assert!(output.iter().all(|&s| s == 0));
        assert_eq!(backend.cycle_count(), 100 * CYCLES_PER_SAMPLE);
    }

    #[test]
    fn test_silent_reset_walks_five_phases() {
        let mut backend = SilentBackend::new();
        let mut status = ResetStatus::REQUESTED;
        let mut steps = 0;
        while !status.is_idle() {
            status = backend.reset_step(status, 9);
            steps += 1;
        }
        assert_eq!(steps, 5);
        assert_eq!(backend.loaded_preset(), Some(9));
    }
}
