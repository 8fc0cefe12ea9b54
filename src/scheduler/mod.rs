//! Audio frame scheduler
//!
//! [`FrameScheduler::tick`] is called once per video frame on the audio
//! thread. Every `frames_per_update`-th call it builds one synthesis task:
//!
//! 1. announce the frame count to the game thread,
//! 2. flip the command-buffer slot and rotate the output buffers,
//! 3. hand the buffer queued behind the playing one to the device,
//! 4. reconcile last frame's sample DMA completions,
//! 5. step a pending audio reset (no task while one runs),
//! 6. size the next output buffer from the device backlog,
//! 7. apply every published command batch,
//! 8. synthesize, stir the random state and describe the task.
//!
//! The returned [`AudioTask`] is bookkeeping for whatever dispatches the
//! command list; rendering has already happened by the time it exists.

pub mod backend;
pub mod buffers;
pub mod dma;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

pub use backend::{AudioInterface, PortBackend, SilentBackend, SynthesisContext, SynthesisOutput, Synthesizer};
pub use buffers::{next_buffer_length, AiBuffers, AI_BUFFER_COUNT};
pub use dma::{DmaReconcile, DmaTally};

use crate::command::CommandRing;
use crate::config::{AudioBufferParameters, PortConfig};
use crate::mailbox::{Mailbox, PortMailboxes};
use crate::reset::{ResetController, ResetProgress, ResetStatus};
use crate::sequence::SequencerState;
use crate::stats::PortStats;

/// Task type tag for audio tasks
pub const M_AUDTASK: u32 = 2;

/// Number of alternating command buffers
pub const TASK_SLOTS: usize = 2;

/// Bytes per audio command
pub const AUDIO_CMD_SIZE: usize = 8;

/// Description of one frame's synthesis work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTask {
    /// Task type tag, always [`M_AUDTASK`]
    pub kind: u32,
    /// Task flags
    pub flags: u32,
    /// Command buffer slot holding the command list
    pub command_slot: usize,
    /// Command list length in bytes
    pub data_size: usize,
    /// Output buffer rendered this frame
    pub ai_buffer_index: usize,
    /// Length of that buffer in sample frames
    pub ai_buffer_len: i32,
    /// Frame count the task was built on
    pub frame: u32,
}

impl AudioTask {
    /// Number of audio commands in the task
    pub fn command_count(&self) -> usize {
        self.data_size / AUDIO_CMD_SIZE
    }
}

/// Game-side receiver of audio frame counts
#[derive(Debug, Clone)]
pub struct FrameWaiter {
    frames: Mailbox<u32>,
}

impl FrameWaiter {
    /// Wrap the frame-count mailbox
    pub fn new(frames: Mailbox<u32>) -> Self {
        FrameWaiter { frames }
    }

    /// Latest frame count, if a new one arrived
    pub fn poll(&self) -> Option<u32> {
        self.frames.poll()
    }

    /// Wait up to `timeout` for the next frame count
    pub fn wait_timeout(&self, timeout: Duration) -> Option<u32> {
        self.frames.recv_timeout(timeout)
    }
}

/// Audio-thread side of the port
pub struct FrameScheduler<B: PortBackend> {
    params: AudioBufferParameters,
    frames_per_update: u32,
    dma_timeout: Duration,
    backend: B,
    ring: Arc<CommandRing>,
    mailboxes: PortMailboxes,
    sequencer: SequencerState,
    reset: ResetController,
    dma: DmaTally,
    ai: AiBuffers,
    command_buffers: [Vec<u64>; TASK_SLOTS],
    task_index: usize,
    frame_count: u32,
    rng: u32,
    stats: Arc<Mutex<PortStats>>,
}

impl<B: PortBackend> FrameScheduler<B> {
    /// Create a scheduler consuming `ring` and the port mailboxes
    pub fn new(
        config: PortConfig,
        backend: B,
        ring: Arc<CommandRing>,
        mailboxes: PortMailboxes,
        stats: Arc<Mutex<PortStats>>,
    ) -> Self {
        let params = config.buffers;
        let dma = DmaTally::new(mailboxes.dma.clone());
        FrameScheduler {
            frames_per_update: params.frames_per_update.max(1),
            dma_timeout: config.dma_timeout(),
            ai: AiBuffers::new(params.max_buffer_frames()),
            params,
            backend,
            ring,
            mailboxes,
            sequencer: SequencerState::new(config.player_count),
            reset: ResetController::new(),
            dma,
            command_buffers: std::array::from_fn(|_| Vec::new()),
            task_index: 0,
            frame_count: 0,
            rng: 0,
            stats,
        }
    }

    /// Advance one video frame, building a task on eligible frames.
    ///
    /// Returns `None` on frames between updates and while an audio reset is
    /// in flight (including the frame on which it completes).
    pub fn tick(&mut self) -> Option<AudioTask> {
        self.frame_count = self.frame_count.wrapping_add(1);
        self.stats.lock().frames_ticked += 1;
        if self.frame_count % self.frames_per_update != 0 {
            return None;
        }
        self.mailboxes.frame.send_latest(self.frame_count);

        self.task_index ^= 1;
        let queued = self.ai.rotate();
        let remaining = self.backend.ai_remaining_samples();
        if self.ai.length(queued) != 0 {
            self.backend.ai_queue_buffer(self.ai.samples(queued));
        }

        self.reconcile_dma();
        self.backend.decrease_sample_dma_ttls();

        if !self.handle_reset() {
            return None;
        }

        let current = self.ai.current();
        let length = next_buffer_length(&self.params, remaining);
        self.ai.set_length(current, length);

        self.drain_published();

        let slot = self.task_index;
        let commands = &mut self.command_buffers[slot];
        commands.clear();
        let storage = self.ai.storage_mut(current);
        let sample_count = (length.max(0) as usize).min(storage.len() / 2);
        let out = self.backend.synthesize(SynthesisContext {
            commands,
            output: &mut storage[..sample_count * 2],
            sample_count,
            sequencer: &mut self.sequencer,
            dma: &mut self.dma,
        });

        self.stir_rng();
        let stir = self.ai.sample_at(current, (self.frame_count & 0xFF) as usize);
        self.rng = self.rng.wrapping_add(stir as i32 as u32);

        let written = out.commands_written;
        {
            let mut stats = self.stats.lock();
            stats.tasks_built += 1;
            stats.observe_task_len(written);
        }

        Some(AudioTask {
            kind: M_AUDTASK,
            flags: 0,
            command_slot: slot,
            data_size: written * AUDIO_CMD_SIZE,
            ai_buffer_index: current,
            ai_buffer_len: length,
            frame: self.frame_count,
        })
    }

    /// Render `sample_count` frames straight into `out`, bypassing tasks.
    ///
    /// Used where nothing dispatches command lists. Returns `false` (and
    /// leaves `out` alone) while an audio reset is in flight.
    pub fn render_next_buffer(&mut self, out: &mut [i16], sample_count: usize) -> bool {
        self.frame_count = self.frame_count.wrapping_add(1);
        self.stats.lock().frames_ticked += 1;
        self.dma.clear();

        if !self.handle_reset() {
            return false;
        }

        self.drain_published();

        let commands = &mut self.command_buffers[self.task_index];
        commands.clear();
        let sample_count = sample_count.min(out.len() / 2);
        self.backend.synthesize(SynthesisContext {
            commands,
            output: &mut out[..sample_count * 2],
            sample_count,
            sequencer: &mut self.sequencer,
            dma: &mut self.dma,
        });
        self.stir_rng();
        true
    }

    fn stir_rng(&mut self) {
        self.rng = self
            .backend
            .cycle_count()
            .wrapping_mul(self.rng.wrapping_add(self.frame_count));
    }

    fn reconcile_dma(&mut self) {
        let report = self.dma.reconcile(self.dma_timeout);
        if report.timed_out {
            let missing = report.issued - report.ready - report.waited;
            log::warn!(target: "audio", "DMA [{} lines] TIMEOUT", missing);
            self.stats.lock().dma_timeouts += 1;
        }
        if report.stragglers > 0 {
            log::debug!(target: "audio", "discarded {} stray DMA completions", report.stragglers);
        }
    }

    /// Observe a reset request and step any reset in flight.
    ///
    /// Returns `true` when the frame may be produced.
    fn handle_reset(&mut self) -> bool {
        if let Some(preset_id) = self.mailboxes.reset_request.poll() {
            log::debug!(target: "audio", "audio reset requested (preset {})", preset_id);
            self.reset.request(preset_id);
        }

        match self.reset.advance(&mut self.backend) {
            ResetProgress::Idle => true,
            ResetProgress::Suspended => {
                self.stats.lock().frames_suspended += 1;
                false
            }
            ResetProgress::Completed(preset_id) => {
                if !self.mailboxes.reset_ack.try_send(preset_id) {
                    log::warn!(target: "audio", "reset ack for preset {} dropped, mailbox full", preset_id);
                }
                log::debug!(target: "audio", "audio reset complete (preset {})", preset_id);
                let mut stats = self.stats.lock();
                stats.frames_suspended += 1;
                stats.resets_completed += 1;
                false
            }
        }
    }

    fn drain_published(&mut self) {
        while let Some(range) = self.mailboxes.publish.poll() {
            self.sequencer.process_batch(&self.ring, range, &mut self.backend);
        }
    }

    /// Command list of a task built by [`tick`](Self::tick)
    pub fn task_commands(&self, task: &AudioTask) -> &[u64] {
        let buf = &self.command_buffers[task.command_slot % TASK_SLOTS];
        &buf[..task.command_count().min(buf.len())]
    }

    /// Rendered samples of output buffer `index`
    pub fn ai_buffer(&self, index: usize) -> &[i16] {
        self.ai.samples(index)
    }

    /// Current output buffer lengths in sample frames
    pub fn ai_buffer_lengths(&self) -> [i32; AI_BUFFER_COUNT] {
        self.ai.lengths()
    }

    /// Mailbox the DMA layer posts sample DMA completions into
    pub fn dma_mailbox(&self) -> Mailbox<()> {
        self.mailboxes.dma.clone()
    }

    /// Sequence players
    pub fn sequencer(&self) -> &SequencerState {
        &self.sequencer
    }

    /// Mutable sequence players, for the per-frame fade integrator
    pub fn sequencer_mut(&mut self) -> &mut SequencerState {
        &mut self.sequencer
    }

    /// Current pseudo-random state
    pub fn rng(&self) -> u32 {
        self.rng
    }

    /// Frames ticked so far
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Active command buffer slot
    pub fn task_index(&self) -> usize {
        self.task_index
    }

    /// Reset progress
    pub fn reset_status(&self) -> ResetStatus {
        self.reset.status()
    }

    /// Buffer sizing in effect
    pub fn params(&self) -> &AudioBufferParameters {
        &self.params
    }

    /// The host backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable host backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Snapshot of the shared diagnostics
    pub fn stats(&self) -> PortStats {
        self.stats.lock().clone()
    }
}
