//! Command ring and its producer end
//!
//! The ring has exactly one writer (game thread, through [`CommandQueue`]) and
//! one reader (audio thread). Slots are plain atomics, so there is no lock:
//! the reader only ever touches ranges it was handed in a publish message,
//! and the writer never waits. A writer that laps the reader overwrites
//! unread slots; that loss is accepted; the overrun batch still drains in
//! enqueue order and the queue-depth high-water mark saturates at 256.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioCmd, CmdPayload};
use crate::mailbox::Mailbox;
use crate::stats::PortStats;

/// Number of slots in the ring
pub const RING_SLOTS: usize = 0x100;

const OPCODE_MASK: u64 = 0xFF << 56;

/// A contiguous (mod 256) run of slots declared readable by a publish.
///
/// Carries an explicit length so that a full 256-entry batch is not confused
/// with an empty one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRange {
    /// First slot of the batch
    pub start: u8,
    /// Number of slots in the batch (0..=256)
    pub len: u16,
}

impl PublishRange {
    /// Range covering `len` slots from `start`
    pub fn new(start: u8, len: u16) -> Self {
        PublishRange {
            start,
            len: len.min(RING_SLOTS as u16),
        }
    }

    /// Slot one past the last entry
    pub fn end(&self) -> u8 {
        self.start.wrapping_add(self.len as u8)
    }

    /// Whether the batch holds no commands
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot indices in enqueue order
    pub fn slots(&self) -> impl Iterator<Item = u8> {
        let start = self.start;
        (0..self.len).map(move |k| start.wrapping_add(k as u8))
    }
}

/// Outcome of draining one published range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Commands handed to the interpreter
    pub applied: usize,
    /// Commands left unread because interpretation stopped early
    pub skipped: usize,
}

/// Fixed 256-slot storage shared by producer and consumer
#[derive(Debug)]
pub struct CommandRing {
    slots: [AtomicU64; RING_SLOTS],
}

impl CommandRing {
    /// Create an empty ring (every opcode zero)
    pub fn new() -> Self {
        CommandRing {
            slots: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Read a slot without consuming it
    pub fn slot(&self, index: u8) -> AudioCmd {
        AudioCmd::from_bits(self.slots[index as usize].load(Ordering::Acquire))
    }

    fn store(&self, index: u8, cmd: AudioCmd) {
        self.slots[index as usize].store(cmd.to_bits(), Ordering::Release);
    }

    fn clear_opcode(&self, index: u8) {
        self.slots[index as usize].fetch_and(!OPCODE_MASK, Ordering::AcqRel);
    }

    /// Hand every command in `range` to `apply`, in order, zeroing each
    /// slot's opcode once it has been applied.
    ///
    /// `apply` returns [`ControlFlow::Break`] to abandon the rest of the
    /// range; the slot that broke is still consumed, later ones are left as
    /// they are.
    pub fn drain<F>(&self, range: PublishRange, mut apply: F) -> DrainSummary
    where
        F: FnMut(AudioCmd) -> ControlFlow<()>,
    {
        let mut summary = DrainSummary::default();
        for index in range.slots() {
            let flow = apply(self.slot(index));
            self.clear_opcode(index);
            summary.applied += 1;
            if flow.is_break() {
                summary.skipped = range.len as usize - summary.applied;
                break;
            }
        }
        summary
    }
}

impl Default for CommandRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer end of the command ring
pub struct CommandQueue {
    ring: Arc<CommandRing>,
    /// Free-running write cursor
    write_cursor: u8,
    /// Write cursor at the last publish
    published_cursor: u8,
    /// Commands enqueued since the last publish
    pending: u32,
    publish: Mailbox<PublishRange>,
    stats: Arc<Mutex<PortStats>>,
}

impl CommandQueue {
    /// Create a producer over `ring` that publishes into `publish`
    pub fn new(ring: Arc<CommandRing>, publish: Mailbox<PublishRange>, stats: Arc<Mutex<PortStats>>) -> Self {
        CommandQueue {
            ring,
            write_cursor: 0,
            published_cursor: 0,
            pending: 0,
            publish,
            stats,
        }
    }

    /// Write a command at the write cursor and advance it
    pub fn enqueue(&mut self, op: u8, target: u8, arg2: u8, arg3: u8, payload: CmdPayload) {
        self.enqueue_cmd(AudioCmd::new(op, target, arg2, arg3, payload));
    }

    /// Write a prebuilt command at the write cursor and advance it
    pub fn enqueue_cmd(&mut self, cmd: AudioCmd) {
        self.ring.store(self.write_cursor, cmd);
        self.write_cursor = self.write_cursor.wrapping_add(1);
        self.pending = self.pending.saturating_add(1);
    }

    /// Enqueue with a float payload
    pub fn enqueue_f32(&mut self, op: u8, target: u8, arg2: u8, arg3: u8, value: f32) {
        self.enqueue(op, target, arg2, arg3, CmdPayload::from_f32(value));
    }

    /// Enqueue with a signed integer payload
    pub fn enqueue_s32(&mut self, op: u8, target: u8, arg2: u8, arg3: u8, value: i32) {
        self.enqueue(op, target, arg2, arg3, CmdPayload::from_s32(value));
    }

    /// Enqueue with an unsigned integer payload
    pub fn enqueue_u32(&mut self, op: u8, target: u8, arg2: u8, arg3: u8, value: u32) {
        self.enqueue(op, target, arg2, arg3, CmdPayload(value));
    }

    /// Enqueue with a signed byte payload
    pub fn enqueue_s8(&mut self, op: u8, target: u8, arg2: u8, arg3: u8, value: i8) {
        self.enqueue(op, target, arg2, arg3, CmdPayload::from_s8(value));
    }

    /// Declare everything enqueued since the last publish readable.
    ///
    /// The batch covers `(write - published) mod 256` slots from the last
    /// published cursor, or the whole ring when the writer has moved a
    /// nonzero multiple of 256. After an overflow only the entries written
    /// past the old cursor are delivered, still in enqueue order.
    ///
    /// Never blocks. Returns `false` if the publish mailbox was full, in
    /// which case the batch is lost.
    pub fn publish(&mut self) -> bool {
        let depth = self.write_cursor.wrapping_sub(self.published_cursor) as u16;
        let len = if depth == 0 && self.pending > 0 {
            RING_SLOTS as u16
        } else {
            depth
        };
        let range = PublishRange::new(self.published_cursor, len);
        if self.pending > RING_SLOTS as u32 {
            log::debug!(
                target: "audio::cmd",
                "command ring overrun: {} enqueued since last publish, {} delivered",
                self.pending,
                len
            );
        }

        let sent = self.publish.try_send(range);
        {
            let mut stats = self.stats.lock();
            stats.observe_queue_depth((self.pending as usize).min(RING_SLOTS));
            if !sent {
                stats.dropped_publishes += 1;
            }
        }
        if !sent {
            log::warn!(target: "audio::cmd", "publish mailbox full, dropped {} commands", range.len);
        }

        self.published_cursor = self.write_cursor;
        self.pending = 0;
        sent
    }

    /// Current write cursor
    pub fn write_cursor(&self) -> u8 {
        self.write_cursor
    }

    /// Write cursor at the last publish
    pub fn published_cursor(&self) -> u8 {
        self.published_cursor
    }

    /// Commands enqueued since the last publish
    pub fn pending(&self) -> usize {
        self.pending as usize
    }

    /// Shared ring storage
    pub fn ring(&self) -> &Arc<CommandRing> {
        &self.ring
    }
}
