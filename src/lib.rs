//! Real-time subsystems for a console racing game port
//!
//! This crate carries the parts of the game that run on a hard per-frame
//! budget and talk to hardware-like collaborators through tiny mailboxes:
//!
//! - a 256-slot command ring that carries sequence/channel commands from the
//!   game thread to the audio thread,
//! - the command interpreter that applies those commands to sequence players
//!   and their channels,
//! - the audio frame scheduler that paces one synthesis task per audio
//!   frame, reconciles sample DMA completions and suspends itself while an
//!   audio reset is in flight,
//! - the controller-pak read protocol (CRC-checked serial transfers), and
//! - the run-length encoded input log behind replays and ghosts.
//!
//! # Quick start
//! ```no_run
//! use kartport::command::op;
//! use kartport::scheduler::SilentBackend;
//! use kartport::{audio_port, PortConfig};
//!
//! let (mut game, mut audio) = audio_port(PortConfig::default(), SilentBackend::new()).unwrap();
//! game.queue.enqueue_f32(op::CHANNEL_VOLUME, 0, 3, 0, 0.5);
//! game.queue.publish();
//! if let Some(task) = audio.tick() {
//!     let _acmds = audio.task_commands(&task);
//! }
//! ```

#![warn(missing_docs)]

pub mod command; // Command Ring
pub mod config; // Buffer Parameters & Port Configuration
pub mod mailbox; // Inter-thread Mailboxes
pub mod pak; // Controller Pak Reads
pub mod replay; // Input Replays & Ghosts
pub mod reset; // Audio Reset Sub-state-machine
pub mod scheduler; // Audio Frame Scheduler
pub mod sequence; // Sequence Players & Command Interpreter
pub mod stats; // Diagnostics

use std::sync::Arc;

use parking_lot::Mutex;

/// Error types for port operations
#[derive(thiserror::Error, Debug)]
pub enum PortError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Error while (de)serializing configuration or replay data
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Controller pak transfer failure
    #[error("Controller pak error: {0}")]
    Pak(#[from] pak::PakError),

    /// Malformed replay data
    #[error("Replay error: {0}")]
    ReplayError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for PortError {
    fn from(msg: String) -> Self {
        PortError::Other(msg)
    }
}

impl From<&str> for PortError {
    fn from(msg: &str) -> Self {
        PortError::Other(msg.to_string())
    }
}

/// Result type for port operations
pub type Result<T> = std::result::Result<T, PortError>;

// Public API exports
pub use command::{AudioCmd, CmdPayload, CommandQueue, CommandRing, PublishRange};
pub use config::{AudioBufferParameters, PortConfig};
pub use mailbox::Mailbox;
pub use pak::{read_pak, PakError, SerialBus};
pub use replay::{ReplayLog, ReplayPlayback, ReplayRecord, ReplayRecorder};
pub use reset::{PhasedReset, ResetHandle, ResetStatus, ResetStep};
pub use scheduler::{AudioTask, FrameScheduler, FrameWaiter, PortBackend};
pub use sequence::{SequenceChannel, SequencePlayer, SequencerState};
pub use stats::PortStats;

/// Game-thread side of an audio port.
///
/// Everything the game logic needs to drive audio: the command queue, the
/// reset requester and the frame-count waiter. The audio-thread side is the
/// [`FrameScheduler`] returned alongside it by [`audio_port`].
pub struct GamePort {
    /// Producer end of the command ring
    pub queue: CommandQueue,
    /// Reset requester / acknowledgment receiver
    pub reset: ResetHandle,
    /// Frame-count notifications from the audio thread
    pub frames: FrameWaiter,
    stats: Arc<Mutex<PortStats>>,
}

impl GamePort {
    /// Snapshot of the shared diagnostics
    pub fn stats(&self) -> PortStats {
        self.stats.lock().clone()
    }
}

/// Build a connected producer/consumer pair.
///
/// The two halves share nothing but the command ring, the four mailboxes and
/// the diagnostics block, so each can be moved to its own thread.
///
/// # Errors
/// Returns [`PortError::ConfigError`] if `config` fails validation.
pub fn audio_port<B: PortBackend>(config: PortConfig, backend: B) -> Result<(GamePort, FrameScheduler<B>)> {
    config.validate()?;

    let stats = Arc::new(Mutex::new(PortStats::default()));
    let channels = mailbox::PortMailboxes::new();
    let ring = Arc::new(CommandRing::new());

    let queue = CommandQueue::new(Arc::clone(&ring), channels.publish.clone(), Arc::clone(&stats));
    let reset = ResetHandle::new(channels.reset_request.clone(), channels.reset_ack.clone());
    let frames = FrameWaiter::new(channels.frame.clone());

    let scheduler = FrameScheduler::new(config, backend, ring, channels, Arc::clone(&stats));

    Ok((
        GamePort {
            queue,
            reset,
            frames,
            stats,
        },
        scheduler,
    ))
}
