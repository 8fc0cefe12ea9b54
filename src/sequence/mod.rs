//! Sequence players and channels
//!
//! The audio thread owns a small fixed set of [`SequencePlayer`]s, each
//! owning up to 16 [`SequenceChannel`]s. Commands drained from the ring mutate
//! them through the interpreter in [`interpreter`]; the renderer (outside this
//! crate) reads the results and clears the per-channel change bits.

pub mod interpreter;

use bitflags::bitflags;

pub use interpreter::{Dispatch, SequenceHost};

/// Channels per sequence player
pub const CHANNELS_PER_PLAYER: usize = 16;

/// Script I/O bytes per channel
pub const SCRIPT_IO_SLOTS: usize = 8;

/// Variation bytes per player
pub const VARIATION_SLOTS: usize = 8;

/// Tempo ticks per beat
pub const TATUMS_PER_BEAT: i32 = 48;

/// Playback state of a sequence player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Not playing
    #[default]
    Stopped,
    /// Ramping volume up from zero
    FadingIn,
    /// Ramping volume down to zero
    FadingOut,
    /// Playing at its fade volume
    Playing,
}

bitflags! {
    /// Channel fields touched since the renderer last looked
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelChanges: u8 {
        /// Volume or volume scale changed
        const VOLUME = 0x80;
        /// Pan changed
        const PAN = 0x40;
        /// Frequency scale changed
        const FREQ_SCALE = 0x20;
    }
}

/// One voice slot owned by a sequence player
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceChannel {
    /// Channel volume
    pub volume: f32,
    /// Multiplier applied on top of `volume`
    pub volume_scale: f32,
    /// Pan position (0 = left, 64 = centre, 127 = right)
    pub pan: u8,
    /// Pitch multiplier
    pub freq_scale: f32,
    /// Reverb send level
    pub reverb_volume: u8,
    /// Bytes readable by the channel's sequence script
    pub script_io: [i8; SCRIPT_IO_SLOTS],
    /// Script-visible stop flag
    pub stop_flag: i8,
    /// Dirty bits for the renderer
    pub changes: ChannelChanges,
}

impl SequenceChannel {
    /// Create a channel at unity volume, centred
    pub fn new() -> Self {
        SequenceChannel {
            volume: 1.0,
            volume_scale: 1.0,
            pan: 0x40,
            freq_scale: 1.0,
            reverb_volume: 0,
            script_io: [-1; SCRIPT_IO_SLOTS],
            stop_flag: 0,
            changes: ChannelChanges::empty(),
        }
    }

    /// Take and clear the pending change bits
    pub fn take_changes(&mut self) -> ChannelChanges {
        std::mem::take(&mut self.changes)
    }
}

impl Default for SequenceChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A virtual music-sequence playback slot
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePlayer {
    /// Whether a sequence is loaded and running
    pub enabled: bool,
    /// Muted by a global mute command
    pub muted: bool,
    /// Volume needs recomputing before the next render
    pub recalculate_volume: bool,
    /// Fade state
    pub state: PlayerState,
    /// Current fade volume
    pub fade_volume: f32,
    /// Scale applied on top of the fade volume
    pub fade_volume_scale: f32,
    /// Per-frame fade volume delta
    pub fade_velocity: f32,
    /// Frames left in the current fade
    pub fade_remaining_frames: i32,
    /// Length of the current fade-in
    pub fade_timer: i32,
    /// Tempo in ticks per minute
    pub tempo: u16,
    /// Transposition in semitones
    pub transposition: i16,
    /// Sequence variation bytes
    pub variation: [i8; VARIATION_SLOTS],
    /// Owned channels; `None` marks an absent channel
    pub channels: Vec<Option<SequenceChannel>>,
}

impl SequencePlayer {
    /// Create a disabled player with every channel present
    pub fn new() -> Self {
        SequencePlayer {
            enabled: false,
            muted: false,
            recalculate_volume: false,
            state: PlayerState::Stopped,
            fade_volume: 1.0,
            fade_volume_scale: 1.0,
            fade_velocity: 0.0,
            fade_remaining_frames: 0,
            fade_timer: 0,
            tempo: 120 * TATUMS_PER_BEAT as u16,
            transposition: 0,
            variation: [-1; VARIATION_SLOTS],
            channels: (0..CHANNELS_PER_PLAYER).map(|_| Some(SequenceChannel::new())).collect(),
        }
    }

    /// Channel at `index` if it exists
    pub fn channel(&self, index: usize) -> Option<&SequenceChannel> {
        self.channels.get(index).and_then(Option::as_ref)
    }

    /// Mutable channel at `index` if it exists
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut SequenceChannel> {
        self.channels.get_mut(index).and_then(Option::as_mut)
    }

    /// Stop playback and drop the fade
    pub fn disable(&mut self) {
        self.enabled = false;
        self.state = PlayerState::Stopped;
        self.fade_velocity = 0.0;
        self.fade_remaining_frames = 0;
    }
}

impl Default for SequencePlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the command interpreter mutates
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerState {
    /// The fixed set of sequence players
    pub players: Vec<SequencePlayer>,
    /// Audio library sound mode (stereo, headphones, mono...)
    pub sound_mode: i32,
}

impl SequencerState {
    /// Create `player_count` disabled players
    pub fn new(player_count: usize) -> Self {
        SequencerState {
            players: (0..player_count).map(|_| SequencePlayer::new()).collect(),
            sound_mode: 0,
        }
    }

    /// Number of players
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Player at `index`
    pub fn player(&self, index: usize) -> Option<&SequencePlayer> {
        self.players.get(index)
    }

    /// Mutable player at `index`
    pub fn player_mut(&mut self, index: usize) -> Option<&mut SequencePlayer> {
        self.players.get_mut(index)
    }
}

impl Default for SequencerState {
    fn default() -> Self {
        Self::new(4)
    }
}
