//! Audio command records
//!
//! Game logic talks to the audio thread exclusively through 8-byte command
//! records written into a 256-slot ring ([`CommandRing`]). The first word
//! carries `op`, `target` (sequence player), and two sub-arguments; the second
//! word is a 32-bit payload that each opcode reinterprets as a float, a
//! signed integer, an unsigned integer, or a signed byte.

pub mod queue;

pub use queue::{CommandQueue, CommandRing, PublishRange, RING_SLOTS};

/// Opcode constants
pub mod op {
    /// Preload a sequence into the cache
    pub const PRELOAD_SEQUENCE: u8 = 0x81;
    /// Load a sequence on a player and fade it in
    pub const LOAD_SEQUENCE: u8 = 0x82;
    /// Stop a player (payload 0) or fade it out over `payload` frames
    pub const STOP_SEQUENCE: u8 = 0x83;
    /// Alternate encoding of [`LOAD_SEQUENCE`]
    pub const LOAD_SEQUENCE_ALT: u8 = 0x88;

    /// Player fade-volume scale (f32)
    pub const PLAYER_FADE_VOLUME_SCALE: u8 = 0x41;
    /// Player variation byte at index `arg3` (s8)
    pub const PLAYER_VARIATION: u8 = 0x46;
    /// Player tempo in beats per minute (s32)
    pub const PLAYER_TEMPO: u8 = 0x47;
    /// Player transposition in semitones (s8)
    pub const PLAYER_TRANSPOSITION: u8 = 0x48;

    /// Channel volume scale (f32)
    pub const CHANNEL_VOLUME_SCALE: u8 = 0x01;
    /// Channel volume (f32)
    pub const CHANNEL_VOLUME: u8 = 0x02;
    /// Channel pan (s8)
    pub const CHANNEL_PAN: u8 = 0x03;
    /// Channel frequency scale (f32)
    pub const CHANNEL_FREQ_SCALE: u8 = 0x04;
    /// Channel reverb volume (s8)
    pub const CHANNEL_REVERB_VOLUME: u8 = 0x05;
    /// Channel script I/O byte at index `arg3` (s8)
    pub const CHANNEL_SCRIPT_IO: u8 = 0x06;
    /// Channel stop flag (s8)
    pub const CHANNEL_STOP: u8 = 0x08;

    /// Audio library sound mode (s32)
    pub const SOUND_MODE: u8 = 0xF0;
    /// Mute every player
    pub const MUTE_ALL: u8 = 0xF1;
    /// Unmute every player
    pub const UNMUTE_ALL: u8 = 0xF2;
    /// Host-defined triggered action on `(target, arg2, arg3)`
    pub const TRIGGER_ACTION: u8 = 0xF3;
}

/// Pack the first command word: `op << 24 | target << 16 | arg2 << 8 | arg3`
pub const fn cmd_id(op: u8, target: u8, arg2: u8, arg3: u8) -> u32 {
    (op as u32) << 24 | (target as u32) << 16 | (arg2 as u32) << 8 | arg3 as u32
}

/// Raw 32-bit command payload with per-type views
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CmdPayload(pub u32);

impl CmdPayload {
    /// Payload holding a float
    pub fn from_f32(value: f32) -> Self {
        CmdPayload(value.to_bits())
    }

    /// Payload holding a signed integer
    pub fn from_s32(value: i32) -> Self {
        CmdPayload(value as u32)
    }

    /// Payload holding a signed byte in its top 8 bits
    pub fn from_s8(value: i8) -> Self {
        CmdPayload(((value as u8) as u32) << 24)
    }

    /// View as a float
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }

    /// View as a signed integer
    pub fn as_s32(self) -> i32 {
        self.0 as i32
    }

    /// View as an unsigned integer
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// View the leading (most significant) byte as signed
    pub fn as_s8(self) -> i8 {
        (self.0 >> 24) as u8 as i8
    }
}

/// One command record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioCmd {
    /// Opcode; zero marks a consumed slot
    pub op: u8,
    /// Sequence player index
    pub target: u8,
    /// First sub-argument (channel index for channel ops)
    pub arg2: u8,
    /// Second sub-argument
    pub arg3: u8,
    /// Opcode-specific payload
    pub payload: CmdPayload,
}

impl AudioCmd {
    /// Build a command from its fields
    pub fn new(op: u8, target: u8, arg2: u8, arg3: u8, payload: CmdPayload) -> Self {
        AudioCmd {
            op,
            target,
            arg2,
            arg3,
            payload,
        }
    }

    /// Build a command from a packed first word (see [`cmd_id`])
    pub fn from_id(id: u32, payload: CmdPayload) -> Self {
        let [op, target, arg2, arg3] = id.to_be_bytes();
        AudioCmd::new(op, target, arg2, arg3, payload)
    }

    /// Packed first word
    pub fn id(&self) -> u32 {
        cmd_id(self.op, self.target, self.arg2, self.arg3)
    }

    /// Pack into a single 64-bit slot image
    pub fn to_bits(&self) -> u64 {
        (self.id() as u64) << 32 | self.payload.0 as u64
    }

    /// Unpack a 64-bit slot image
    pub fn from_bits(bits: u64) -> Self {
        AudioCmd::from_id((bits >> 32) as u32, CmdPayload(bits as u32))
    }

    /// Whether the opcode belongs to the global `0xF*` group
    pub fn is_global(&self) -> bool {
        self.op & 0xF0 == 0xF0
    }
}
