//! Audio-interface output buffers
//!
//! Three interleaved-stereo buffers rotate through the interface: one is
//! playing, one is queued behind it and one is being rendered. Each length is
//! recomputed from how much audio is still queued when its turn comes.

use crate::config::AudioBufferParameters;

/// Number of rotating output buffers
pub const AI_BUFFER_COUNT: usize = 3;

/// Next buffer length in sample frames for `remaining` frames still queued.
///
/// `((target - remaining + extra) & !0xF) + overproduce`, clamped to the
/// configured minimum and maximum. The arithmetic is signed, so a backlog
/// larger than the target clamps to the minimum.
pub fn next_buffer_length(params: &AudioBufferParameters, remaining: i32) -> i32 {
    let aligned = (params.samples_per_frame_target - remaining + params.extra_buffered_samples) & !0xF;
    let length = aligned + params.samples_to_overproduce;
    length.max(params.min_ai_buffer_length).min(params.max_ai_buffer_length)
}

/// The rotating output buffers and their current lengths
#[derive(Debug, Clone)]
pub struct AiBuffers {
    samples: [Vec<i16>; AI_BUFFER_COUNT],
    lengths: [i32; AI_BUFFER_COUNT],
    index: usize,
}

impl AiBuffers {
    /// Allocate buffers large enough for `max_frames` stereo sample frames
    pub fn new(max_frames: usize) -> Self {
        AiBuffers {
            samples: std::array::from_fn(|_| vec![0; max_frames * 2]),
            lengths: [0; AI_BUFFER_COUNT],
            index: 0,
        }
    }

    /// Move to the next buffer and return the index queued behind it
    pub fn rotate(&mut self) -> usize {
        self.index = (self.index + 1) % AI_BUFFER_COUNT;
        (self.index + 1) % AI_BUFFER_COUNT
    }

    /// Buffer currently being rendered
    pub fn current(&self) -> usize {
        self.index
    }

    /// Recorded length of buffer `index`
    pub fn length(&self, index: usize) -> i32 {
        self.lengths[index % AI_BUFFER_COUNT]
    }

    /// All recorded lengths
    pub fn lengths(&self) -> [i32; AI_BUFFER_COUNT] {
        self.lengths
    }

    /// Record the length of buffer `index`
    pub fn set_length(&mut self, index: usize, length: i32) {
        self.lengths[index % AI_BUFFER_COUNT] = length;
    }

    /// Rendered samples of buffer `index` (two per sample frame)
    pub fn samples(&self, index: usize) -> &[i16] {
        let buf = &self.samples[index % AI_BUFFER_COUNT];
        let len = (self.length(index).max(0) as usize * 2).min(buf.len());
        &buf[..len]
    }

    /// Raw sample at `pos` in buffer `index`, ignoring its recorded length
    pub fn sample_at(&self, index: usize, pos: usize) -> i16 {
        self.samples[index % AI_BUFFER_COUNT].get(pos).copied().unwrap_or(0)
    }

    /// Whole backing storage of buffer `index`
    pub fn storage_mut(&mut self, index: usize) -> &mut [i16] {
        &mut self.samples[index % AI_BUFFER_COUNT]
    }
}
