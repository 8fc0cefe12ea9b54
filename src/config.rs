//! Buffer parameters and port configuration
//!
//! The scheduler sizes every audio-interface buffer from
//! [`AudioBufferParameters`]. [`PortConfig`] wraps those together with the
//! sequencer shape and the DMA wait bound, and can be loaded from JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PortError, Result};

/// Samples kept queued in the audio interface on top of one frame's worth
pub const EXTRA_BUFFERED_AI_SAMPLES_TARGET: i32 = 0x80;

/// Samples rendered beyond the target each frame to absorb drift
pub const SAMPLES_TO_OVERPRODUCE: i32 = 0x10;

/// Hard ceiling on sequence players (one per channel nibble)
pub const MAX_SEQUENCE_PLAYERS: usize = 16;

/// Sizing of the audio-interface buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioBufferParameters {
    /// Samples the scheduler aims to have rendered per audio frame
    pub samples_per_frame_target: i32,
    /// Lower clamp for a computed buffer length
    pub min_ai_buffer_length: i32,
    /// Upper clamp for a computed buffer length
    pub max_ai_buffer_length: i32,
    /// Only every Nth video frame produces an audio frame
    pub frames_per_update: u32,
    /// Extra samples kept queued in the interface
    #[serde(default = "default_extra_buffered")]
    pub extra_buffered_samples: i32,
    /// Samples overproduced each frame
    #[serde(default = "default_overproduce")]
    pub samples_to_overproduce: i32,
}

fn default_extra_buffered() -> i32 {
    EXTRA_BUFFERED_AI_SAMPLES_TARGET
}

fn default_overproduce() -> i32 {
    SAMPLES_TO_OVERPRODUCE
}

impl AudioBufferParameters {
    /// Derive buffer sizes from an output frequency and a video refresh rate.
    ///
    /// The per-frame target is rounded up to a multiple of 16 samples and the
    /// clamps sit 16 samples either side of it.
    pub fn from_frequency(output_hz: u32, refresh_rate: u32) -> Self {
        let per_frame = output_hz / refresh_rate.max(1);
        let target = ((per_frame + 0xF) & !0xF) as i32;
        AudioBufferParameters {
            samples_per_frame_target: target,
            min_ai_buffer_length: target - 0x10,
            max_ai_buffer_length: target + 0x10,
            frames_per_update: 1,
            extra_buffered_samples: EXTRA_BUFFERED_AI_SAMPLES_TARGET,
            samples_to_overproduce: SAMPLES_TO_OVERPRODUCE,
        }
    }

    /// 32 kHz output at 60 Hz
    pub fn ntsc() -> Self {
        Self::from_frequency(32_000, 60)
    }

    /// 32 kHz output at 50 Hz
    pub fn pal() -> Self {
        Self::from_frequency(32_000, 50)
    }

    /// Largest buffer the scheduler may ask for, in stereo sample frames
    pub fn max_buffer_frames(&self) -> usize {
        self.max_ai_buffer_length.max(0) as usize
    }
}

impl Default for AudioBufferParameters {
    fn default() -> Self {
        Self::ntsc()
    }
}

/// Complete port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Audio-interface buffer sizing
    pub buffers: AudioBufferParameters,
    /// Number of sequence players
    #[serde(default = "default_player_count")]
    pub player_count: usize,
    /// Bound on each blocking wait for a sample DMA completion
    #[serde(default = "default_dma_timeout_ms")]
    pub dma_timeout_ms: u64,
}

fn default_player_count() -> usize {
    4
}

fn default_dma_timeout_ms() -> u64 {
    50
}

impl PortConfig {
    /// Parse a configuration from JSON and validate it
    pub fn from_json(text: &str) -> Result<Self> {
        let config: PortConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// DMA completion wait bound as a [`Duration`]
    pub fn dma_timeout(&self) -> Duration {
        Duration::from_millis(self.dma_timeout_ms)
    }

    /// Check the configuration for values the scheduler cannot run with.
    ///
    /// # Errors
    /// Returns [`PortError::ConfigError`] for a zero update divisor, inverted
    /// or non-positive buffer clamps, or a player count outside `1..=16`.
    pub fn validate(&self) -> Result<()> {
        let b = &self.buffers;
        if b.frames_per_update == 0 {
            return Err(PortError::ConfigError("frames_per_update cannot be zero".into()));
        }
        if b.min_ai_buffer_length <= 0 {
            return Err(PortError::ConfigError(format!(
                "min_ai_buffer_length must be positive, got {}",
                b.min_ai_buffer_length
            )));
        }
        if b.min_ai_buffer_length > b.max_ai_buffer_length {
            return Err(PortError::ConfigError(format!(
                "min_ai_buffer_length {} exceeds max_ai_buffer_length {}",
                b.min_ai_buffer_length, b.max_ai_buffer_length
            )));
        }
        if self.player_count == 0 || self.player_count > MAX_SEQUENCE_PLAYERS {
            return Err(PortError::ConfigError(format!(
                "player_count {} outside 1..={}",
                self.player_count, MAX_SEQUENCE_PLAYERS
            )));
        }
        Ok(())
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        PortConfig {
            buffers: AudioBufferParameters::default(),
            player_count: default_player_count(),
            dma_timeout_ms: default_dma_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntsc_parameters() {
        let params = AudioBufferParameters::ntsc();
        // 32000 / 60 = 533, aligned up to 544
        assert_eq!(params.samples_per_frame_target, 544);
        assert_eq!(params.min_ai_buffer_length, 528);
        assert_eq!(params.max_ai_buffer_length, 560);
    }

    #[test]
    fn test_pal_parameters() {
        let params = AudioBufferParameters::pal();
        assert_eq!(params.samples_per_frame_target, 640);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(PortConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let mut config = PortConfig::default();
        config.buffers.frames_per_update = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("frames_per_update"));
    }

    #[test]
    fn test_inverted_clamps_rejected() {
        let mut config = PortConfig::default();
        config.buffers.min_ai_buffer_length = 2048;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_player_count_bounds() {
        let mut config = PortConfig::default();
        config.player_count = 0;
        assert!(config.validate().is_err());
        config.player_count = 17;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let json = r#"{
            "buffers": {
                "samples_per_frame_target": 544,
                "min_ai_buffer_length": 128,
                "max_ai_buffer_length": 1024,
                "frames_per_update": 2
            }
        }"#;
        let config = PortConfig::from_json(json).unwrap();
        assert_eq!(config.player_count, 4);
        assert_eq!(config.dma_timeout_ms, 50);
        assert_eq!(config.buffers.extra_buffered_samples, 0x80);
        assert_eq!(config.buffers.frames_per_update, 2);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            PortConfig::from_json("{ nope"),
            Err(PortError::Serialization(_))
        ));
    }
}
