//! Audio output configuration

/// Fixed output format shared by the decoder and the audio backend
///
/// Samples are always interleaved `f32`. The struct is `Copy` and exposes
/// no setters for the format itself; only the buffer hint may be tuned at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    channels: u16,
    sample_rate: u32,
    buffer_frames: u32,
}

impl AudioConfig {
    /// Stereo, 44.1 kHz, 2048-frame buffer hint
    pub const STANDARD: Self = Self {
        channels: 2,
        sample_rate: 44_100,
        buffer_frames: 2048,
    };

    /// Same format with a different device buffer hint
    #[must_use]
    pub const fn with_buffer_frames(self, buffer_frames: u32) -> Self {
        Self {
            buffer_frames,
            ..self
        }
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device buffer size hint, in frames
    pub const fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    /// Interleaved samples in `frames` frames
    pub const fn samples_for_frames(&self, frames: usize) -> usize {
        frames * self.channels as usize
    }

    /// Elapsed milliseconds represented by `frames` frames
    pub const fn frames_to_ms(&self, frames: u64) -> u64 {
        frames * 1000 / self.sample_rate as u64
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}
