use std::time::Duration;

use crate::config::AudioConfig;

/// Fixed codec parameters shared by the bridge and playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Bytes per codec sample block
    pub frame_size: usize,
    /// Playback duration of one frame, used by the far side for pacing
    pub frame_duration: Duration,
    /// Bytes per second of audio
    pub byte_rate: u32,
}

impl AudioFormat {
    /// G.711 at 8kHz, 20ms frames
    pub const G711: AudioFormat = AudioFormat {
        frame_size: 160,
        frame_duration: Duration::from_millis(20),
        byte_rate: 8000,
    };

    /// How long the device needs to emit `len` bytes of audio
    pub fn playback_duration(&self, len: usize) -> Duration {
        if self.byte_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = len as u128 * 1_000_000_000 / self.byte_rate as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::G711
    }
}

impl From<&AudioConfig> for AudioFormat {
    fn from(cfg: &AudioConfig) -> Self {
        Self {
            frame_size: cfg.frame_size,
            frame_duration: Duration::from_millis(cfg.frame_duration_ms),
            byte_rate: cfg.byte_rate,
        }
    }
}
