use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub audio: AudioConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Bytes per codec sample block sent to the browser as one frame
    pub frame_size: usize,
    /// Playback duration of one frame
    pub frame_duration_ms: u64,
    /// Codec byte rate (G.711 is 8000 bytes/sec)
    pub byte_rate: u32,
    /// Largest write accepted by the device in one request
    pub chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_size: 160,        // 20ms of G.711
            frame_duration_ms: 20,
            byte_rate: 8000,
            chunk_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Deadline for tracked tasks to finish once shutdown is requested
    pub deadline_secs: u64,
    /// How long an abort waits for cancelled operations before forcing channels closed
    pub drain_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 5,
            drain_ms: 250,
        }
    }
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }
}

impl GatewayConfig {
    /// Load from a config file, with `GATEWAY__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid gateway configuration")
    }
}
