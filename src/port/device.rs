use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// A two-way-audio channel as the device reports it right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    /// `true` when the device has the channel open (its "enabled" flag)
    pub in_use: bool,
}

impl ChannelInfo {
    pub fn new(id: impl Into<String>, in_use: bool) -> Self {
        Self {
            id: id.into(),
            in_use,
        }
    }
}

/// An exclusive claim on one channel, valid until released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSession {
    pub channel_id: String,
    /// Token some firmwares hand back on open and expect on audio requests
    pub session_token: Option<String>,
}

impl AudioSession {
    pub fn new(channel_id: impl Into<String>, session_token: Option<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            session_token,
        }
    }
}

/// Doorbell two-way-audio API
///
/// Implementations wrap the device's HTTP interface:
/// - channel discovery, open and close are plain request/response calls
/// - `read_frame` pulls from the long-lived chunked audio download
/// - `write_chunk` pushes one upload request body
///
/// Callers race every call against a cancellation token and drop the future
/// on cancel, so implementations must tolerate being dropped mid-call.
#[async_trait::async_trait]
pub trait DevicePort: Send + Sync {
    /// Live channel list in device order
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, DeviceError>;

    async fn open_channel(&self, channel_id: &str) -> Result<AudioSession, DeviceError>;

    /// Close a channel. Closing an already-closed channel succeeds.
    async fn close_channel(&self, channel_id: &str) -> Result<(), DeviceError>;

    /// Next fixed-size codec frame from the device microphone.
    ///
    /// `Ok(None)` is a clean end of stream. Use
    /// [`FrameAssembler`](crate::audio::FrameAssembler) to cut the chunked
    /// body into frames.
    async fn read_frame(&self, session: &AudioSession) -> Result<Option<Bytes>, DeviceError>;

    /// Send audio to the device speaker. Oversized writes are rejected by the device.
    async fn write_chunk(&self, session: &AudioSession, chunk: Bytes) -> Result<(), DeviceError>;
}
