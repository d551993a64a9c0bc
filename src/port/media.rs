use bytes::Bytes;
use std::time::Duration;

use crate::error::MediaError;

/// Browser side of a call: an outbound audio track and an inbound RTP track
///
/// Transport negotiation happens before the port is handed to the gateway;
/// the bridge only moves payloads.
#[async_trait::async_trait]
pub trait MediaPort: Send + Sync {
    /// Queue one frame on the outbound track; `duration` drives the far side's pacing
    async fn send_frame(&self, frame: Bytes, duration: Duration) -> Result<(), MediaError>;

    /// Next inbound payload. `Ok(None)` once the remote track has ended.
    async fn receive_packet(&self) -> Result<Option<Bytes>, MediaError>;

    /// Tear down the transport. Must be idempotent.
    async fn close(&self);
}
