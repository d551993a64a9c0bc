use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audio::{plan_chunks, AudioFormat};
use crate::error::{GatewayError, Result};
use crate::port::AudioSession;
use crate::session::SessionManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub channel_id: String,
    pub bytes: usize,
    pub writes: usize,
    /// Time waited for the device to finish emitting the clip
    pub playback: Duration,
}

/// One-shot upload of a pre-recorded clip to the doorbell speaker
#[derive(Clone)]
pub struct FilePlayer {
    sessions: Arc<SessionManager>,
    format: AudioFormat,
    chunk_size: usize,
}

impl FilePlayer {
    pub fn new(sessions: Arc<SessionManager>, format: AudioFormat, chunk_size: usize) -> Self {
        Self {
            sessions,
            format,
            chunk_size,
        }
    }

    /// Acquire a channel, send `payload` in chunks, wait for the device to
    /// play it out, release the channel.
    ///
    /// Cancellation is checked between chunks and during the final wait; a
    /// write already in flight runs to completion. The work runs on its own
    /// task, so dropping the returned future never leaves a channel open.
    pub async fn play(&self, payload: Bytes, cancel: &CancellationToken) -> Result<PlaybackReport> {
        let player = self.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { player.run(payload, &cancel).await })
            .await
            .map_err(|e| {
                error!("Playback task failed: {}", e);
                GatewayError::Task(e.to_string())
            })?
    }

    /// Acquire-to-release body of `play`, for callers that already own a task
    pub(crate) async fn run(&self, payload: Bytes, cancel: &CancellationToken) -> Result<PlaybackReport> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        info!("Playing {} bytes of audio", payload.len());
        let session = self.sessions.acquire_channel().await?;

        let result = self.send(&session, payload, cancel).await;

        if let Err(e) = self.sessions.release_channel(&session.channel_id).await {
            warn!("Failed to close channel {} after playback: {}", session.channel_id, e);
        }

        match &result {
            Ok(_) => info!("Playback complete on channel {}", session.channel_id),
            Err(GatewayError::Cancelled) => info!("Playback cancelled on channel {}", session.channel_id),
            Err(e) => warn!("Playback failed on channel {}: {}", session.channel_id, e),
        }
        result
    }

    async fn send(
        &self,
        session: &AudioSession,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<PlaybackReport> {
        let device = self.sessions.device();
        let chunks = plan_chunks(payload.len(), self.chunk_size, self.format.frame_size);
        info!("Sending {} chunks to channel {}", chunks.len(), session.channel_id);

        for range in &chunks {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            device.write_chunk(session, payload.slice(range.clone())).await?;
        }

        let playback = self.format.playback_duration(payload.len());
        info!("Waiting {:.2} seconds for playback to complete", playback.as_secs_f64());

        tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            _ = tokio::time::sleep(playback) => {}
        }

        Ok(PlaybackReport {
            channel_id: session.channel_id.clone(),
            bytes: payload.len(),
            writes: chunks.len(),
            playback,
        })
    }
}
