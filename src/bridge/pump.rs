use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::audio::AudioFormat;
use crate::error::GatewayError;
use crate::port::{AudioSession, DevicePort, MediaPort};

/// How a pump ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Source reached a clean end of stream
    Completed,
    /// Token fired; normal termination
    Cancelled,
    Failed(GatewayError),
    /// The pump task panicked
    Panicked,
}

impl PumpOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PumpOutcome::Failed(_) | PumpOutcome::Panicked)
    }
}

/// Doorbell microphone -> browser.
///
/// Every read is raced against the token, so a blocked read on a silent
/// device stream is dropped the moment the call is cancelled.
pub(crate) async fn device_to_client(
    device: Arc<dyn DevicePort>,
    media: Arc<dyn MediaPort>,
    session: AudioSession,
    format: AudioFormat,
    cancel: CancellationToken,
) -> PumpOutcome {
    let mut frames: u64 = 0;

    let outcome = loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpOutcome::Cancelled,
            read = device.read_frame(&session) => read,
        };

        let frame = match read {
            Ok(Some(frame)) if frame.len() >= format.frame_size => frame,
            Ok(Some(partial)) => {
                debug!(
                    "Dropping truncated final frame ({} of {} bytes) on channel {}",
                    partial.len(),
                    format.frame_size,
                    session.channel_id
                );
                break PumpOutcome::Completed;
            }
            Ok(None) => break PumpOutcome::Completed,
            Err(e) => {
                error!("Error reading from device on channel {}: {}", session.channel_id, e);
                break PumpOutcome::Failed(e.into());
            }
        };

        let pieces = split_frames(frame, format.frame_size);
        if pieces.leftover > 0 {
            warn!(
                "Device read on channel {} is not a whole number of frames; dropping {} trailing bytes",
                session.channel_id, pieces.leftover
            );
        }

        let mut failed = None;
        for piece in pieces.frames {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                sent = media.send_frame(piece, format.frame_duration) => Some(sent),
            };
            match sent {
                None => {
                    failed = Some(PumpOutcome::Cancelled);
                    break;
                }
                Some(Err(e)) => {
                    error!("Error sending audio frame to client: {}", e);
                    failed = Some(PumpOutcome::Failed(e.into()));
                    break;
                }
                Some(Ok(())) => {}
            }

            frames += 1;
            if frames % 500 == 0 {
                debug!("Forwarded {} frames from channel {}", frames, session.channel_id);
            }
        }
        if let Some(outcome) = failed {
            break outcome;
        }
    };

    info!(
        "Stopped streaming device to client on channel {} after {} frames ({:?})",
        session.channel_id, frames, outcome
    );
    outcome
}

/// Browser -> doorbell speaker. Each payload is written before the next is read.
pub(crate) async fn client_to_device(
    device: Arc<dyn DevicePort>,
    media: Arc<dyn MediaPort>,
    session: AudioSession,
    cancel: CancellationToken,
) -> PumpOutcome {
    let mut packets: u64 = 0;

    let outcome = loop {
        if cancel.is_cancelled() {
            break PumpOutcome::Cancelled;
        }

        let packet = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpOutcome::Cancelled,
            packet = media.receive_packet() => packet,
        };

        let payload = match packet {
            Ok(Some(payload)) => payload,
            Ok(None) => break PumpOutcome::Completed,
            Err(e) => {
                error!("Error reading packet from client: {}", e);
                break PumpOutcome::Failed(e.into());
            }
        };

        if payload.is_empty() {
            continue;
        }

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpOutcome::Cancelled,
            written = device.write_chunk(&session, payload) => written,
        };

        if let Err(e) = written {
            error!("Error writing audio to device on channel {}: {}", session.channel_id, e);
            break PumpOutcome::Failed(e.into());
        }

        packets += 1;
    };

    info!(
        "Stopped streaming client to device on channel {} after {} packets ({:?})",
        session.channel_id, packets, outcome
    );
    outcome
}

struct SplitFrames {
    frames: Vec<Bytes>,
    leftover: usize,
}

/// Cut a device read into whole codec frames so each one is paced with a
/// single frame duration. Reads are usually exactly one frame.
fn split_frames(read: Bytes, frame_size: usize) -> SplitFrames {
    let whole = read.len() / frame_size;
    SplitFrames {
        frames: (0..whole)
            .map(|i| read.slice(i * frame_size..(i + 1) * frame_size))
            .collect(),
        leftover: read.len() % frame_size,
    }
}
