use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use super::pump::{self, PumpOutcome};
use crate::audio::AudioFormat;
use crate::error::{DeviceError, Result};
use crate::port::{AudioSession, DevicePort, MediaPort};

/// Lifecycle of one bridged call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Starting,
    Streaming,
    Stopping,
}

/// How each direction of a call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    pub channel_id: String,
    pub device_to_client: PumpOutcome,
    pub client_to_device: PumpOutcome,
}

enum Pumps {
    Running {
        device_to_client: JoinHandle<PumpOutcome>,
        client_to_device: JoinHandle<PumpOutcome>,
    },
    Stopped(BridgeReport),
}

/// Two independent pumps moving audio between a device channel and a browser
///
/// The pumps share a parent token but each runs under its own child token:
/// one pump ending, cleanly or not, leaves the other running. `stop` cancels
/// the parent, closes the media port and joins both. Dropping an unstopped
/// bridge cancels the pumps and closes the media port in the background.
pub struct AudioBridge {
    session: AudioSession,
    media: Arc<dyn MediaPort>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    state: watch::Sender<BridgeState>,
    pumps: Mutex<Pumps>,
}

impl AudioBridge {
    /// Validate the session against the device and start both pumps.
    ///
    /// `parent` is the owning operation's token; cancelling it stops the
    /// pumps directly, without waiting for anyone to call `stop`.
    pub async fn start(
        session: AudioSession,
        device: Arc<dyn DevicePort>,
        media: Arc<dyn MediaPort>,
        format: AudioFormat,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let (state, _) = watch::channel(BridgeState::Starting);

        Self::validate(&session, device.as_ref()).await?;

        let cancel = parent.child_token();
        let tracker = TaskTracker::new();

        let device_to_client = tracker.spawn(pump::device_to_client(
            Arc::clone(&device),
            Arc::clone(&media),
            session.clone(),
            format,
            cancel.child_token(),
        ));
        let client_to_device = tracker.spawn(pump::client_to_device(
            device,
            Arc::clone(&media),
            session.clone(),
            cancel.child_token(),
        ));
        tracker.close();

        state.send_replace(BridgeState::Streaming);
        info!("Started audio streaming session on channel {}", session.channel_id);

        Ok(Self {
            session,
            media,
            cancel,
            tracker,
            state,
            pumps: Mutex::new(Pumps::Running {
                device_to_client,
                client_to_device,
            }),
        })
    }

    /// The channel must exist and be open before we stream on it
    async fn validate(session: &AudioSession, device: &dyn DevicePort) -> Result<()> {
        let channels = device.list_channels().await?;
        match channels.iter().find(|ch| ch.id == session.channel_id) {
            Some(ch) if ch.in_use => Ok(()),
            Some(_) => Err(DeviceError::Protocol(format!(
                "channel {} is not open",
                session.channel_id
            ))
            .into()),
            None => Err(DeviceError::UnknownChannel(session.channel_id.clone()).into()),
        }
    }

    pub fn session(&self) -> &AudioSession {
        &self.session
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Resolves once both pumps have ended on their own or been stopped
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Cancel and join both pumps. Safe to call repeatedly and from any task;
    /// every call returns the same report.
    pub async fn stop(&self) -> BridgeReport {
        let mut pumps = self.pumps.lock().await;

        let (device_to_client, client_to_device) = match &mut *pumps {
            Pumps::Stopped(report) => return report.clone(),
            Pumps::Running {
                device_to_client,
                client_to_device,
            } => (device_to_client, client_to_device),
        };

        self.state.send_replace(BridgeState::Stopping);
        self.cancel.cancel();
        self.media.close().await;

        let report = BridgeReport {
            channel_id: self.session.channel_id.clone(),
            device_to_client: join_pump("device-to-client", device_to_client).await,
            client_to_device: join_pump("client-to-device", client_to_device).await,
        };

        if report.device_to_client.is_failure() || report.client_to_device.is_failure() {
            warn!("Audio session on channel {} ended with errors: {:?}", report.channel_id, report);
        }
        info!("Stopped audio streaming session on channel {}", self.session.channel_id);

        *pumps = Pumps::Stopped(report.clone());
        self.state.send_replace(BridgeState::Idle);
        report
    }
}

async fn join_pump(name: &str, handle: &mut JoinHandle<PumpOutcome>) -> PumpOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{} pump panicked: {}", name, e);
            PumpOutcome::Panicked
        }
    }
}

impl Drop for AudioBridge {
    /// Dropping a bridge without `stop` still ends both pumps and closes the
    /// media port from a detached task.
    fn drop(&mut self) {
        self.cancel.cancel();

        if matches!(self.pumps.get_mut(), Pumps::Stopped(_)) {
            return;
        }
        let media = Arc::clone(&self.media);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { media.close().await });
            }
            Err(_) => warn!(
                "Audio bridge on channel {} dropped outside a runtime; media port left open",
                self.session.channel_id
            ),
        }
    }
}
