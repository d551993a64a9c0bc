use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::call::CallHandle;
use crate::abort::{AbortCoordinator, AbortReport, OperationKind};
use crate::audio::AudioFormat;
use crate::bridge::{AudioBridge, BridgeReport, FilePlayer, PlaybackReport};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::port::{ChannelInfo, DevicePort, MediaPort};
use crate::session::SessionManager;

/// The doorbell gateway: owns channel bookkeeping, the abort registry and
/// every call and playback task for the lifetime of the process.
pub struct Gateway {
    config: GatewayConfig,
    format: AudioFormat,
    sessions: Arc<SessionManager>,
    aborts: Arc<AbortCoordinator>,
    player: FilePlayer,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl Gateway {
    /// Build the gateway and close any channel a previous run left open
    pub async fn start(config: GatewayConfig, device: Arc<dyn DevicePort>) -> Result<Self> {
        let format = AudioFormat::from(&config.audio);
        let sessions = Arc::new(SessionManager::new(device));
        let aborts = Arc::new(AbortCoordinator::new(
            Arc::clone(&sessions),
            config.shutdown.drain(),
        ));
        let player = FilePlayer::new(Arc::clone(&sessions), format, config.audio.chunk_size);

        info!("Testing connection to doorbell device...");
        let reset = sessions.reset_channels().await.map_err(|e| {
            error!("Cannot re-initialize doorbell device: {}", e);
            e
        })?;
        if reset > 0 {
            info!("Closed {} channels left open by a previous run", reset);
        }

        Ok(Self {
            config,
            format,
            sessions,
            aborts,
            player,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn aborts(&self) -> &Arc<AbortCoordinator> {
        &self.aborts
    }

    /// Bridge a browser media transport to a free doorbell channel.
    ///
    /// Fails with `NoAvailableChannels` when every channel is busy. The
    /// media port is closed on every failure path. Setup runs on the call's
    /// supervisor task; if the caller goes away before the call is up, the
    /// supervisor tears it down again.
    pub async fn start_call(&self, media: Arc<dyn MediaPort>) -> Result<CallHandle> {
        if self.shutdown.is_cancelled() {
            media.close().await;
            return Err(GatewayError::Cancelled);
        }

        let cancel = self.shutdown.child_token();
        let (ready_tx, ready_rx) = oneshot::channel();
        let supervisor = self.tasks.spawn(supervise_call(
            Arc::clone(&self.sessions),
            Arc::clone(&self.aborts),
            self.format,
            media,
            cancel.clone(),
            ready_tx,
        ));

        let (id, channel_id) = match ready_rx.await {
            Ok(started) => started?,
            Err(_) => {
                let reason = match supervisor.await {
                    Err(e) => e.to_string(),
                    Ok(_) => "call ended before reporting setup".to_string(),
                };
                error!("Call setup failed: {}", reason);
                return Err(GatewayError::Task(reason));
            }
        };

        Ok(CallHandle {
            id,
            channel_id,
            cancel,
            supervisor,
        })
    }

    /// Play a clip on the doorbell speaker.
    ///
    /// Any playback already in flight is aborted first; live calls are left
    /// alone. Dropping the returned future cancels the playback, and the
    /// channel is still released by the playback task.
    pub async fn play_file(&self, payload: Bytes) -> Result<PlaybackReport> {
        if self.shutdown.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let reset = self.aborts.abort_by_kind(OperationKind::PlayFile).await;
        if reset > 0 {
            info!("Aborted {} playback(s) in progress", reset);
        }

        let cancel = self.shutdown.child_token();
        let op = self.aborts.register(OperationKind::PlayFile, cancel.clone()).await;
        let _abandon = cancel.drop_guard();

        let player = self.player.clone();
        let aborts = Arc::clone(&self.aborts);
        let playback = self.tasks.spawn(async move {
            let result = player.run(payload, op.token()).await;
            aborts.unregister(&op).await;
            result
        });

        playback.await.map_err(|e| {
            error!("Playback task failed: {}", e);
            GatewayError::Task(e.to_string())
        })?
    }

    /// Abort every operation, force-close every open channel and wait for
    /// call teardown to finish.
    pub async fn abort(&self) -> Result<AbortReport> {
        info!("Received abort request - stopping all operations");
        let report = self.aborts.abort_all().await?;

        self.wait_for_tasks(self.config.shutdown.deadline()).await;
        if !self.shutdown.is_cancelled() {
            self.tasks.reopen();
        }

        info!("All operations aborted");
        Ok(report)
    }

    /// Quiet device probe for liveness checks
    pub async fn health(&self) -> Result<Vec<ChannelInfo>> {
        match self.sessions.list_channels().await {
            Ok(channels) => {
                debug!("Device healthy: {} channels", channels.len());
                Ok(channels)
            }
            Err(e) => {
                error!("Device unreachable: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancel everything, force-close channels, then give tracked tasks until
    /// the shutdown deadline to wind down.
    pub async fn shutdown(&self) -> Result<AbortReport> {
        info!("Shutdown requested, cleaning up...");
        self.shutdown.cancel();

        let report = self.aborts.abort_all().await;

        let deadline = self.config.shutdown.deadline();
        if !self.wait_for_tasks(deadline).await {
            warn!("Tasks still running after {:?} shutdown deadline", deadline);
        }

        info!("Gateway stopped");
        report
    }

    /// Returns `false` if the deadline passed first
    async fn wait_for_tasks(&self, deadline: Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(deadline, self.tasks.wait()).await.is_ok()
    }
}

type CallStarted = Result<(Uuid, String)>;

/// Set up one call, report the outcome on `ready`, then own it until it ends.
///
/// Every exit path after `acquire_channel` releases the channel and every
/// exit after `register` unregisters the operation.
async fn supervise_call(
    sessions: Arc<SessionManager>,
    aborts: Arc<AbortCoordinator>,
    format: AudioFormat,
    media: Arc<dyn MediaPort>,
    cancel: CancellationToken,
    ready: oneshot::Sender<CallStarted>,
) -> Option<BridgeReport> {
    let session = match sessions.acquire_channel().await {
        Ok(session) => session,
        Err(e) => {
            media.close().await;
            let _ = ready.send(Err(e));
            return None;
        }
    };
    let channel_id = session.channel_id.clone();
    let op = aborts.register(OperationKind::LiveCall, cancel.clone()).await;

    let bridge = match AudioBridge::start(
        session,
        Arc::clone(sessions.device()),
        Arc::clone(&media),
        format,
        &cancel,
    )
    .await
    {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("Failed to start audio bridge on channel {}: {}", channel_id, e);
            media.close().await;
            release(&sessions, &channel_id).await;
            aborts.unregister(&op).await;
            let _ = ready.send(Err(e));
            return None;
        }
    };

    if ready.send(Ok((op.id(), channel_id.clone()))).is_ok() {
        info!("Call {} started on channel {}", op.id(), channel_id);
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Call {} cancelled", op.id());
            }
            _ = bridge.wait() => {
                info!("Call {} ended: both directions finished", op.id());
            }
        }
    } else {
        warn!("Caller left before call {} was up, tearing it down", op.id());
    }

    let report = bridge.stop().await;
    release(&sessions, &channel_id).await;
    aborts.unregister(&op).await;
    Some(report)
}

async fn release(sessions: &SessionManager, channel_id: &str) {
    if let Err(e) = sessions.release_channel(channel_id).await {
        warn!("Failed to close channel {} after call: {}", channel_id, e);
    }
}
