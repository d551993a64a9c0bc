use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::operation::{Operation, OperationHandle, OperationInfo, OperationKind};
use crate::error::{GatewayError, Result};
use crate::session::SessionManager;

/// Outcome of `AbortCoordinator::abort_all`
#[derive(Debug, Default, Clone)]
pub struct AbortReport {
    /// Operations whose cancel token was fired
    pub cancelled: usize,
    /// Cancelled operations that had not finished when the drain window closed
    pub lingering: usize,
    /// Channels force-closed
    pub released: Vec<String>,
    /// Channels that could not be closed; logged, not fatal
    pub failed: Vec<(String, GatewayError)>,
}

impl AbortReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of in-flight cancellable operations
pub struct AbortCoordinator {
    sessions: Arc<SessionManager>,
    operations: Mutex<HashMap<Uuid, Operation>>,
    drain: Duration,
}

impl AbortCoordinator {
    pub fn new(sessions: Arc<SessionManager>, drain: Duration) -> Self {
        Self {
            sessions,
            operations: Mutex::new(HashMap::new()),
            drain,
        }
    }

    /// Track an operation. The returned handle's token fires on abort.
    pub async fn register(&self, kind: OperationKind, cancel: CancellationToken) -> OperationHandle {
        let handle = OperationHandle {
            id: Uuid::new_v4(),
            kind,
            cancel,
            finished: CancellationToken::new(),
        };

        {
            let mut operations = self.operations.lock().await;
            operations.insert(
                handle.id,
                Operation {
                    kind,
                    cancel: handle.cancel.clone(),
                    finished: handle.finished.clone(),
                    started_at: Utc::now(),
                },
            );
        }

        info!("Registered {} operation {}", kind, handle.id);
        handle
    }

    /// Stop tracking an operation and mark it finished.
    ///
    /// Completion and a concurrent abort race to get here; whoever comes
    /// second finds nothing to remove.
    pub async fn unregister(&self, handle: &OperationHandle) {
        let removed = self.operations.lock().await.remove(&handle.id).is_some();
        handle.finished.cancel();

        if removed {
            info!("Unregistered {} operation {}", handle.kind, handle.id);
        } else {
            debug!("Operation {} already unregistered", handle.id);
        }
    }

    /// Cancel only operations of `kind`, leaving everything else running.
    /// Returns how many were cancelled.
    pub async fn abort_by_kind(&self, kind: OperationKind) -> usize {
        let targets: Vec<(Uuid, Operation)> = {
            let mut operations = self.operations.lock().await;
            let ids: Vec<Uuid> = operations
                .iter()
                .filter(|(_, op)| op.kind == kind)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| operations.remove(&id).map(|op| (id, op)))
                .collect()
        };

        for (id, op) in &targets {
            info!("Cancelling {} operation {}", kind, id);
            op.cancel.cancel();
        }

        // Give them a chance to hand their channels back before the caller
        // tries to acquire one.
        let lingering = self.wait_finished(&targets).await;
        if lingering > 0 {
            warn!("{} cancelled {} operations still running", lingering, kind);
        }

        targets.len()
    }

    pub async fn has_active(&self, kind: OperationKind) -> bool {
        self.operations
            .lock()
            .await
            .values()
            .any(|op| op.kind == kind)
    }

    pub async fn active_operations(&self) -> Vec<OperationInfo> {
        let operations = self.operations.lock().await;
        operations
            .iter()
            .map(|(id, op)| OperationInfo {
                id: *id,
                kind: op.kind,
                started_at: op.started_at,
            })
            .collect()
    }

    /// Cancel every operation, then force-close every channel still in use.
    ///
    /// Cancellation strictly precedes the forced release: a pump that has not
    /// seen its token yet must not have the channel closed underneath it.
    /// Individual release failures are collected in the report; only a failed
    /// channel listing fails the call.
    pub async fn abort_all(&self) -> Result<AbortReport> {
        let drained: Vec<(Uuid, Operation)> = {
            let mut operations = self.operations.lock().await;
            operations.drain().collect()
        };

        info!("Aborting {} active operations", drained.len());

        let mut report = AbortReport::default();
        for (id, op) in &drained {
            info!("Cancelling {} operation {}", op.kind, id);
            op.cancel.cancel();
            report.cancelled += 1;
        }

        report.lingering = self.wait_finished(&drained).await;
        if report.lingering > 0 {
            warn!(
                "{} cancelled operations still running after {:?}, forcing channels closed",
                report.lingering, self.drain
            );
        }

        let channels = self.sessions.device().list_channels().await.map_err(|e| {
            error!("Failed to list channels: {}", e);
            GatewayError::ChannelListing(e)
        })?;

        for channel in channels.iter().filter(|ch| ch.in_use) {
            info!("Releasing active channel {}", channel.id);
            match self.sessions.release_channel(&channel.id).await {
                Ok(()) => report.released.push(channel.id.clone()),
                Err(e) => {
                    warn!("Failed to release channel {}: {}", channel.id, e);
                    report.failed.push((channel.id.clone(), e));
                }
            }
        }

        info!("Closed {} audio channels", report.released.len());
        Ok(report)
    }

    /// Wait up to the drain window for cancelled operations to unregister.
    /// Returns how many were still running.
    async fn wait_finished(&self, operations: &[(Uuid, Operation)]) -> usize {
        if operations.is_empty() {
            return 0;
        }

        let all_finished = futures::future::join_all(
            operations.iter().map(|(_, op)| op.finished.cancelled()),
        );

        match tokio::time::timeout(self.drain, all_finished).await {
            Ok(_) => 0,
            Err(_) => operations
                .iter()
                .filter(|(_, op)| !op.finished.is_cancelled())
                .count(),
        }
    }
}
