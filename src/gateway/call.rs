use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use crate::bridge::BridgeReport;

/// A live call in progress
///
/// Dropping the handle leaves the call running; it still ends on abort,
/// shutdown, or when both directions finish.
pub struct CallHandle {
    pub(crate) id: Uuid,
    pub(crate) channel_id: String,
    pub(crate) cancel: CancellationToken,
    pub(crate) supervisor: JoinHandle<Option<BridgeReport>>,
}

impl CallHandle {
    /// Operation id the call is registered under
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// End the call and wait for its channel to be released
    pub async fn hangup(self) -> Option<BridgeReport> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the call to end on its own.
    ///
    /// `None` only if the supervising task panicked.
    pub async fn join(self) -> Option<BridgeReport> {
        match self.supervisor.await {
            Ok(report) => report,
            Err(e) => {
                error!("Call {} supervisor failed: {}", self.id, e);
                None
            }
        }
    }
}
