use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a cancellable operation is doing with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    /// One-shot upload of a pre-recorded clip
    PlayFile,
    /// Bidirectional call bridged to a browser
    LiveCall,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::PlayFile => write!(f, "play-file"),
            OperationKind::LiveCall => write!(f, "live-call"),
        }
    }
}

/// Returned by `AbortCoordinator::register`; pass back to `unregister` when done
#[derive(Debug, Clone)]
pub struct OperationHandle {
    pub(crate) id: Uuid,
    pub(crate) kind: OperationKind,
    pub(crate) cancel: CancellationToken,
    pub(crate) finished: CancellationToken,
}

impl OperationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Token the operation should watch for aborts
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Snapshot of a registered operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub id: Uuid,
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
}

/// Registry entry
#[derive(Debug)]
pub(crate) struct Operation {
    pub kind: OperationKind,
    pub cancel: CancellationToken,
    pub finished: CancellationToken,
    pub started_at: DateTime<Utc>,
}
