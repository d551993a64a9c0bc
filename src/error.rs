use thiserror::Error;

/// Failure talking to the doorbell device
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Connection-level failure (refused, reset, timed out)
    #[error("device transport error: {0}")]
    Transport(String),

    /// Device answered with something we did not expect
    #[error("device protocol error: {0}")]
    Protocol(String),

    /// Channel id unknown to the device
    #[error("unknown channel {0}")]
    UnknownChannel(String),
}

/// Failure on the browser-facing media transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("media transport closed")]
    Closed,

    #[error("media transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Every channel is busy; callers report "busy" and do not retry
    #[error("no available channels")]
    NoAvailableChannels,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Media(#[from] MediaError),

    /// Stopped by an explicit abort or shutdown
    #[error("operation cancelled")]
    Cancelled,

    /// A background task panicked or was aborted by the runtime
    #[error("background task failed: {0}")]
    Task(String),

    /// Listing channels failed, so a forced release could not run
    #[error("failed to list channels: {0}")]
    ChannelListing(DeviceError),
}

impl GatewayError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
