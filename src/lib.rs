pub mod abort;
pub mod audio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod gateway;
pub mod port;
pub mod session;

pub use abort::{AbortCoordinator, AbortReport, OperationHandle, OperationInfo, OperationKind};
pub use audio::{AudioFormat, FrameAssembler};
pub use bridge::{AudioBridge, BridgeReport, BridgeState, FilePlayer, PlaybackReport, PumpOutcome};
pub use config::GatewayConfig;
pub use error::{DeviceError, GatewayError, MediaError};
pub use gateway::{CallHandle, Gateway};
pub use port::{AudioSession, ChannelInfo, DevicePort, MediaPort};
pub use session::SessionManager;
