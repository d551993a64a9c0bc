//! Audio streaming between the doorbell and a browser
//!
//! - `AudioBridge`: bidirectional live call, one pump per direction
//! - `FilePlayer`: one-way upload of a pre-recorded clip

mod bridge;
mod playback;
mod pump;

pub use bridge::{AudioBridge, BridgeReport, BridgeState};
pub use playback::{FilePlayer, PlaybackReport};
pub use pump::PumpOutcome;
