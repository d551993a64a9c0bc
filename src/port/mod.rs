//! Narrow interfaces to the outside world
//!
//! - `DevicePort`: the doorbell's channel and audio API
//! - `MediaPort`: the negotiated real-time transport to the browser

mod device;
mod media;

pub use device::{AudioSession, ChannelInfo, DevicePort};
pub use media::MediaPort;
