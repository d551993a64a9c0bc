use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};
use crate::port::{AudioSession, ChannelInfo, DevicePort};

/// Grants exclusive use of the device's audio channels
///
/// Availability always comes from a fresh device listing. The only state kept
/// here is the set of channel ids this process has claimed but not yet
/// released, which stops two concurrent acquirers from both picking a channel
/// the device still reports as free.
pub struct SessionManager {
    device: Arc<dyn DevicePort>,
    claimed: Mutex<HashSet<String>>,
}

impl SessionManager {
    pub fn new(device: Arc<dyn DevicePort>) -> Self {
        Self {
            device,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn device(&self) -> &Arc<dyn DevicePort> {
        &self.device
    }

    /// Open the first channel the device reports as free, in device order
    pub async fn acquire_channel(&self) -> Result<AudioSession> {
        let channels = self.device.list_channels().await?;

        let channel_id = {
            let mut claimed = self.claimed.lock().await;
            let free = channels
                .iter()
                .find(|ch| !ch.in_use && !claimed.contains(&ch.id))
                .map(|ch| ch.id.clone());

            match free {
                Some(id) => {
                    claimed.insert(id.clone());
                    id
                }
                None => {
                    debug!("All {} channels in use", channels.len());
                    return Err(GatewayError::NoAvailableChannels);
                }
            }
        };

        info!("Opening audio channel {}", channel_id);
        match self.device.open_channel(&channel_id).await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!("Failed to open audio channel {}: {}", channel_id, e);
                self.claimed.lock().await.remove(&channel_id);
                Err(e.into())
            }
        }
    }

    /// Close a channel at the device. Releasing an already-free channel succeeds.
    pub async fn release_channel(&self, channel_id: &str) -> Result<()> {
        info!("Closing audio channel {}", channel_id);
        let closed = self.device.close_channel(channel_id).await;

        // The claim goes either way: a failed close leaves the channel to the
        // device's own report, which the next acquire reads fresh.
        self.claimed.lock().await.remove(channel_id);

        closed.map_err(|e| {
            warn!("Failed to close audio channel {}: {}", channel_id, e);
            GatewayError::from(e)
        })
    }

    /// Live snapshot of every channel
    pub async fn list_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.device.list_channels().await?)
    }

    /// Close every channel the device reports in use.
    ///
    /// Run once at startup: a channel left open by a previous process would
    /// otherwise lock out every call.
    pub async fn reset_channels(&self) -> Result<usize> {
        let channels = self.device.list_channels().await?;
        info!("Found {} two-way audio channels", channels.len());

        let mut reset = 0;
        for channel in channels.iter().filter(|ch| ch.in_use) {
            warn!("Channel {} left open, closing it", channel.id);
            self.release_channel(&channel.id).await?;
            reset += 1;
        }

        Ok(reset)
    }
}
