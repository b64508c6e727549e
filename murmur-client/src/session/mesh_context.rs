use crate::link::LinkKey;
use dashmap::DashMap;
use murmur_core::{ChannelId, Identity};
use std::sync::Arc;
use tracing::{error, warn};
use webrtc::data_channel::RTCDataChannel;

/// Chat channels of every announced link, shared with behavior hooks.
///
/// Cheap to clone. Sending through it never blocks the session loop.
#[derive(Clone, Default)]
pub struct MeshContext {
    peers: Arc<DashMap<LinkKey, Arc<RTCDataChannel>>>,
}

impl MeshContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, key: LinkKey, channel: Arc<RTCDataChannel>) {
        self.peers.insert(key, channel);
    }

    pub(crate) fn remove(&self, key: &LinkKey) {
        self.peers.remove(key);
    }

    /// Sends `content` to one peer. Returns false if it is not connected or the write failed.
    pub async fn send(&self, channel_id: &ChannelId, peer: &Identity, content: &str) -> bool {
        let key = LinkKey::new(channel_id.clone(), peer.clone());
        let Some(dc) = self.peers.get(&key).map(|entry| Arc::clone(entry.value())) else {
            warn!("Attempted to send to disconnected peer {}", key);
            return false;
        };

        match dc.send_text(content.to_owned()).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to send message to {}: {}", key, e);
                false
            }
        }
    }

    /// Fans `content` out to every connected peer of the channel, one write per
    /// peer in order. Returns how many writes succeeded.
    pub async fn broadcast(&self, channel_id: &ChannelId, content: &str) -> usize {
        // Collect first so no map guard is held across an await.
        let targets: Vec<(LinkKey, Arc<RTCDataChannel>)> = self
            .peers
            .iter()
            .filter(|entry| &entry.key().channel_id == channel_id)
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut delivered = 0;
        for (key, dc) in targets {
            match dc.send_text(content.to_owned()).await {
                Ok(_) => delivered += 1,
                Err(e) => error!("Broadcast to {} failed: {}", key, e),
            }
        }
        delivered
    }

    pub fn connected_peers(&self, channel_id: &ChannelId) -> Vec<Identity> {
        let mut peers: Vec<Identity> = self
            .peers
            .iter()
            .filter(|entry| &entry.key().channel_id == channel_id)
            .map(|entry| entry.key().remote.clone())
            .collect();
        peers.sort();
        peers
    }

    pub fn is_connected(&self, channel_id: &ChannelId, peer: &Identity) -> bool {
        self.peers
            .contains_key(&LinkKey::new(channel_id.clone(), peer.clone()))
    }
}
