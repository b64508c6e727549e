use crate::link::{LinkId, LinkKey, LinkState, OutgoingTrack};
use crate::transport::RemoteTrack;
use murmur_core::{ChannelId, Identity};
use std::collections::BTreeMap;

/// Session readiness for one joined channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// `join-channel` sent, nothing heard back yet.
    Joining,
    /// Ready to accept and initiate links.
    Active,
}

/// Read-only view of one link for renderers.
#[derive(Debug, Clone)]
pub struct PeerView {
    pub link_id: LinkId,
    pub state: LinkState,
    pub outgoing_audio: Option<OutgoingTrack>,
    pub outgoing_video: Option<OutgoingTrack>,
    pub remote_tracks: Vec<RemoteTrack>,
}

/// Snapshot of the session published after every change.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub channels: BTreeMap<ChannelId, ChannelPhase>,
    pub peers: BTreeMap<LinkKey, PeerView>,
    /// Link instances created since the session started.
    pub links_created: u64,
}

impl Roster {
    pub fn phase(&self, channel_id: &ChannelId) -> Option<ChannelPhase> {
        self.channels.get(channel_id).copied()
    }

    pub fn peer(&self, channel_id: &ChannelId, remote: &Identity) -> Option<&PeerView> {
        self.peers
            .get(&LinkKey::new(channel_id.clone(), remote.clone()))
    }

    /// Remotes with a `Connected` link in `channel_id`, sorted.
    pub fn connected(&self, channel_id: &ChannelId) -> Vec<Identity> {
        self.peers
            .iter()
            .filter(|(key, view)| {
                &key.channel_id == channel_id && view.state == LinkState::Connected
            })
            .map(|(key, _)| key.remote.clone())
            .collect()
    }

    pub fn links_in(&self, channel_id: &ChannelId) -> usize {
        self.peers
            .keys()
            .filter(|key| &key.channel_id == channel_id)
            .count()
    }
}
