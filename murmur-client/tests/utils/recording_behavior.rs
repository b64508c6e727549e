use async_trait::async_trait;
use murmur_client::{MeshBehavior, MeshContext};
use murmur_core::{ChannelId, Identity};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Event types that can be recorded by RecordingBehavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A link came up with an open chat channel.
    Connected { channel_id: ChannelId, peer: Identity },
    /// A chat message arrived.
    Message {
        channel_id: ChannelId,
        peer: Identity,
        content: String,
    },
    /// A previously connected peer went away.
    Left { channel_id: ChannelId, peer: Identity },
}

/// A MeshBehavior that records all events.
#[derive(Clone, Default)]
pub struct RecordingBehavior {
    events: Arc<Mutex<Vec<MeshEvent>>>,
}

impl RecordingBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_events(&self) -> Vec<MeshEvent> {
        self.events.lock().await.clone()
    }

    /// Wait until `predicate` holds over the recorded events, with timeout.
    pub async fn wait_until<F>(&self, timeout_ms: u64, predicate: F) -> bool
    where
        F: Fn(&[MeshEvent]) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if predicate(&self.events.lock().await) {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, MeshEvent::Connected { .. }))
            .count()
    }

    pub async fn left_count(&self, peer: &Identity) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, MeshEvent::Left { peer: p, .. } if p == peer))
            .count()
    }

    pub async fn messages_from(&self, peer: &Identity) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                MeshEvent::Message {
                    peer: p, content, ..
                } if p == peer => Some(content.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MeshBehavior for RecordingBehavior {
    async fn on_peer_connected(&self, _ctx: &MeshContext, channel_id: ChannelId, peer: Identity) {
        tracing::info!("[RecordingBehavior] connected: {} in {}", peer, channel_id);
        self.events
            .lock()
            .await
            .push(MeshEvent::Connected { channel_id, peer });
    }

    async fn on_message(
        &self,
        _ctx: &MeshContext,
        channel_id: ChannelId,
        peer: Identity,
        content: String,
    ) {
        tracing::info!("[RecordingBehavior] message from {}: {} bytes", peer, content.len());
        self.events.lock().await.push(MeshEvent::Message {
            channel_id,
            peer,
            content,
        });
    }

    async fn on_peer_left(&self, _ctx: &MeshContext, channel_id: ChannelId, peer: Identity) {
        tracing::info!("[RecordingBehavior] left: {} from {}", peer, channel_id);
        self.events
            .lock()
            .await
            .push(MeshEvent::Left { channel_id, peer });
    }
}
