use crate::session::MeshContext;
use async_trait::async_trait;
use murmur_core::{ChannelId, Identity};

/// Application hooks, called from the session loop in event order.
#[async_trait]
pub trait MeshBehavior: Send + Sync + 'static {
    /// Link is connected and its chat channel is open.
    async fn on_peer_connected(&self, ctx: &MeshContext, channel_id: ChannelId, peer: Identity);

    async fn on_message(
        &self,
        ctx: &MeshContext,
        channel_id: ChannelId,
        peer: Identity,
        content: String,
    );

    /// Only called for peers previously reported by `on_peer_connected`.
    async fn on_peer_left(&self, ctx: &MeshContext, channel_id: ChannelId, peer: Identity);
}
