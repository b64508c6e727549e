use async_trait::async_trait;
use murmur_core::{ChannelId, Identity};
use serde::Serialize;

/// Durable copy of a chat message, posted after mesh delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub channel_id: ChannelId,
    pub author: Identity,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message store unavailable: {0}")]
    Unavailable(String),

    #[error("message rejected by store: {0}")]
    Rejected(String),
}

/// Boundary to the storage service. Its latency and failures never reach mesh delivery.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    async fn persist(&self, message: ChatMessage) -> Result<(), StoreError>;
}
