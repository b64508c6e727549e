use crate::media::MediaError;
use murmur_core::{ChannelId, ProtocolError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("peer transport error: {0}")]
    Transport(#[from] webrtc::Error),

    #[error("signaling socket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("signaling connection is closed")]
    SignalingClosed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("not joined to channel {0}")]
    NotJoined(ChannelId),

    #[error("capture cancelled: every channel it was started in was left")]
    Cancelled,

    #[error("session has shut down")]
    SessionClosed,
}
