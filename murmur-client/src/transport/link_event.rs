use crate::link::{LinkId, LinkKey};
use std::fmt;
use std::sync::Arc;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

/// Events a peer transport pushes to the session loop.
///
/// Tagged with the link instance that produced them; events from a link
/// that has since been replaced or closed are dropped by the session.
pub struct LinkEvent {
    pub key: LinkKey,
    pub link_id: LinkId,
    pub kind: LinkEventKind,
}

pub enum LinkEventKind {
    /// The peer connection reached `Connected`.
    Connected,

    /// The peer connection failed, disconnected or closed underneath us.
    Failed(RTCPeerConnectionState),

    /// The chat data channel is open for writing.
    ChannelOpen(Arc<RTCDataChannel>),

    /// Text received on the chat data channel.
    Message(String),

    /// Local ICE candidate to trickle to the remote peer.
    Candidate(RTCIceCandidateInit),

    /// The remote peer started sending a media track.
    RemoteTrack(RemoteTrack),
}

impl fmt::Debug for LinkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected"),
            Self::Failed(state) => write!(f, "Failed({})", state),
            Self::ChannelOpen(dc) => write!(f, "ChannelOpen({})", dc.label()),
            Self::Message(text) => write!(f, "Message({} bytes)", text.len()),
            Self::Candidate(_) => f.write_str("Candidate"),
            Self::RemoteTrack(track) => write!(f, "RemoteTrack({:?})", track.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Audio => Some(Self::Audio),
            RTPCodecType::Video => Some(Self::Video),
            _ => None,
        }
    }
}

/// A media track received from a remote peer, handed to the renderer as is.
#[derive(Clone)]
pub struct RemoteTrack {
    pub kind: MediaKind,
    pub track_id: String,
    pub track: Arc<TrackRemote>,
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("kind", &self.kind)
            .field("track_id", &self.track_id)
            .finish_non_exhaustive()
    }
}
