use crate::link::{LinkId, RegistryEntry};
use crate::media::{ActiveTrack, LocalMediaSource, MediaSlot};
use crate::transport::{PeerTransport, RemoteTrack};
use std::sync::Arc;
use tracing::{debug, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Our offer is out, waiting for the answer.
    Offering,
    /// Applying a remote offer and producing the answer.
    Answering,
    /// Descriptions exchanged, ICE in progress.
    Connecting,
    Connected,
    Closed,
}

/// What a link is currently sending on one of its senders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingTrack {
    pub slot: MediaSlot,
    pub track_id: String,
}

/// A live mesh edge: transport, chat data channel and media senders.
pub struct PeerLink {
    pub id: LinkId,
    pub state: LinkState,
    transport: PeerTransport,
    data_channel: Option<Arc<RTCDataChannel>>,
    remote_applied: bool,
    pending_candidates: Vec<RTCIceCandidateInit>,
    outgoing_audio: Option<OutgoingTrack>,
    outgoing_video: Option<OutgoingTrack>,
    holds_camera: bool,
    holds_screen: bool,
    remote_tracks: Vec<RemoteTrack>,
    announced: bool,
}

impl PeerLink {
    pub fn new(id: LinkId, state: LinkState, transport: PeerTransport) -> Self {
        Self {
            id,
            state,
            transport,
            data_channel: None,
            remote_applied: false,
            pending_candidates: Vec::new(),
            outgoing_audio: None,
            outgoing_video: None,
            holds_camera: false,
            holds_screen: false,
            remote_tracks: Vec::new(),
            announced: false,
        }
    }

    pub fn transport(&self) -> &PeerTransport {
        &self.transport
    }

    pub fn outgoing_audio(&self) -> Option<&OutgoingTrack> {
        self.outgoing_audio.as_ref()
    }

    pub fn outgoing_video(&self) -> Option<&OutgoingTrack> {
        self.outgoing_video.as_ref()
    }

    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    pub fn add_remote_track(&mut self, track: RemoteTrack) {
        self.remote_tracks.retain(|t| t.track_id != track.track_id);
        self.remote_tracks.push(track);
    }

    pub fn set_data_channel(&mut self, dc: Arc<RTCDataChannel>) {
        self.data_channel = Some(dc);
    }

    /// The chat channel, if it is open for writing.
    pub fn open_channel(&self) -> Option<&Arc<RTCDataChannel>> {
        self.data_channel
            .as_ref()
            .filter(|dc| dc.ready_state() == RTCDataChannelState::Open)
    }

    /// True exactly once: the first time the link is connected with an open channel.
    pub fn take_announcement(&mut self) -> bool {
        if self.announced || self.state != LinkState::Connected || self.open_channel().is_none() {
            return false;
        }
        self.announced = true;
        true
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Applies `candidate` now, or keeps it until the remote description is set.
    pub async fn add_remote_candidate(&mut self, candidate: RTCIceCandidateInit) {
        if !self.remote_applied {
            self.pending_candidates.push(candidate);
            return;
        }
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate on link {}: {}", self.id, e);
        }
    }

    /// Marks the remote description as set and flushes buffered candidates.
    pub async fn remote_description_applied(&mut self) {
        self.remote_applied = true;
        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!("Failed to add buffered ICE candidate on link {}: {}", self.id, e);
            }
        }
    }

    /// Points both senders at whatever `media` currently offers and keeps the
    /// attachment counts in step. Never touches the negotiation.
    ///
    /// Counts follow the tracks actually on the senders, also when one of the
    /// replacements fails.
    pub async fn sync_media(&mut self, media: &mut LocalMediaSource) -> Result<(), webrtc::Error> {
        let result = self.replace_tracks(media).await;
        self.update_holds(media);
        result
    }

    async fn replace_tracks(&mut self, media: &LocalMediaSource) -> Result<(), webrtc::Error> {
        let audio = media.active_audio();
        if !same_track(self.outgoing_audio.as_ref(), audio.as_ref()) {
            self.transport
                .set_audio(audio.as_ref().map(|a| Arc::clone(&a.track)))
                .await?;
            self.outgoing_audio = audio.as_ref().map(outgoing);
        }

        let video = media.active_video();
        if !same_track(self.outgoing_video.as_ref(), video.as_ref()) {
            self.transport
                .set_video(video.as_ref().map(|v| Arc::clone(&v.track)))
                .await?;
            self.outgoing_video = video.as_ref().map(outgoing);
        }
        Ok(())
    }

    fn update_holds(&mut self, media: &mut LocalMediaSource) {
        let sends = |slot: MediaSlot| {
            [&self.outgoing_audio, &self.outgoing_video]
                .into_iter()
                .flatten()
                .any(|t| t.slot == slot)
        };
        let camera = sends(MediaSlot::Camera);
        let screen = sends(MediaSlot::Screen);

        if camera != self.holds_camera {
            toggle(media, MediaSlot::Camera, camera);
            self.holds_camera = camera;
        }
        if screen != self.holds_screen {
            toggle(media, MediaSlot::Screen, screen);
            self.holds_screen = screen;
        }
    }

    /// Tears the link down and gives back its share of the local media.
    pub async fn close(mut self, media: &mut LocalMediaSource) {
        self.state = LinkState::Closed;
        if self.holds_camera {
            media.detach(MediaSlot::Camera);
        }
        if self.holds_screen {
            media.detach(MediaSlot::Screen);
        }
        if let Some(dc) = self.data_channel.take() {
            let _ = dc.close().await;
        }
        if let Err(e) = self.transport.close().await {
            debug!("Error closing link {}: {}", self.id, e);
        }
    }
}

impl RegistryEntry for PeerLink {
    fn link_id(&self) -> LinkId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.state != LinkState::Closed
    }
}

fn toggle(media: &mut LocalMediaSource, slot: MediaSlot, attach: bool) {
    if attach {
        media.attach(slot);
    } else {
        media.detach(slot);
    }
}

fn outgoing(active: &ActiveTrack) -> OutgoingTrack {
    OutgoingTrack {
        slot: active.slot,
        track_id: active.id().to_owned(),
    }
}

fn same_track(current: Option<&OutgoingTrack>, wanted: Option<&ActiveTrack>) -> bool {
    match (current, wanted) {
        (None, None) => true,
        (Some(current), Some(wanted)) => current.track_id == wanted.id(),
        _ => false,
    }
}
