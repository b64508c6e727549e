use crate::config::SessionConfig;
use crate::link::{LinkId, LinkKey};
use crate::transport::{LinkEvent, LinkEventKind, MediaKind, RemoteTrack};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// One direct peer connection plus its fixed audio and video senders.
///
/// Both senders exist from creation on, before any offer or answer is made, so
/// switching media later is a track replacement and never renegotiates.
pub struct PeerTransport {
    key: LinkKey,
    link_id: LinkId,
    peer_connection: Arc<RTCPeerConnection>,
    audio: Arc<RTCRtpSender>,
    video: Arc<RTCRtpSender>,
    events: mpsc::Sender<LinkEvent>,
}

impl PeerTransport {
    /// Builds the peer connection and wires its callbacks into `events`.
    pub async fn new(
        key: LinkKey,
        link_id: LinkId,
        config: &SessionConfig,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Self, webrtc::Error> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let audio = Self::provision(&peer_connection, RTPCodecType::Audio).await?;
        let video = Self::provision(&peer_connection, RTPCodecType::Video).await?;

        let transport = Self {
            key,
            link_id,
            peer_connection,
            audio,
            video,
            events,
        };
        transport.wire_callbacks();

        debug!("Created peer connection {} for {}", link_id, transport.key);
        Ok(transport)
    }

    async fn provision(
        peer_connection: &Arc<RTCPeerConnection>,
        kind: RTPCodecType,
    ) -> Result<Arc<RTCRtpSender>, webrtc::Error> {
        let transceiver = peer_connection
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Sendrecv,
                    send_encodings: vec![],
                }),
            )
            .await?;
        Ok(transceiver.sender().await)
    }

    fn wire_callbacks(&self) {
        let key = self.key.clone();
        let link_id = self.link_id;

        let state_tx = self.events.clone();
        let state_key = key.clone();
        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let key = state_key.clone();

                Box::pin(async move {
                    info!("Peer connection {} to {} is {}", link_id, key, s);
                    let kind = match s {
                        RTCPeerConnectionState::Connected => LinkEventKind::Connected,
                        RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed => LinkEventKind::Failed(s),
                        _ => return,
                    };
                    let _ = tx.send(LinkEvent { key, link_id, kind }).await;
                })
            }));

        let ice_tx = self.events.clone();
        let ice_key = key.clone();
        self.peer_connection
            .on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
                let tx = ice_tx.clone();
                let key = ice_key.clone();

                Box::pin(async move {
                    let Some(candidate) = c else { return };
                    let init = match candidate.to_json() {
                        Ok(init) => init,
                        Err(e) => {
                            warn!("Unusable local candidate for {}: {}", key, e);
                            return;
                        }
                    };
                    let kind = LinkEventKind::Candidate(init);
                    let _ = tx.send(LinkEvent { key, link_id, kind }).await;
                })
            }));

        let dc_tx = self.events.clone();
        let dc_key = key.clone();
        self.peer_connection
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let tx = dc_tx.clone();
                let key = dc_key.clone();

                Box::pin(async move {
                    debug!("Remote opened data channel '{}' on {}", dc.label(), key);
                    wire_data_channel(dc, key, link_id, tx);
                })
            }));

        let track_tx = self.events.clone();
        let track_key = key;
        self.peer_connection
            .on_track(Box::new(move |track, _receiver, _transceiver| {
                let tx = track_tx.clone();
                let key = track_key.clone();

                Box::pin(async move {
                    let Some(kind) = MediaKind::from_codec_type(track.kind()) else {
                        return;
                    };
                    let remote = RemoteTrack {
                        kind,
                        track_id: track.id(),
                        track,
                    };
                    debug!("Remote {:?} track {} on {}", kind, remote.track_id, key);
                    let kind = LinkEventKind::RemoteTrack(remote);
                    let _ = tx.send(LinkEvent { key, link_id, kind }).await;
                })
            }));
    }

    /// Opens the chat data channel (offerer side).
    pub async fn open_data_channel(&self, label: &str) -> Result<(), webrtc::Error> {
        let dc = self.peer_connection.create_data_channel(label, None).await?;
        wire_data_channel(dc, self.key.clone(), self.link_id, self.events.clone());
        Ok(())
    }

    /// Creates an offer and installs it as the local description.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription, webrtc::Error> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer)
    }

    /// Creates an answer and installs it as the local description.
    pub async fn create_answer(&self) -> Result<RTCSessionDescription, webrtc::Error> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer)
    }

    pub async fn apply_offer(&self, sdp: String) -> Result<(), webrtc::Error> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await
    }

    pub async fn apply_answer(&self, sdp: String) -> Result<(), webrtc::Error> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await
    }

    pub async fn add_ice_candidate(
        &self,
        candidate: RTCIceCandidateInit,
    ) -> Result<(), webrtc::Error> {
        self.peer_connection.add_ice_candidate(candidate).await
    }

    /// Swaps the outgoing audio track; `None` mutes the sender.
    pub async fn set_audio(
        &self,
        track: Option<Arc<TrackLocalStaticSample>>,
    ) -> Result<(), webrtc::Error> {
        self.audio.replace_track(track.map(as_track_local)).await
    }

    /// Swaps the outgoing video track; `None` mutes the sender.
    pub async fn set_video(
        &self,
        track: Option<Arc<TrackLocalStaticSample>>,
    ) -> Result<(), webrtc::Error> {
        self.video.replace_track(track.map(as_track_local)).await
    }

    pub async fn close(&self) -> Result<(), webrtc::Error> {
        self.peer_connection.close().await
    }
}

fn as_track_local(track: Arc<TrackLocalStaticSample>) -> Arc<dyn TrackLocal + Send + Sync> {
    track
}

/// Forwards open and message events of `dc` to the session.
fn wire_data_channel(
    dc: Arc<RTCDataChannel>,
    key: LinkKey,
    link_id: LinkId,
    events: mpsc::Sender<LinkEvent>,
) {
    let open_tx = events.clone();
    let open_key = key.clone();
    let open_dc = Arc::clone(&dc);
    dc.on_open(Box::new(move || {
        let tx = open_tx.clone();
        let key = open_key.clone();
        let channel_ready = Arc::clone(&open_dc);

        Box::pin(async move {
            info!("Data channel open on {}", key);
            let kind = LinkEventKind::ChannelOpen(channel_ready);
            let _ = tx.send(LinkEvent { key, link_id, kind }).await;
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = events.clone();
        let key = key.clone();

        Box::pin(async move {
            let text = match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping non-UTF-8 message from {}: {}", key, e);
                    return;
                }
            };
            let kind = LinkEventKind::Message(text);
            let _ = tx.send(LinkEvent { key, link_id, kind }).await;
        })
    }));
}
