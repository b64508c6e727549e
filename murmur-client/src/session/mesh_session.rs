use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::link::{ConnectionRegistry, LinkKey, LinkState, PeerLink};
use crate::media::{CaptureDevice, LocalMediaSource, MediaSlot, SyntheticCapture};
use crate::session::{
    ChannelPhase, ChatMessage, MeshBehavior, MeshContext, MessageStore, PeerView, Roster,
    SessionCommand, SessionHandle,
};
use crate::signaling::SignalingSink;
use crate::transport::{LinkEvent, LinkEventKind, PeerTransport};
use murmur_core::{ChannelId, Envelope, EnvelopeKind, Identity, Signal, is_offerer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Client-side mesh actor.
///
/// Owns every peer link of one identity and mutates them from a single loop
/// fed by application commands, coordinator envelopes and transport events.
pub struct MeshSession {
    identity: Identity,
    config: SessionConfig,

    /// Outbound signaling.
    signaling: Arc<dyn SignalingSink>,
    /// Inbound signaling; closed means the coordinator connection is gone.
    inbound: mpsc::UnboundedReceiver<Envelope>,
    signaling_open: bool,

    command_rx: mpsc::Receiver<SessionCommand>,
    /// Weak so that timers do not keep the session alive.
    command_tx: mpsc::WeakSender<SessionCommand>,

    link_rx: mpsc::Receiver<LinkEvent>,
    link_tx: mpsc::Sender<LinkEvent>,

    links: ConnectionRegistry<PeerLink>,
    channels: BTreeMap<ChannelId, ChannelPhase>,
    media: LocalMediaSource,

    /// Bumped by every leave and by signaling loss; see `is_cancelled`.
    epoch: Arc<AtomicU64>,

    context: MeshContext,
    behavior: Option<Arc<dyn MeshBehavior>>,
    store: Option<Arc<dyn MessageStore>>,
    roster_tx: watch::Sender<Roster>,
}

impl MeshSession {
    pub fn builder(
        identity: Identity,
        signaling: Arc<dyn SignalingSink>,
        inbound: mpsc::UnboundedReceiver<Envelope>,
    ) -> SessionBuilder {
        SessionBuilder {
            identity,
            signaling,
            inbound,
            config: SessionConfig::default(),
            behavior: None,
            store: None,
            capture: Arc::new(SyntheticCapture::new()),
        }
    }

    pub async fn run(mut self) {
        info!("Mesh session for {} started", self.identity);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Close { reply }) => {
                            self.teardown().await;
                            let _ = reply.send(Ok(()));
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All session handles dropped");
                            break;
                        }
                    }
                }

                envelope = self.inbound.recv(), if self.signaling_open => {
                    match envelope {
                        Some(e) => self.handle_envelope(e).await,
                        None => self.on_signaling_closed().await,
                    }
                }

                evt = self.link_rx.recv() => {
                    if let Some(e) = evt {
                        self.handle_link_event(e).await;
                    }
                }
            }
        }

        self.teardown().await;

        // Requests queued behind Close never run; free what they carry.
        self.command_rx.close();
        while let Ok(cmd) = self.command_rx.try_recv() {
            cmd.abandon();
        }
        info!("Mesh session for {} finished", self.identity);
    }

    /// Roster is published before the reply, so a caller sees its own change.
    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::JoinChannel { channel_id, reply } => {
                let result = self.join_channel(channel_id).await;
                self.publish();
                let _ = reply.send(result);
            }

            SessionCommand::LeaveChannel { channel_id, reply } => {
                let result = self.leave_channel(channel_id).await;
                self.publish();
                let _ = reply.send(result);
            }

            SessionCommand::SendMessage {
                channel_id,
                content,
                reply,
            } => {
                let _ = reply.send(self.send_message(channel_id, content).await);
            }

            SessionCommand::InstallMedia {
                stream,
                epoch,
                channels,
                reply,
            } => {
                if self.is_cancelled(epoch, &channels) {
                    info!("Dropping {} capture acquired before a leave", stream.kind());
                    stream.release();
                    let _ = reply.send(Err(SessionError::Cancelled));
                    return;
                }
                info!("Starting {} for {}", stream.kind(), self.identity);
                self.media.install(stream.kind().slot(), stream);
                self.sync_all_media().await;
                self.publish();
                let _ = reply.send(Ok(()));
            }

            SessionCommand::StopScreenShare { reply } => {
                self.media.release(MediaSlot::Screen);
                self.sync_all_media().await;
                self.publish();
                let _ = reply.send(Ok(()));
            }

            SessionCommand::EndCall { reply } => {
                self.media.release(MediaSlot::Screen);
                self.media.release(MediaSlot::Camera);
                self.sync_all_media().await;
                self.publish();
                let _ = reply.send(Ok(()));
            }

            SessionCommand::JoinSettled { channel_id } => {
                if self.channels.get(&channel_id) == Some(&ChannelPhase::Joining) {
                    debug!("Channel {} settled with no presence events", channel_id);
                    self.activate(&channel_id);
                    self.publish();
                }
            }

            SessionCommand::Close { reply } => {
                // Intercepted by the run loop.
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn join_channel(&mut self, channel_id: ChannelId) -> Result<(), SessionError> {
        if self.channels.contains_key(&channel_id) {
            debug!("{} already joined {}", self.identity, channel_id);
            return Ok(());
        }
        if !self.signaling_open {
            return Err(SessionError::SignalingClosed);
        }

        self.signaling
            .send(Envelope::JoinChannel {
                channel_id: channel_id.clone(),
            })
            .await?;

        info!("{} joining {}", self.identity, channel_id);
        self.channels.insert(channel_id.clone(), ChannelPhase::Joining);
        self.schedule_settle(channel_id);
        Ok(())
    }

    async fn leave_channel(&mut self, channel_id: ChannelId) -> Result<(), SessionError> {
        if self.channels.remove(&channel_id).is_none() {
            return Err(SessionError::NotJoined(channel_id));
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        info!("{} leaving {}", self.identity, channel_id);

        for key in self.links.keys_in(&channel_id) {
            self.close_link(&key, true).await;
        }

        if self.signaling_open {
            let leave = Envelope::LeaveChannel { channel_id };
            if let Err(e) = self.signaling.send(leave).await {
                warn!("Could not announce leave: {}", e);
            }
        }
        Ok(())
    }

    async fn send_message(
        &mut self,
        channel_id: ChannelId,
        content: String,
    ) -> Result<usize, SessionError> {
        if !self.channels.contains_key(&channel_id) {
            return Err(SessionError::NotJoined(channel_id));
        }

        let delivered = self.context.broadcast(&channel_id, &content).await;
        debug!("Message in {} delivered to {} peers", channel_id, delivered);

        if let Some(store) = &self.store {
            let store = Arc::clone(store);
            let message = ChatMessage {
                channel_id,
                author: self.identity.clone(),
                content,
            };
            tokio::spawn(async move {
                if let Err(e) = store.persist(message).await {
                    warn!("Failed to persist chat message: {}", e);
                }
            });
        }

        Ok(delivered)
    }

    async fn sync_all_media(&mut self) {
        for link in self.links.values_mut() {
            if let Err(e) = link.sync_media(&mut self.media).await {
                warn!("Failed to update media on link {}: {}", link.id, e);
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        debug!("{} <- {}", self.identity, envelope.kind());

        match envelope {
            Envelope::PeerJoined { from, channel_id } => {
                self.on_peer_joined(LinkKey::new(channel_id, from)).await;
            }

            Envelope::PeerLeft { from, channel_id } => {
                let key = LinkKey::new(channel_id, from);
                if self.channels.contains_key(&key.channel_id) {
                    self.activate(&key.channel_id);
                    self.close_link(&key, true).await;
                }
            }

            Envelope::Offer(signal) => {
                if let Some(key) = self.signal_key(EnvelopeKind::Offer, &signal) {
                    self.on_offer(key, signal).await;
                }
            }

            Envelope::Answer(signal) => {
                if let Some(key) = self.signal_key(EnvelopeKind::Answer, &signal) {
                    self.on_answer(key, signal).await;
                }
            }

            Envelope::IceCandidate(signal) => {
                if let Some(key) = self.signal_key(EnvelopeKind::IceCandidate, &signal) {
                    self.on_candidate(key, signal).await;
                }
            }

            Envelope::JoinChannel { .. } | Envelope::LeaveChannel { .. } => {
                warn!("Coordinator sent a client-only envelope, ignoring");
            }
        }
        self.publish();
    }

    /// Link key of a handshake step addressed to a channel we are in.
    fn signal_key(&mut self, kind: EnvelopeKind, signal: &Signal) -> Option<LinkKey> {
        let (Some(from), Some(channel_id)) = (&signal.from, &signal.channel_id) else {
            warn!("Discarding {} without sender or channel", kind);
            return None;
        };
        if !self.channels.contains_key(channel_id) {
            debug!("Discarding {} from {} for unjoined {}", kind, from, channel_id);
            return None;
        }
        self.activate(channel_id);
        Some(LinkKey::new(channel_id.clone(), from.clone()))
    }

    async fn on_peer_joined(&mut self, key: LinkKey) {
        if !self.channels.contains_key(&key.channel_id) {
            debug!("Ignoring peer-joined for unjoined {}", key.channel_id);
            return;
        }
        self.activate(&key.channel_id);

        if key.remote == self.identity {
            return;
        }
        if self.links.contains_live(&key) {
            debug!("Already linked to {}", key);
            return;
        }
        self.offer_to(key).await;
    }

    async fn offer_to(&mut self, key: LinkKey) {
        let link_id = self.links.allocate_id();
        let transport =
            match PeerTransport::new(key.clone(), link_id, &self.config, self.link_tx.clone()).await
            {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to create transport for {}: {}", key, e);
                    return;
                }
            };

        let mut link = PeerLink::new(link_id, LinkState::Offering, transport);
        match self.start_offer(&key, &mut link).await {
            Ok(()) => {
                info!("Offered link {} to {}", link_id, key);
                self.store_link(key, link).await;
            }
            Err(e) => {
                error!("Offer to {} failed: {}", key, e);
                link.close(&mut self.media).await;
            }
        }
    }

    async fn start_offer(
        &mut self,
        key: &LinkKey,
        link: &mut PeerLink,
    ) -> Result<(), SessionError> {
        link.transport()
            .open_data_channel(&self.config.data_channel_label)
            .await?;
        link.sync_media(&mut self.media).await?;
        let offer = link.transport().create_offer().await?;
        self.send_signal(key, &offer, Envelope::Offer).await
    }

    async fn on_offer(&mut self, key: LinkKey, signal: Signal) {
        match self.links.get(&key).map(|link| link.state) {
            None | Some(LinkState::Closed) => {}

            Some(LinkState::Offering) => {
                if is_offerer(&self.identity, &key.remote) {
                    info!("Glare with {}: keeping our offer", key);
                    return;
                }
                info!("Glare with {}: yielding to the remote offer", key);
                self.close_link(&key, false).await;
            }

            Some(state) => {
                debug!("Ignoring offer from {}: link is {:?}", key, state);
                return;
            }
        }

        self.answer(key, signal).await;
    }

    async fn answer(&mut self, key: LinkKey, signal: Signal) {
        let link_id = self.links.allocate_id();
        let transport =
            match PeerTransport::new(key.clone(), link_id, &self.config, self.link_tx.clone()).await
            {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to create transport for {}: {}", key, e);
                    return;
                }
            };

        let mut link = PeerLink::new(link_id, LinkState::Answering, transport);
        match self.accept_offer(&key, &mut link, &signal).await {
            Ok(()) => {
                info!("Answered {} on link {}", key, link_id);
                link.state = LinkState::Connecting;
                self.store_link(key, link).await;
            }
            Err(e) => {
                warn!("Could not answer {}: {}", key, e);
                link.close(&mut self.media).await;
            }
        }
    }

    async fn accept_offer(
        &mut self,
        key: &LinkKey,
        link: &mut PeerLink,
        signal: &Signal,
    ) -> Result<(), SessionError> {
        let offer: RTCSessionDescription = signal.decode()?;
        link.transport().apply_offer(offer.sdp).await?;
        link.remote_description_applied().await;
        link.sync_media(&mut self.media).await?;
        let answer = link.transport().create_answer().await?;
        self.send_signal(key, &answer, Envelope::Answer).await
    }

    async fn on_answer(&mut self, key: LinkKey, signal: Signal) {
        let Some(link) = self.links.get_mut(&key) else {
            debug!("Discarding answer from {}: no link", key);
            return;
        };
        if link.state != LinkState::Offering {
            debug!("Discarding answer from {}: link is {:?}", key, link.state);
            return;
        }

        match apply_answer(link, &signal).await {
            Ok(()) => {
                link.remote_description_applied().await;
                link.state = LinkState::Connecting;
                debug!("Link {} to {} is connecting", link.id, key);
            }
            Err(e) => {
                warn!("Bad answer from {}: {}", key, e);
                self.close_link(&key, false).await;
            }
        }
    }

    async fn on_candidate(&mut self, key: LinkKey, signal: Signal) {
        let Some(link) = self.links.get_mut(&key) else {
            debug!("Discarding ICE candidate from {}: no link", key);
            return;
        };
        let decoded: Result<RTCIceCandidateInit, _> = signal.decode();
        match decoded {
            Ok(candidate) => link.add_remote_candidate(candidate).await,
            Err(e) => warn!("Bad ICE candidate from {}: {}", key, e),
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        let LinkEvent { key, link_id, kind } = event;
        let Some(link) = self.links.get_current(&key, link_id) else {
            trace!("Ignoring {:?} from retired link {} of {}", kind, link_id, key);
            return;
        };

        match kind {
            LinkEventKind::Connected => {
                link.state = LinkState::Connected;
                self.maybe_announce(&key).await;
            }

            LinkEventKind::ChannelOpen(dc) => {
                link.set_data_channel(dc);
                self.maybe_announce(&key).await;
            }

            LinkEventKind::Message(content) => {
                if !link.is_announced() {
                    debug!("Dropping early message from {}", key);
                    return;
                }
                if let Some(behavior) = &self.behavior {
                    behavior
                        .on_message(&self.context, key.channel_id, key.remote, content)
                        .await;
                }
            }

            LinkEventKind::Candidate(candidate) => {
                if let Err(e) = self
                    .send_signal(&key, &candidate, Envelope::IceCandidate)
                    .await
                {
                    warn!("Could not send ICE candidate to {}: {}", key, e);
                }
            }

            LinkEventKind::RemoteTrack(track) => {
                link.add_remote_track(track);
            }

            LinkEventKind::Failed(state) => {
                warn!("Link {} to {} went {}", link_id, key, state);
                self.close_link(&key, true).await;
            }
        }
        self.publish();
    }

    async fn maybe_announce(&mut self, key: &LinkKey) {
        let Some(link) = self.links.get_mut(key) else {
            return;
        };
        if !link.take_announcement() {
            return;
        }
        let Some(dc) = link.open_channel().cloned() else {
            return;
        };

        info!("{} connected to {}", self.identity, key);
        self.context.insert(key.clone(), dc);

        if let Some(behavior) = &self.behavior {
            behavior
                .on_peer_connected(&self.context, key.channel_id.clone(), key.remote.clone())
                .await;
        }
    }

    async fn store_link(&mut self, key: LinkKey, link: PeerLink) {
        if let Err(rejected) = self.links.insert(key, link) {
            warn!("Duplicate link {} discarded", rejected.id);
            rejected.close(&mut self.media).await;
        }
    }

    /// Closes the link under `key`; `notify` reports it to the behavior if it had been announced.
    async fn close_link(&mut self, key: &LinkKey, notify: bool) {
        let Some(link) = self.links.remove(key) else {
            return;
        };
        self.context.remove(key);

        let announced = link.is_announced();
        let link_id = link.id;
        link.close(&mut self.media).await;
        info!("Closed link {} to {}", link_id, key);

        if notify && announced {
            if let Some(behavior) = &self.behavior {
                behavior
                    .on_peer_left(&self.context, key.channel_id.clone(), key.remote.clone())
                    .await;
            }
        }
    }

    async fn send_signal<T: Serialize>(
        &self,
        key: &LinkKey,
        payload: &T,
        wrap: fn(Signal) -> Envelope,
    ) -> Result<(), SessionError> {
        let signal = Signal::encode(key.remote.clone(), key.channel_id.clone(), payload)?;
        self.signaling.send(wrap(signal)).await
    }

    fn activate(&mut self, channel_id: &ChannelId) {
        if let Some(phase) = self.channels.get_mut(channel_id) {
            *phase = ChannelPhase::Active;
        }
    }

    /// A capture started at `epoch` is void once a leave or a signaling loss
    /// happened and none of the channels joined at the time remain.
    fn is_cancelled(&self, epoch: u64, channels: &[ChannelId]) -> bool {
        epoch != self.epoch.load(Ordering::Acquire)
            && !channels.iter().any(|c| self.channels.contains_key(c))
    }

    fn schedule_settle(&self, channel_id: ChannelId) {
        let weak = self.command_tx.clone();
        let settle = self.config.join_settle;

        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(SessionCommand::JoinSettled { channel_id }).await;
            }
        });
    }

    async fn on_signaling_closed(&mut self) {
        warn!("Signaling connection of {} lost, closing all links", self.identity);
        self.signaling_open = false;
        self.epoch.fetch_add(1, Ordering::AcqRel);

        for key in self.links.keys() {
            self.close_link(&key, true).await;
        }
        self.channels.clear();
        self.publish();
    }

    async fn teardown(&mut self) {
        for key in self.links.keys() {
            self.close_link(&key, true).await;
        }
        self.channels.clear();
        self.media.release(MediaSlot::Screen);
        self.media.release(MediaSlot::Camera);
        self.publish();
    }

    fn publish(&self) {
        let peers = self
            .links
            .iter()
            .map(|(key, link)| {
                let view = PeerView {
                    link_id: link.id,
                    state: link.state,
                    outgoing_audio: link.outgoing_audio().cloned(),
                    outgoing_video: link.outgoing_video().cloned(),
                    remote_tracks: link.remote_tracks().to_vec(),
                };
                (key.clone(), view)
            })
            .collect();

        self.roster_tx.send_replace(Roster {
            channels: self.channels.clone(),
            peers,
            links_created: self.links.created(),
        });
    }
}

async fn apply_answer(link: &PeerLink, signal: &Signal) -> Result<(), SessionError> {
    let answer: RTCSessionDescription = signal.decode()?;
    link.transport().apply_answer(answer.sdp).await?;
    Ok(())
}

/// Assembles and spawns a [`MeshSession`].
pub struct SessionBuilder {
    identity: Identity,
    signaling: Arc<dyn SignalingSink>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    config: SessionConfig,
    behavior: Option<Arc<dyn MeshBehavior>>,
    store: Option<Arc<dyn MessageStore>>,
    capture: Arc<dyn CaptureDevice>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn behavior(mut self, behavior: Arc<dyn MeshBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn capture(mut self, capture: Arc<dyn CaptureDevice>) -> Self {
        self.capture = capture;
        self
    }

    /// Starts the session loop on the current runtime.
    pub fn spawn(self) -> SessionHandle {
        let (cmd_tx, command_rx) = mpsc::channel(self.config.event_buffer);
        let (link_tx, link_rx) = mpsc::channel(self.config.event_buffer);
        let (roster_tx, roster_rx) = watch::channel(Roster::default());
        let epoch = Arc::new(AtomicU64::new(0));
        let context = MeshContext::new();

        let session = MeshSession {
            identity: self.identity.clone(),
            config: self.config,
            signaling: self.signaling,
            inbound: self.inbound,
            signaling_open: true,
            command_rx,
            command_tx: cmd_tx.downgrade(),
            link_rx,
            link_tx,
            links: ConnectionRegistry::new(),
            channels: BTreeMap::new(),
            media: LocalMediaSource::new(),
            epoch: Arc::clone(&epoch),
            context: context.clone(),
            behavior: self.behavior,
            store: self.store,
            roster_tx,
        };
        tokio::spawn(session.run());

        SessionHandle::new(self.identity, cmd_tx, epoch, self.capture, roster_rx, context)
    }
}
