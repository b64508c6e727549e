use crate::coordinator::{CoordinatorCommand, CoordinatorHandle};
use crate::presence::{Binding, BindingTable, ConnectionId, Outbound, PresenceTable};
use murmur_core::{ChannelId, Envelope, Identity, Signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Signaling coordinator.
///
/// Owns the binding and presence tables and mutates them from a single event
/// loop, one command at a time. It never looks inside handshake payloads.
pub struct Coordinator {
    bindings: BindingTable,
    presence: PresenceTable,
    command_rx: mpsc::Receiver<CoordinatorCommand>,
}

impl Coordinator {
    pub fn new(command_rx: mpsc::Receiver<CoordinatorCommand>) -> Self {
        Self {
            bindings: BindingTable::new(),
            presence: PresenceTable::new(),
            command_rx,
        }
    }

    /// Starts the event loop on the current runtime and returns its handle.
    pub fn spawn(queue_depth: usize) -> CoordinatorHandle {
        let (tx, rx) = mpsc::channel(queue_depth);
        tokio::spawn(Coordinator::new(rx).run());
        CoordinatorHandle::new(tx)
    }

    pub async fn run(mut self) {
        info!("Coordinator event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("Coordinator event loop finished");
    }

    fn handle_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::Connect {
                identity,
                connection_id,
                tx,
            } => self.on_connect(identity, connection_id, tx),

            CoordinatorCommand::Inbound {
                identity,
                connection_id,
                text,
            } => {
                if !self.bindings.is_current(&identity, connection_id) {
                    debug!(
                        "Dropping frame from superseded connection {} of {}",
                        connection_id, identity
                    );
                    return;
                }
                match Envelope::from_json(&text) {
                    Ok(envelope) => self.handle(identity, envelope),
                    Err(e) => warn!("Invalid envelope from {}: {}", identity, e),
                }
            }

            CoordinatorCommand::Disconnect {
                identity,
                connection_id,
            } => self.on_disconnect(identity, connection_id),

            CoordinatorCommand::Snapshot { reply } => {
                let _ = reply.send(self.presence.snapshot());
            }
        }
    }

    fn on_connect(
        &mut self,
        identity: Identity,
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<Outbound>,
    ) {
        if let Some(previous) = self.bindings.get(&identity).map(|b| b.connection_id) {
            info!("{} reconnected, evicting connection {}", identity, previous);
            self.leave_all(&identity);
            if let Some(stale) = self.bindings.release(&identity, previous) {
                stale.close();
            }
        }

        self.bindings
            .bind(identity.clone(), Binding::new(connection_id, tx));
        info!("{} connected (connection {})", identity, connection_id);
    }

    fn on_disconnect(&mut self, identity: Identity, connection_id: ConnectionId) {
        if !self.bindings.is_current(&identity, connection_id) {
            debug!(
                "Ignoring disconnect of superseded connection {} of {}",
                connection_id, identity
            );
            return;
        }

        self.leave_all(&identity);
        self.bindings.release(&identity, connection_id);
        info!("{} disconnected", identity);
    }

    /// Applies one envelope from `identity`'s current connection.
    pub fn handle(&mut self, identity: Identity, envelope: Envelope) {
        debug!("{} -> {}", identity, envelope.kind());

        match envelope {
            Envelope::JoinChannel { channel_id } => self.join(identity, channel_id),

            Envelope::LeaveChannel { channel_id } => self.leave(&identity, &channel_id),

            Envelope::Offer(signal) => self.relay(identity, signal, Envelope::Offer),
            Envelope::Answer(signal) => self.relay(identity, signal, Envelope::Answer),
            Envelope::IceCandidate(signal) => self.relay(identity, signal, Envelope::IceCandidate),

            Envelope::PeerJoined { .. } | Envelope::PeerLeft { .. } => {
                warn!(
                    "{} sent a presence event; only the coordinator emits those",
                    identity
                );
            }
        }
    }

    fn join(&mut self, identity: Identity, channel_id: ChannelId) {
        if !self.presence.join(&channel_id, &identity) {
            debug!("{} already in channel {}", identity, channel_id);
            return;
        }
        info!("{} joined channel {}", identity, channel_id);

        // The joiner gets nothing back; existing members offer to it.
        let event = Envelope::PeerJoined {
            from: identity.clone(),
            channel_id: channel_id.clone(),
        };
        self.broadcast(&channel_id, &identity, &event);
    }

    fn leave(&mut self, identity: &Identity, channel_id: &ChannelId) {
        if !self.presence.leave(channel_id, identity) {
            debug!("{} is not in channel {}", identity, channel_id);
            return;
        }
        info!("{} left channel {}", identity, channel_id);

        let event = Envelope::PeerLeft {
            from: identity.clone(),
            channel_id: channel_id.clone(),
        };
        self.broadcast(channel_id, identity, &event);
    }

    fn leave_all(&mut self, identity: &Identity) {
        for channel_id in self.presence.channels_of(identity) {
            self.leave(identity, &channel_id);
        }
    }

    fn relay(&self, identity: Identity, mut signal: Signal, wrap: fn(Signal) -> Envelope) {
        let to = signal.to.clone();
        signal.from = Some(identity.clone());
        let envelope = wrap(signal);
        let kind = envelope.kind();

        let json = match envelope.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} for {}: {}", kind, to, e);
                return;
            }
        };

        if self.bindings.deliver(&to, json) {
            debug!("Relayed {} {} -> {}", kind, identity, to);
        } else {
            debug!("Dropped {} from {}: {} is not connected", kind, identity, to);
        }
    }

    fn broadcast(&self, channel_id: &ChannelId, subject: &Identity, event: &Envelope) {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {}: {}", event.kind(), e);
                return;
            }
        };

        for member in self.presence.members_except(channel_id, subject) {
            if !self.bindings.deliver(&member, json.clone()) {
                debug!("Skipped {} for {}: connection not open", event.kind(), member);
            }
        }
    }
}
