use murmur_core::Identity;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Monotonic id of one accepted signaling socket.
pub type ConnectionId = u64;

/// Frames queued for a signaling socket's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Envelope(String),
    Close,
}

/// The single live signaling connection of one identity.
#[derive(Debug)]
pub struct Binding {
    pub connection_id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Binding {
    pub fn new(connection_id: ConnectionId, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { connection_id, tx }
    }

    /// The writer side is still draining the queue.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn send(&self, text: String) -> bool {
        self.tx.send(Outbound::Envelope(text)).is_ok()
    }

    /// Asks the writer to close the socket. The queue itself goes away when the binding is dropped.
    pub fn close(self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// identity -> live signaling connection. At most one entry per identity.
#[derive(Debug, Default)]
pub struct BindingTable {
    bindings: HashMap<Identity, Binding>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `binding`, handing back the connection it supersedes.
    pub fn bind(&mut self, identity: Identity, binding: Binding) -> Option<Binding> {
        self.bindings.insert(identity, binding)
    }

    pub fn get(&self, identity: &Identity) -> Option<&Binding> {
        self.bindings.get(identity)
    }

    pub fn is_current(&self, identity: &Identity, connection_id: ConnectionId) -> bool {
        self.bindings
            .get(identity)
            .is_some_and(|b| b.connection_id == connection_id)
    }

    /// Removes the binding only if it still belongs to `connection_id`.
    pub fn release(&mut self, identity: &Identity, connection_id: ConnectionId) -> Option<Binding> {
        if !self.is_current(identity, connection_id) {
            return None;
        }
        self.bindings.remove(identity)
    }

    /// Queues `text` for `identity`. Returns false when nothing was delivered.
    pub fn deliver(&self, identity: &Identity, text: String) -> bool {
        match self.bindings.get(identity) {
            Some(binding) if binding.is_open() => binding.send(text),
            Some(_) => {
                debug!("Binding for {} is closed, dropping frame", identity);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
