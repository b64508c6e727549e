use crate::presence::{ConnectionId, Outbound, PresenceSnapshot};
use murmur_core::Identity;
use tokio::sync::{mpsc, oneshot};

/// Inputs to the coordinator event loop, delivered one at a time.
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// A signaling socket for `identity` was accepted.
    Connect {
        identity: Identity,
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<Outbound>,
    },

    /// One text frame received on a signaling socket.
    Inbound {
        identity: Identity,
        connection_id: ConnectionId,
        text: String,
    },

    /// The signaling socket closed.
    Disconnect {
        identity: Identity,
        connection_id: ConnectionId,
    },

    /// Diagnostic copy of the presence table.
    Snapshot { reply: oneshot::Sender<PresenceSnapshot> },
}
