use crate::coordinator::CoordinatorCommand;
use crate::presence::{ConnectionId, Outbound, PresenceSnapshot};
use murmur_core::Identity;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("coordinator event loop has stopped")]
    Stopped,
}

/// Cloneable front door to the coordinator event loop.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<CoordinatorCommand>,
    next_connection_id: Arc<AtomicU64>,
}

impl CoordinatorHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<CoordinatorCommand>) -> Self {
        Self {
            cmd_tx,
            next_connection_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers a new signaling connection; any previous one for `identity` is evicted.
    pub async fn connect(
        &self,
        identity: Identity,
        tx: mpsc::UnboundedSender<Outbound>,
    ) -> Result<ConnectionId, CoordinatorError> {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        self.send(CoordinatorCommand::Connect {
            identity,
            connection_id,
            tx,
        })
        .await?;
        Ok(connection_id)
    }

    pub async fn submit(
        &self,
        identity: Identity,
        connection_id: ConnectionId,
        text: String,
    ) -> Result<(), CoordinatorError> {
        self.send(CoordinatorCommand::Inbound {
            identity,
            connection_id,
            text,
        })
        .await
    }

    pub async fn disconnect(
        &self,
        identity: Identity,
        connection_id: ConnectionId,
    ) -> Result<(), CoordinatorError> {
        self.send(CoordinatorCommand::Disconnect {
            identity,
            connection_id,
        })
        .await
    }

    pub async fn presence(&self) -> Result<PresenceSnapshot, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }

    async fn send(&self, cmd: CoordinatorCommand) -> Result<(), CoordinatorError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| CoordinatorError::Stopped)
    }
}
