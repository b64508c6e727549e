use anyhow::{Context, Result};
use async_trait::async_trait;
use murmur_client::{SessionError, SignalingSink};
use murmur_core::{Envelope, Identity};
use murmur_server::{ConnectionId, CoordinatorHandle, Outbound};
use tokio::sync::mpsc;

/// In-process signaling: talks to a coordinator through its handle instead
/// of a WebSocket, with the same per-connection ordering.
pub struct LocalSignaling {
    identity: Identity,
    connection_id: ConnectionId,
    coordinator: CoordinatorHandle,
}

impl LocalSignaling {
    /// Binds `identity` and returns the sink plus the inbound envelope stream.
    pub async fn connect(
        coordinator: &CoordinatorHandle,
        identity: &Identity,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Envelope>)> {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let connection_id = coordinator
            .connect(identity.clone(), outbound_tx)
            .await
            .context("Coordinator refused connection")?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let name = identity.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    Outbound::Envelope(text) => match Envelope::from_json(&text) {
                        Ok(envelope) => {
                            if inbound_tx.send(envelope).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("[LocalSignaling] bad frame for {}: {}", name, e),
                    },
                    Outbound::Close => break,
                }
            }
            tracing::debug!("[LocalSignaling] inbound stream of {} closed", name);
        });

        Ok((
            Self {
                identity: identity.clone(),
                connection_id,
                coordinator: coordinator.clone(),
            },
            inbound_rx,
        ))
    }

    /// Drops the binding as if the socket had closed.
    pub async fn disconnect(&self) -> Result<()> {
        self.coordinator
            .disconnect(self.identity.clone(), self.connection_id)
            .await
            .context("Coordinator stopped")
    }
}

#[async_trait]
impl SignalingSink for LocalSignaling {
    async fn send(&self, envelope: Envelope) -> Result<(), SessionError> {
        let json = envelope.to_json()?;
        self.coordinator
            .submit(self.identity.clone(), self.connection_id, json)
            .await
            .map_err(|_| SessionError::SignalingClosed)
    }
}
