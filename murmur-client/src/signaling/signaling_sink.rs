use crate::error::SessionError;
use async_trait::async_trait;
use murmur_core::Envelope;

/// Outbound half of the signaling connection, as seen by the session.
///
/// The inbound half is an `mpsc::UnboundedReceiver<Envelope>` handed to the
/// session builder; closing it tells the session the connection is gone.
#[async_trait]
pub trait SignalingSink: Send + Sync + 'static {
    async fn send(&self, envelope: Envelope) -> Result<(), SessionError>;
}
