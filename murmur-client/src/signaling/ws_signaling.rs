use crate::error::SessionError;
use crate::signaling::SignalingSink;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use murmur_core::{Envelope, Identity};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket connection to the signaling coordinator.
pub struct WsSignaling {
    tx: mpsc::UnboundedSender<Message>,
}

impl WsSignaling {
    /// Connects to `{base_url}/ws/{identity}`.
    ///
    /// Returns the sink and the stream of inbound envelopes. The stream ends
    /// when the socket closes.
    pub async fn connect(
        base_url: &str,
        identity: &Identity,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Envelope>), SessionError> {
        let url = format!("{}/ws/{}", base_url.trim_end_matches('/'), identity);
        let (socket, _) = connect_async(url.as_str()).await?;
        info!("Signaling connected to {}", url);

        let (mut writer, mut reader) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = writer.send(msg).await {
                    error!("Signaling write failed: {}", e);
                    break;
                }
            }
            let _ = writer.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                let msg = match frame {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Signaling read failed: {}", e);
                        break;
                    }
                };
                match msg {
                    Message::Text(text) => match Envelope::from_json(text.as_str()) {
                        Ok(envelope) => {
                            if inbound_tx.send(envelope).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid envelope from coordinator: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => debug!("Ignoring non-text signaling frame"),
                }
            }
            info!("Signaling connection closed");
        });

        Ok((Self { tx }, inbound_rx))
    }
}

#[async_trait]
impl SignalingSink for WsSignaling {
    async fn send(&self, envelope: Envelope) -> Result<(), SessionError> {
        let json = envelope.to_json()?;
        self.tx
            .send(Message::Text(json.into()))
            .map_err(|_| SessionError::SignalingClosed)
    }
}
