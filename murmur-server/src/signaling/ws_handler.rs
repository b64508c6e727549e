use crate::coordinator::CoordinatorHandle;
use crate::presence::Outbound;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use murmur_core::Identity;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Upgrades `/ws/{identity}`. The identity is trusted as given by the auth layer in front.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(identity): Path<String>,
    State(coordinator): State<CoordinatorHandle>,
) -> impl IntoResponse {
    let identity = Identity::from(identity);

    ws.on_upgrade(move |socket| handle_socket(socket, identity, coordinator))
}

async fn handle_socket(socket: WebSocket, identity: Identity, coordinator: CoordinatorHandle) {
    info!("New signaling connection: {}", identity);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let connection_id = match coordinator.connect(identity.clone(), tx).await {
        Ok(id) => id,
        Err(e) => {
            error!("Rejecting {}: {}", identity, e);
            return;
        }
    };

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Envelope(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let coordinator = coordinator.clone();
        let identity = identity.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let submitted = coordinator
                            .submit(identity.clone(), connection_id, text.to_string())
                            .await;
                        if let Err(e) = submitted {
                            error!("Coordinator died: {}", e);
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => debug!("Ignoring non-text frame from {}", identity),
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = coordinator.disconnect(identity.clone(), connection_id).await;
    info!("Signaling connection closed: {} ({})", identity, connection_id);
}
