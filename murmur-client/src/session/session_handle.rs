use crate::error::SessionError;
use crate::media::{CaptureDevice, CaptureKind};
use crate::session::{MeshContext, Reply, Roster, SessionCommand};
use murmur_core::{ChannelId, Identity};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, watch};

/// Cloneable application API of a running mesh session.
#[derive(Clone)]
pub struct SessionHandle {
    identity: Identity,
    cmd_tx: mpsc::Sender<SessionCommand>,
    epoch: Arc<AtomicU64>,
    capture: Arc<dyn CaptureDevice>,
    roster: watch::Receiver<Roster>,
    context: MeshContext,
}

impl SessionHandle {
    pub(crate) fn new(
        identity: Identity,
        cmd_tx: mpsc::Sender<SessionCommand>,
        epoch: Arc<AtomicU64>,
        capture: Arc<dyn CaptureDevice>,
        roster: watch::Receiver<Roster>,
        context: MeshContext,
    ) -> Self {
        Self {
            identity,
            cmd_tx,
            epoch,
            capture,
            roster,
            context,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Latest roster snapshot.
    pub fn roster(&self) -> Roster {
        self.roster.borrow().clone()
    }

    /// Receiver that wakes on every roster change.
    pub fn watch_roster(&self) -> watch::Receiver<Roster> {
        self.roster.clone()
    }

    pub fn context(&self) -> &MeshContext {
        &self.context
    }

    pub async fn join_channel(&self, channel_id: impl Into<ChannelId>) -> Result<(), SessionError> {
        let channel_id = channel_id.into();
        self.request(|reply| SessionCommand::JoinChannel { channel_id, reply })
            .await
    }

    pub async fn leave_channel(
        &self,
        channel_id: impl Into<ChannelId>,
    ) -> Result<(), SessionError> {
        let channel_id = channel_id.into();
        self.request(|reply| SessionCommand::LeaveChannel { channel_id, reply })
            .await
    }

    /// Best-effort fan-out to every connected peer of the channel.
    pub async fn send_message(
        &self,
        channel_id: impl Into<ChannelId>,
        content: impl Into<String>,
    ) -> Result<usize, SessionError> {
        let channel_id = channel_id.into();
        let content = content.into();
        self.request(|reply| SessionCommand::SendMessage {
            channel_id,
            content,
            reply,
        })
        .await
    }

    pub async fn start_voice(&self) -> Result<(), SessionError> {
        self.start_media(CaptureKind::Voice).await
    }

    pub async fn start_video(&self) -> Result<(), SessionError> {
        self.start_media(CaptureKind::Video).await
    }

    pub async fn start_screen_share(&self) -> Result<(), SessionError> {
        self.start_media(CaptureKind::Screen).await
    }

    pub async fn stop_screen_share(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::StopScreenShare { reply })
            .await
    }

    pub async fn end_call(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::EndCall { reply }).await
    }

    /// Closes every link and stops the session loop.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Close { reply }).await
    }

    /// Acquisition runs here, outside the session loop; the loop only installs
    /// the result if no leave happened in between.
    async fn start_media(&self, kind: CaptureKind) -> Result<(), SessionError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let channels: Vec<ChannelId> = self.roster.borrow().channels.keys().cloned().collect();
        let stream = self.capture.open(kind).await?;
        self.request(|reply| SessionCommand::InstallMedia {
            stream,
            epoch,
            channels,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(cmd)) = self.cmd_tx.send(build(reply)).await {
            cmd.abandon();
            return Err(SessionError::SessionClosed);
        }
        rx.await.map_err(|_| SessionError::SessionClosed)?
    }
}
