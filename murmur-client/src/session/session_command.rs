use crate::error::SessionError;
use crate::media::CaptureStream;
use murmur_core::ChannelId;
use tokio::sync::oneshot;

pub type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Requests processed one at a time by the session loop.
pub enum SessionCommand {
    JoinChannel {
        channel_id: ChannelId,
        reply: Reply<()>,
    },
    LeaveChannel {
        channel_id: ChannelId,
        reply: Reply<()>,
    },
    /// Replies with the number of peers the message was written to.
    SendMessage {
        channel_id: ChannelId,
        content: String,
        reply: Reply<usize>,
    },
    /// A capture acquired at `epoch` while joined to `channels`. If a leave
    /// happened since and none of those channels is still joined, it is
    /// cancelled.
    InstallMedia {
        stream: CaptureStream,
        epoch: u64,
        channels: Vec<ChannelId>,
        reply: Reply<()>,
    },
    StopScreenShare {
        reply: Reply<()>,
    },
    EndCall {
        reply: Reply<()>,
    },
    /// Closes every link and stops the loop.
    Close {
        reply: Reply<()>,
    },
    /// Internal: the settle timer of a join fired.
    JoinSettled {
        channel_id: ChannelId,
    },
}

impl SessionCommand {
    /// Frees what a command carries when it never reached the session.
    pub(crate) fn abandon(self) {
        if let Self::InstallMedia { stream, .. } = self {
            stream.release();
        }
    }
}
