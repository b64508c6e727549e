use murmur_core::{ChannelId, Identity};
use std::fmt;

/// One mesh edge: this session's link to `remote` within `channel_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    pub channel_id: ChannelId,
    pub remote: Identity,
}

impl LinkKey {
    pub fn new(channel_id: ChannelId, remote: Identity) -> Self {
        Self { channel_id, remote }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.remote, self.channel_id)
    }
}

/// Monotonic id of one link instance. A replacement link for the same key gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
