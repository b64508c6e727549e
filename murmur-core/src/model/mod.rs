mod channel;
mod envelope;
mod ice;
mod identity;

pub use channel::ChannelId;
pub use envelope::{Envelope, EnvelopeKind, Signal};
pub use ice::{DEFAULT_STUN_ADDR, IceServerConfig};
pub use identity::Identity;
