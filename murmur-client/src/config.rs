use murmur_core::IceServerConfig;
use std::time::Duration;

/// Settings for one mesh session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Label of the chat data channel opened by the offerer.
    pub data_channel_label: String,
    /// How long a joined channel stays `Joining` when no presence event arrives.
    pub join_settle: Duration,
    /// Capacity of the link event and command queues.
    pub event_buffer: usize,
}

impl SessionConfig {
    /// No ICE servers: host candidates only, for peers on the same machine or LAN.
    pub fn local() -> Self {
        Self {
            ice_servers: vec![],
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::default()],
            data_channel_label: "chat".to_owned(),
            join_settle: Duration::from_secs(2),
            event_buffer: 256,
        }
    }
}
