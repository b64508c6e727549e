pub use murmur_core::{ChannelId, Identity};

pub mod model {
    pub use murmur_core::model::*;
    pub use murmur_core::{ProtocolError, is_offerer};
}

#[cfg(feature = "server")]
pub mod server {
    pub use murmur_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use murmur_client::*;
}
