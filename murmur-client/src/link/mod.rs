mod link_key;
mod peer_link;
mod registry;

pub use link_key::*;
pub use peer_link::*;
pub use registry::*;
