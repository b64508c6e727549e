mod config;
mod coordinator;
mod presence;
mod signaling;

pub use config::*;
pub use coordinator::*;
pub use presence::*;
pub use signaling::*;
