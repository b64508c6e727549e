mod config;
mod error;
mod link;
mod media;
mod session;
mod signaling;
mod transport;

pub use config::*;
pub use error::*;
pub use link::*;
pub use media::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
