pub mod error;
pub mod model;
pub mod negotiation;

pub use error::ProtocolError;
pub use model::*;
pub use negotiation::is_offerer;
