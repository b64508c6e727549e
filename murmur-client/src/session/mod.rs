mod behavior;
mod mesh_context;
mod mesh_session;
mod roster;
mod session_command;
mod session_handle;
mod store;

pub use behavior::*;
pub use mesh_context::*;
pub use mesh_session::*;
pub use roster::*;
pub use session_command::*;
pub use session_handle::*;
pub use store::*;
