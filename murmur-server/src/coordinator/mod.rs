mod coordinator;
mod coordinator_command;
mod coordinator_handle;

pub use coordinator::*;
pub use coordinator_command::*;
pub use coordinator_handle::*;
