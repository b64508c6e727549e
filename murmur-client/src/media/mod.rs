mod capture;
mod local_source;
mod synthetic;

pub use capture::*;
pub use local_source::*;
pub use synthetic::*;
