mod binding_table;
mod presence_table;

pub use binding_table::*;
pub use presence_table::*;
