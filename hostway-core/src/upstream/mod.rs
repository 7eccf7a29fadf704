mod host;
mod host_set;
mod priority_set;
mod types;


pub use host::*;
pub use host_set::*;
pub use priority_set::*;
pub use types::*;
