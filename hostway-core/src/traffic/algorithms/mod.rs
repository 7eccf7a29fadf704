mod least_request;
mod random;
mod round_robin;

pub use least_request::*;
pub use random::*;
pub use round_robin::*;
