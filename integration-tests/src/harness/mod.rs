mod cluster;
pub mod tracing;

pub use cluster::*;
pub use self::tracing::{CapturedEvent, captured_events, init_test_tracing};
