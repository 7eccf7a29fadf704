pub mod algorithms;
mod decision;
mod load_balancer;
mod priority;
mod request_guard;
mod scheduler;
mod strategy;
mod types;
mod zone;

#[cfg(test)]
mod tests;

pub use decision::*;
pub use load_balancer::*;
pub use priority::*;
pub use request_guard::*;
pub use scheduler::*;
pub use strategy::*;
pub use types::*;
pub use zone::*;
