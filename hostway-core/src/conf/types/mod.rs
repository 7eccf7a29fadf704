mod cluster;
mod load_balancer;

pub use cluster::*;
pub use load_balancer::*;
