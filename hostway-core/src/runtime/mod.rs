mod cluster;
mod manager;

#[cfg(test)]
mod tests;

pub use cluster::*;
pub use manager::*;
